//! GPU resource handles and the data used to create them.
//!
//! Backends implement [`GpuResourceAllocator`]; the wrappers here
//! ([`VertexBuffer`], [`Texture2D`], [`Shader`], ...) each own one
//! [`GpuResource`] and destroy it on drop.

mod allocator;
mod buffer;
mod buffer_data;
mod config;
mod frame_buffer;
mod handle;
mod shader;
mod shader_data;
mod texture;
mod texture_data;
mod vertex_array;

pub use allocator::GpuResourceAllocator;
pub use buffer::{IndexBuffer, VertexBuffer};
pub use buffer_data::{
    BufferElement, IndexBufferData, ShaderDataType, VertexBufferData, VertexBufferLayout,
    VertexBufferUsage,
};
pub use config::{
    ColorAttachmentSlot, FrameBufferAttachment, FrameBufferConfig, FrameBufferResourceConfig,
    TextureConfig, TextureResourceData, TextureUsage,
};
pub use frame_buffer::FrameBuffer;
pub use handle::{GpuResource, INVALID_RESOURCE_ID};
pub use shader::Shader;
pub use shader_data::{ShaderDataGlsl, ShaderStage};
pub use texture::Texture2D;
pub use texture_data::{PixelFormat, TextureData};
pub use vertex_array::{Mesh, VertexArray};
