//! Render state tracking, draw dispatch and uniform state.
//!
//! Backend-specific work sits behind three traits: [`RenderStateBackend`],
//! [`RenderBackend`] and [`ShaderState`]. A [`GraphicsContext`] bundles one
//! backend's implementations with its resource allocator.

mod context;
mod renderer;
mod shader_state;
mod state;

pub use context::{GraphicsContext, RenderApi};
pub use renderer::{RenderBackend, Renderer};
pub use shader_state::{ShaderState, UniformValue};
pub use state::{
    BlendState, BlendingFactor, BufferClearBits, ClearState, CompareFunction, CullState,
    DepthState, FaceCullingMode, FrontFaceWinding, RenderState, RenderStateBackend,
    StateSnapshot, StencilOperation, StencilOperations, StencilParameters, StencilState,
};
