use anyhow::Result;

use super::buffer_data::{IndexBufferData, VertexBufferData};
use super::config::{FrameBufferResourceConfig, TextureConfig, TextureResourceData};
use super::handle::GpuResource;
use super::shader_data::ShaderDataGlsl;

/// Creates backend objects and hands them out as [`GpuResource`]s.
///
/// Every `create_*` call has already run its creation closure when it
/// returns. Creation mutates backend binding state: creating a vertex array
/// binds it, and vertex/index buffers attach to whichever vertex array is
/// bound at that moment. Callers must not rely on bindings surviving a
/// create call.
pub trait GpuResourceAllocator {
    fn create_vertex_buffer(&self, data: &VertexBufferData<'_>) -> Result<GpuResource>;

    fn create_index_buffer(&self, data: &IndexBufferData<'_>) -> Result<GpuResource>;

    /// Backends without a vertex-array concept may keep the default, which
    /// yields an invalid handle.
    fn create_vertex_array(&self) -> Result<GpuResource> {
        Ok(GpuResource::default())
    }

    fn create_texture(&self, config: &TextureConfig) -> Result<GpuResource>;

    fn create_shader(&self, data: &ShaderDataGlsl) -> Result<GpuResource>;

    fn create_frame_buffer(&self, config: &FrameBufferResourceConfig) -> Result<GpuResource>;

    /// Replaces the pixel contents of a texture created by this allocator.
    fn upload_texture_data(
        &self,
        resource: &GpuResource,
        data: &TextureResourceData<'_>,
    ) -> Result<()>;
}
