use anyhow::{Context, Result};

use super::allocator::GpuResourceAllocator;
use super::buffer_data::{IndexBufferData, VertexBufferData, VertexBufferLayout, VertexBufferUsage};
use super::handle::GpuResource;

/// Vertex data living on the GPU, attached to the vertex array that was bound
/// when it was created.
#[derive(Debug)]
pub struct VertexBuffer {
    resource: GpuResource,
    layout: VertexBufferLayout,
    usage: VertexBufferUsage,
    size: usize,
}

impl VertexBuffer {
    pub fn new(allocator: &dyn GpuResourceAllocator, data: &VertexBufferData<'_>) -> Result<Self> {
        let resource = allocator
            .create_vertex_buffer(data)
            .context("failed to create vertex buffer")?;
        Ok(Self {
            resource,
            layout: data.layout.clone(),
            usage: data.usage,
            size: data.bytes.len(),
        })
    }

    pub fn layout(&self) -> &VertexBufferLayout {
        &self.layout
    }

    pub fn usage(&self) -> VertexBufferUsage {
        self.usage
    }

    /// Size in bytes of the uploaded data.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn resource(&self) -> &GpuResource {
        &self.resource
    }
}

#[derive(Debug)]
pub struct IndexBuffer {
    resource: GpuResource,
    count: u32,
}

impl IndexBuffer {
    pub fn new(allocator: &dyn GpuResourceAllocator, data: &IndexBufferData<'_>) -> Result<Self> {
        let resource = allocator
            .create_index_buffer(data)
            .context("failed to create index buffer")?;
        Ok(Self {
            resource,
            count: data.count(),
        })
    }

    /// Number of indices.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn resource(&self) -> &GpuResource {
        &self.resource
    }
}
