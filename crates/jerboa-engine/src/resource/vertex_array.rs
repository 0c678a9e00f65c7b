use anyhow::{Context, Result};

use super::allocator::GpuResourceAllocator;
use super::buffer::{IndexBuffer, VertexBuffer};
use super::buffer_data::{IndexBufferData, VertexBufferData};
use super::handle::GpuResource;
use crate::render::Renderer;

/// Groups vertex buffers and an index buffer. Creating one binds it.
#[derive(Debug)]
pub struct VertexArray {
    resource: GpuResource,
}

impl VertexArray {
    pub fn new(allocator: &dyn GpuResourceAllocator) -> Result<Self> {
        let resource = allocator
            .create_vertex_array()
            .context("failed to create vertex array")?;
        Ok(Self { resource })
    }

    pub fn bind(&self, renderer: &Renderer) {
        renderer.bind_vertex_array(self);
    }

    pub fn resource(&self) -> &GpuResource {
        &self.resource
    }
}

/// A vertex array together with the buffers attached to it.
#[derive(Debug)]
pub struct Mesh {
    // Buffers are declared first so they are released before their array.
    vertex_buffer: VertexBuffer,
    index_buffer: IndexBuffer,
    vertex_array: VertexArray,
}

impl Mesh {
    /// Creates the vertex array first so both buffers attach to it.
    pub fn new(
        allocator: &dyn GpuResourceAllocator,
        vertices: &VertexBufferData<'_>,
        indices: &IndexBufferData<'_>,
    ) -> Result<Self> {
        let vertex_array = VertexArray::new(allocator)?;
        let vertex_buffer = VertexBuffer::new(allocator, vertices)?;
        let index_buffer = IndexBuffer::new(allocator, indices)?;
        log::debug!(
            "mesh created: vertex array {}, {} vertices, {} indices",
            vertex_array.resource().id(),
            vertices.vertex_count(),
            index_buffer.count()
        );
        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_array,
        })
    }

    pub fn vertex_array(&self) -> &VertexArray {
        &self.vertex_array
    }

    pub fn vertex_buffer(&self) -> &VertexBuffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &IndexBuffer {
        &self.index_buffer
    }

    /// Indices drawn by [`Renderer::draw_mesh`].
    pub fn index_count(&self) -> u32 {
        self.index_buffer.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{Command, HeadlessDevice, ObjectKind};
    use crate::resource::{ShaderDataType, VertexBufferLayout, VertexBufferUsage};

    fn quad(device: &HeadlessDevice) -> Mesh {
        let vertices = [0.0f32; 4 * 3];
        let layout: VertexBufferLayout = [ShaderDataType::Float3].into_iter().collect();
        let indices = [0u32, 1, 2, 2, 3, 0];
        Mesh::new(
            &device.allocator(),
            &VertexBufferData::from_slice(&vertices, layout, VertexBufferUsage::Static),
            &IndexBufferData::new(&indices).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn mesh_buffers_attach_to_its_vertex_array() {
        let device = HeadlessDevice::new();
        let mesh = quad(&device);

        let va = mesh.vertex_array().resource().id();
        assert_eq!(device.kind_of(va), Some(ObjectKind::VertexArray));
        assert_eq!(device.vertex_array_of(mesh.vertex_buffer().resource().id()), Some(va));
        assert_eq!(device.vertex_array_of(mesh.index_buffer().resource().id()), Some(va));
        assert_eq!(mesh.index_count(), 6);
        assert_eq!(mesh.vertex_buffer().size(), 48);
    }

    #[test]
    fn dropping_mesh_destroys_all_three_objects() {
        let device = HeadlessDevice::new();
        let mesh = quad(&device);
        assert_eq!(device.live_count(), 3);

        drop(mesh);
        assert_eq!(device.live_count(), 0);
        let destroyed = device
            .commands()
            .iter()
            .filter(|c| matches!(c, Command::Destroy { .. }))
            .count();
        assert_eq!(destroyed, 3);
    }

    #[test]
    fn failed_buffer_creation_leaves_no_object_behind() {
        let device = HeadlessDevice::new();
        let allocator = device.allocator();
        let _va = VertexArray::new(&allocator).unwrap();
        device.fail_next_creation("out of memory");

        let indices = [0u32];
        let err = IndexBuffer::new(&allocator, &IndexBufferData::new(&indices).unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("out of memory"));
        assert_eq!(device.live_count(), 1);
    }
}
