use std::collections::HashMap;

use crate::resource::{FrameBufferResourceConfig, TextureConfig, VertexBufferLayout};

use super::shader::{CompiledShader, UniformBlock};

pub(super) struct VertexBufferObject {
    pub buffer: wgpu::Buffer,
    pub layout: VertexBufferLayout,
}

pub(super) struct IndexBufferObject {
    pub buffer: wgpu::Buffer,
    pub count: u32,
}

/// Buffers attached while this array was bound, in attachment order.
#[derive(Default)]
pub(super) struct VertexArrayObject {
    pub vertex_buffers: Vec<u64>,
    pub index_buffer: Option<u64>,
}

pub(super) struct TextureObject {
    pub texture: wgpu::Texture,
    pub config: TextureConfig,
    pub mip_levels: u32,
    /// Group-1 bind group; absent for depth/stencil textures.
    pub bind_group: Option<wgpu::BindGroup>,
}

pub(super) struct ShaderObject {
    pub compiled: CompiledShader,
    pub uniforms: UniformBlock,
}

pub(super) enum GpuObject {
    VertexBuffer(VertexBufferObject),
    IndexBuffer(IndexBufferObject),
    VertexArray(VertexArrayObject),
    Texture(TextureObject),
    Shader(ShaderObject),
    FrameBuffer(FrameBufferResourceConfig),
}

impl GpuObject {
    fn kind(&self) -> &'static str {
        match self {
            GpuObject::VertexBuffer(_) => "vertex buffer",
            GpuObject::IndexBuffer(_) => "index buffer",
            GpuObject::VertexArray(_) => "vertex array",
            GpuObject::Texture(_) => "texture",
            GpuObject::Shader(_) => "shader",
            GpuObject::FrameBuffer(_) => "frame buffer",
        }
    }
}

/// Live backend objects by id, plus the current bindings.
#[derive(Default)]
pub(super) struct Registry {
    next_id: u64,
    objects: HashMap<u64, GpuObject>,
    pub bound_vertex_array: Option<u64>,
    pub bound_shader: Option<u64>,
    pub bound_textures: HashMap<u32, u64>,
}

impl Registry {
    /// Stores `object` under a fresh id. Vertex arrays become bound; buffers
    /// attach to the bound vertex array.
    pub fn insert(&mut self, object: GpuObject) -> u64 {
        self.next_id += 1;
        let id = self.next_id;

        match &object {
            GpuObject::VertexArray(_) => self.bound_vertex_array = Some(id),
            GpuObject::VertexBuffer(_) | GpuObject::IndexBuffer(_) => self.attach(id, &object),
            _ => {}
        }

        log::debug!("wgpu: created {} {id}", object.kind());
        self.objects.insert(id, object);
        id
    }

    fn attach(&mut self, id: u64, object: &GpuObject) {
        let Some(va_id) = self.bound_vertex_array else {
            log::warn!("wgpu: {} {id} created with no vertex array bound", object.kind());
            return;
        };
        let Some(GpuObject::VertexArray(va)) = self.objects.get_mut(&va_id) else {
            return;
        };
        match object {
            GpuObject::VertexBuffer(_) => va.vertex_buffers.push(id),
            GpuObject::IndexBuffer(_) => va.index_buffer = Some(id),
            _ => {}
        }
    }

    pub fn remove(&mut self, id: u64) -> Option<GpuObject> {
        let object = self.objects.remove(&id)?;
        match &object {
            GpuObject::VertexBuffer(_) | GpuObject::IndexBuffer(_) => {
                for other in self.objects.values_mut() {
                    if let GpuObject::VertexArray(va) = other {
                        va.vertex_buffers.retain(|&b| b != id);
                        if va.index_buffer == Some(id) {
                            va.index_buffer = None;
                        }
                    }
                }
            }
            GpuObject::VertexArray(_) if self.bound_vertex_array == Some(id) => {
                self.bound_vertex_array = None;
            }
            GpuObject::Shader(_) if self.bound_shader == Some(id) => self.bound_shader = None,
            GpuObject::Texture(_) => self.bound_textures.retain(|_, bound| *bound != id),
            _ => {}
        }
        log::debug!("wgpu: destroyed {} {id}", object.kind());
        Some(object)
    }

    /// Vertex arrays that hold `buffer`.
    pub fn arrays_using(&self, buffer: u64) -> Vec<u64> {
        self.objects
            .iter()
            .filter_map(|(&id, object)| match object {
                GpuObject::VertexArray(va)
                    if va.vertex_buffers.contains(&buffer) || va.index_buffer == Some(buffer) =>
                {
                    Some(id)
                }
                _ => None,
            })
            .collect()
    }

    pub fn vertex_buffer(&self, id: u64) -> Option<&VertexBufferObject> {
        match self.objects.get(&id) {
            Some(GpuObject::VertexBuffer(b)) => Some(b),
            _ => None,
        }
    }

    pub fn index_buffer(&self, id: u64) -> Option<&IndexBufferObject> {
        match self.objects.get(&id) {
            Some(GpuObject::IndexBuffer(b)) => Some(b),
            _ => None,
        }
    }

    pub fn vertex_array(&self, id: u64) -> Option<&VertexArrayObject> {
        match self.objects.get(&id) {
            Some(GpuObject::VertexArray(va)) => Some(va),
            _ => None,
        }
    }

    pub fn texture(&self, id: u64) -> Option<&TextureObject> {
        match self.objects.get(&id) {
            Some(GpuObject::Texture(t)) => Some(t),
            _ => None,
        }
    }

    pub fn shader(&self, id: u64) -> Option<&ShaderObject> {
        match self.objects.get(&id) {
            Some(GpuObject::Shader(s)) => Some(s),
            _ => None,
        }
    }

    pub fn shader_mut(&mut self, id: u64) -> Option<&mut ShaderObject> {
        match self.objects.get_mut(&id) {
            Some(GpuObject::Shader(s)) => Some(s),
            _ => None,
        }
    }
}
