use std::path::Path;

use anyhow::{Context, Result};

use super::allocator::GpuResourceAllocator;
use super::handle::GpuResource;
use super::shader_data::ShaderDataGlsl;
use crate::render::Renderer;

/// A linked shader program.
#[derive(Debug)]
pub struct Shader {
    resource: GpuResource,
    name: String,
}

impl Shader {
    pub fn new(allocator: &dyn GpuResourceAllocator, data: &ShaderDataGlsl) -> Result<Self> {
        let name = data.describe();
        let resource = allocator
            .create_shader(data)
            .with_context(|| format!("failed to create shader from {name}"))?;
        log::debug!("shader {} created from {name}", resource.id());
        Ok(Self { resource, name })
    }

    /// Loads a combined `#type`-sectioned GLSL file.
    pub fn from_file(allocator: &dyn GpuResourceAllocator, path: impl AsRef<Path>) -> Result<Self> {
        let data = ShaderDataGlsl::from_file(path)?;
        Self::new(allocator, &data)
    }

    pub fn bind(&self, renderer: &Renderer) {
        renderer.bind_shader(self);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource(&self) -> &GpuResource {
        &self.resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{HeadlessDevice, ObjectKind};

    #[test]
    fn shader_is_created_and_destroyed() {
        let device = HeadlessDevice::new();
        let shader = Shader::new(&device.allocator(), &ShaderDataGlsl::new("v", "f")).unwrap();
        let id = shader.resource().id();
        assert_eq!(device.kind_of(id), Some(ObjectKind::Shader));
        assert_eq!(shader.name(), "<inline shader>");

        drop(shader);
        assert_eq!(device.kind_of(id), None);
    }

    #[test]
    fn missing_file_is_an_error() {
        let device = HeadlessDevice::new();
        assert!(Shader::from_file(&device.allocator(), "no/such/shader.glsl").is_err());
    }
}
