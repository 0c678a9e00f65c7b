use crate::render::{ShaderState, UniformValue};

use super::SharedRef;

/// Writes uniforms into the bound shader's CPU-side block. The block is
/// copied into each draw recorded afterwards.
pub struct WgpuShaderState {
    pub(super) shared: SharedRef,
}

impl ShaderState for WgpuShaderState {
    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let mut shared = self.shared.borrow_mut();
        let Some(id) = shared.registry.bound_shader else {
            log::warn!("wgpu: uniform {name} set with no shader bound");
            return;
        };
        match shared.registry.shader_mut(id) {
            Some(shader) => shader.uniforms.set(name, value),
            None => log::warn!("wgpu: uniform {name} set on destroyed shader {id}"),
        }
    }
}
