use glam::Vec4;

use crate::render::{
    BlendingFactor, BufferClearBits, CompareFunction, FaceCullingMode, FrontFaceWinding,
    RenderStateBackend, StateSnapshot, StencilOperations, StencilParameters,
};

use super::SharedRef;

/// Keeps the shared state current. Pipelines pick it up at the next draw.
pub struct WgpuRenderState {
    pub(super) shared: SharedRef,
}

impl WgpuRenderState {
    fn with(&mut self, f: impl FnOnce(&mut StateSnapshot)) {
        f(&mut self.shared.borrow_mut().state);
    }
}

impl RenderStateBackend for WgpuRenderState {
    fn set_clear_color(&mut self, color: Vec4) {
        self.with(|s| s.clear.color = color);
    }

    fn set_clear_depth(&mut self, depth: f32) {
        self.with(|s| s.clear.depth = depth);
    }

    fn set_clear_stencil(&mut self, stencil: i32) {
        self.with(|s| s.clear.stencil = stencil);
    }

    fn set_clear_bits(&mut self, bits: BufferClearBits) {
        self.with(|s| s.clear.bits = bits);
    }

    fn set_stencil_testing_enabled(&mut self, enabled: bool) {
        self.with(|s| s.stencil.enabled = enabled);
    }

    fn set_stencil_parameters(&mut self, parameters: StencilParameters) {
        self.with(|s| s.stencil.parameters = parameters);
    }

    fn set_stencil_operations(&mut self, operations: StencilOperations) {
        self.with(|s| s.stencil.operations = operations);
    }

    fn set_depth_testing_enabled(&mut self, enabled: bool) {
        self.with(|s| s.depth.testing_enabled = enabled);
    }

    fn set_depth_writing_enabled(&mut self, enabled: bool) {
        self.with(|s| s.depth.writing_enabled = enabled);
    }

    fn set_depth_compare_function(&mut self, function: CompareFunction) {
        self.with(|s| s.depth.compare_function = function);
    }

    fn set_face_culling_mode(&mut self, mode: FaceCullingMode) {
        self.with(|s| s.cull.mode = mode);
    }

    fn set_front_face_winding(&mut self, winding: FrontFaceWinding) {
        self.with(|s| s.cull.winding = winding);
    }

    fn set_blending_enabled(&mut self, enabled: bool) {
        self.with(|s| s.blend.enabled = enabled);
    }

    fn set_blending_color(&mut self, color: Vec4) {
        self.with(|s| s.blend.color = color);
    }

    fn set_blending_factor(&mut self, source: BlendingFactor, destination: BlendingFactor) {
        self.with(|s| {
            s.blend.source = source;
            s.blend.destination = destination;
        });
    }
}
