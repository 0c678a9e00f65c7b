use std::cell::{RefCell, RefMut};
use std::fmt;

use super::renderer::{RenderBackend, Renderer};
use super::shader_state::ShaderState;
use super::state::{RenderState, RenderStateBackend};
use crate::event::EventBus;
use crate::resource::GpuResourceAllocator;

/// Which backend a [`GraphicsContext`] talks to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RenderApi {
    Headless,
    Wgpu,
}

impl fmt::Display for RenderApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RenderApi::Headless => "headless",
            RenderApi::Wgpu => "wgpu",
        })
    }
}

/// Everything layers need to create resources and draw, for one backend.
pub struct GraphicsContext {
    api: RenderApi,
    allocator: Box<dyn GpuResourceAllocator>,
    render_state: RefCell<RenderState>,
    renderer: Renderer,
    shader_state: RefCell<Box<dyn ShaderState>>,
}

impl GraphicsContext {
    pub fn new(
        api: RenderApi,
        allocator: Box<dyn GpuResourceAllocator>,
        render_state: Box<dyn RenderStateBackend>,
        render_backend: Box<dyn RenderBackend>,
        shader_state: Box<dyn ShaderState>,
        bus: &EventBus,
    ) -> Self {
        Self {
            api,
            allocator,
            render_state: RefCell::new(RenderState::new(render_state)),
            renderer: Renderer::new(render_backend, bus),
            shader_state: RefCell::new(shader_state),
        }
    }

    pub fn api(&self) -> RenderApi {
        self.api
    }

    pub fn allocator(&self) -> &dyn GpuResourceAllocator {
        self.allocator.as_ref()
    }

    /// Panics if the render state is already borrowed.
    pub fn render_state(&self) -> RefMut<'_, RenderState> {
        self.render_state.borrow_mut()
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Panics if the shader state is already borrowed.
    pub fn shader_state(&self) -> RefMut<'_, Box<dyn ShaderState>> {
        self.shader_state.borrow_mut()
    }
}

impl fmt::Debug for GraphicsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}
