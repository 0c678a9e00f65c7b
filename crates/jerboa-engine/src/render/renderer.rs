use std::cell::RefCell;
use std::rc::Rc;

use crate::event::{EventBus, EventObserver, VSyncChangedEvent, WindowResizeEvent};
use crate::resource::{Mesh, Shader, Texture2D, VertexArray};

/// Draw-call side of a graphics backend. Calls are infallible; backends log
/// what they cannot do.
pub trait RenderBackend {
    /// Clears the current target using the clear values last pushed through
    /// the render state.
    fn clear(&mut self);

    /// Indexed triangle draw against the bound vertex array.
    fn draw_indexed(&mut self, index_count: u32);

    fn bind_vertex_array(&mut self, id: u64);
    fn bind_shader(&mut self, id: u64);
    fn bind_texture(&mut self, slot: u32, id: u64);

    fn set_viewport(&mut self, width: u32, height: u32);
    fn set_vsync(&mut self, enabled: bool);

    /// Finishes the frame and shows it.
    fn present(&mut self);
}

/// Issues clear and draw calls. It never picks resources itself; callers
/// bind what they want drawn first.
pub struct Renderer {
    backend: Rc<RefCell<Box<dyn RenderBackend>>>,
    _observers: Vec<EventObserver>,
}

impl Renderer {
    /// Wraps `backend` and keeps its viewport and vsync in step with window
    /// events published on `bus`.
    pub fn new(backend: Box<dyn RenderBackend>, bus: &EventBus) -> Self {
        let backend = Rc::new(RefCell::new(backend));

        let on_resize = {
            let backend = backend.clone();
            bus.subscribe(move |e: &WindowResizeEvent| {
                backend.borrow_mut().set_viewport(e.width, e.height);
            })
        };
        let on_vsync = {
            let backend = backend.clone();
            bus.subscribe(move |e: &VSyncChangedEvent| {
                backend.borrow_mut().set_vsync(e.enabled);
            })
        };

        Self {
            backend,
            _observers: vec![on_resize, on_vsync],
        }
    }

    pub fn clear(&self) {
        self.backend.borrow_mut().clear();
    }

    /// Draws `index_count` indices from the bound vertex array.
    pub fn draw(&self, index_count: u32) {
        if index_count == 0 {
            return;
        }
        self.backend.borrow_mut().draw_indexed(index_count);
    }

    /// Binds the mesh's vertex array and draws all of its indices.
    pub fn draw_mesh(&self, mesh: &Mesh) {
        self.bind_vertex_array(mesh.vertex_array());
        self.draw(mesh.index_count());
    }

    pub fn bind_vertex_array(&self, vertex_array: &VertexArray) {
        self.backend
            .borrow_mut()
            .bind_vertex_array(vertex_array.resource().id());
    }

    pub fn bind_shader(&self, shader: &Shader) {
        self.backend.borrow_mut().bind_shader(shader.resource().id());
    }

    pub fn bind_texture(&self, texture: &Texture2D, slot: u32) {
        self.backend
            .borrow_mut()
            .bind_texture(slot, texture.resource().id());
    }

    pub fn set_viewport(&self, width: u32, height: u32) {
        self.backend.borrow_mut().set_viewport(width, height);
    }

    pub fn present(&self) {
        self.backend.borrow_mut().present();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{Command, HeadlessDevice};
    use crate::resource::{IndexBufferData, ShaderDataType, VertexBufferData, VertexBufferUsage};

    #[test]
    fn resize_event_updates_viewport() {
        let device = HeadlessDevice::new();
        let bus = EventBus::new();
        let _renderer = Renderer::new(Box::new(device.render_backend()), &bus);

        bus.publish(&WindowResizeEvent {
            width: 640,
            height: 480,
        });
        assert!(device.commands().contains(&Command::SetViewport {
            width: 640,
            height: 480
        }));
    }

    #[test]
    fn dropped_renderer_stops_listening() {
        let device = HeadlessDevice::new();
        let bus = EventBus::new();
        drop(Renderer::new(Box::new(device.render_backend()), &bus));

        assert_eq!(bus.observer_count::<WindowResizeEvent>(), 0);
        assert_eq!(bus.observer_count::<VSyncChangedEvent>(), 0);
    }

    #[test]
    fn draw_mesh_binds_then_draws_index_count() {
        let device = HeadlessDevice::new();
        let bus = EventBus::new();
        let renderer = Renderer::new(Box::new(device.render_backend()), &bus);

        let vertices = [0.0f32; 9];
        let mesh = Mesh::new(
            &device.allocator(),
            &VertexBufferData::from_slice(
                &vertices,
                [ShaderDataType::Float3].into_iter().collect(),
                VertexBufferUsage::Static,
            ),
            &IndexBufferData::new(&[0, 1, 2]).unwrap(),
        )
        .unwrap();
        device.clear_commands();

        renderer.draw_mesh(&mesh);
        assert_eq!(
            device.commands(),
            vec![
                Command::BindVertexArray(mesh.vertex_array().resource().id()),
                Command::DrawIndexed { index_count: 3 },
            ]
        );
    }

    #[test]
    fn zero_index_draw_is_skipped() {
        let device = HeadlessDevice::new();
        let renderer = Renderer::new(Box::new(device.render_backend()), &EventBus::new());
        renderer.draw(0);
        assert!(device.commands().is_empty());
    }
}
