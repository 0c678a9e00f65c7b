use std::cell::RefCell;
use std::f32::consts::FRAC_PI_2;
use std::rc::Rc;

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use jerboa_engine::core::LayerContext;
use jerboa_engine::event::EventObserver;
use jerboa_engine::input::{Input, Key, MouseButton};
use jerboa_engine::layer::Layer;
use jerboa_engine::render::{FaceCullingMode, FrontFaceWinding, ShaderState};
use jerboa_engine::resource::{Mesh, Shader, Texture2D, TextureUsage};
use jerboa_engine::scene::{Camera, Transform};
use jerboa_engine::ui::egui;
use jerboa_engine::window::{CursorMode, Window};

use crate::cube::{CubeGeometry, checkerboard};

const SHADER_PATH: &str = "assets/shaders/textured.glsl";
const TEXTURE_PATH: &str = "assets/textures/steel-wooden-container/diffuse.png";
const CLEAR_COLOR: Vec4 = Vec4::new(0.11, 0.12, 0.14, 1.0);

/// Free-flying camera state. Yaw and pitch are kept separately so the view
/// never rolls.
#[derive(Debug, Clone)]
struct FlyController {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    /// World units per second.
    speed: f32,
    /// Radians per pixel of mouse travel.
    sensitivity: f32,
}

impl FlyController {
    fn new(position: Vec3) -> Self {
        Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            speed: 3.0,
            sensitivity: 0.003,
        }
    }

    /// `intent` is x = right, y = up, z = forward, each in -1..=1.
    fn step(&mut self, intent: Vec3, look: Vec2, delta: f32) -> Transform {
        self.yaw -= look.x * self.sensitivity;
        self.pitch = (self.pitch - look.y * self.sensitivity).clamp(-FRAC_PI_2 + 0.01, FRAC_PI_2 - 0.01);

        let heading = Transform::from_euler(Vec3::ZERO, 0.0, self.yaw, 0.0);
        let motion = heading.right() * intent.x + Vec3::Y * intent.y + heading.forward() * intent.z;
        if let Some(direction) = motion.try_normalize() {
            self.position += direction * self.speed * delta;
        }

        Transform::from_euler(self.position, self.pitch, self.yaw, 0.0)
    }
}

fn axis(input: &Input, positive: Key, negative: Key) -> f32 {
    let held = |key| if input.is_key_held_down(key) { 1.0 } else { 0.0 };
    held(positive) - held(negative)
}

fn movement_intent(input: &Input) -> Vec3 {
    let vertical = axis(input, Key::E, Key::Q) + axis(input, Key::Space, Key::LeftShift);
    Vec3::new(
        axis(input, Key::D, Key::A),
        vertical.clamp(-1.0, 1.0),
        axis(input, Key::W, Key::S),
    )
}

struct SceneResources {
    cube: Mesh,
    shader: Shader,
    texture: Texture2D,
}

/// Spinning textured cube viewed through a fly camera.
///
/// Hold the right mouse button to look around; WASD moves, Q/E or
/// Shift/Space move down and up, Escape quits. Mouse and keys go to the UI
/// first while it is using them.
pub struct EditorLayer {
    camera: Rc<RefCell<Camera>>,
    controller: FlyController,
    cube_rotation: f32,
    looking: bool,
    show_demo: bool,
    scene: Option<SceneResources>,
    _on_resize: Option<EventObserver>,
}

impl EditorLayer {
    pub fn new() -> Self {
        let start = Vec3::new(0.0, 0.5, 3.0);
        Self {
            camera: Rc::new(RefCell::new(
                Camera::perspective(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0)
                    .with_transform(Transform::from_position(start)),
            )),
            controller: FlyController::new(start),
            cube_rotation: 0.0,
            looking: false,
            show_demo: true,
            scene: None,
            _on_resize: None,
        }
    }

    fn update_look_mode(&mut self, ctx: &mut LayerContext<'_>) {
        // A drag that started on a panel stays with the panel.
        let wants_look = ctx.input.is_mouse_button_held_down(MouseButton::Right)
            && (self.looking || !ctx.ui.wants_pointer_input());
        if wants_look != self.looking {
            self.looking = wants_look;
            ctx.window.set_cursor_mode(if wants_look {
                CursorMode::Disabled
            } else {
                CursorMode::Normal
            });
        }
    }
}

impl Layer for EditorLayer {
    fn name(&self) -> &str {
        "editor"
    }

    fn on_attach(&mut self, ctx: &mut LayerContext<'_>) -> Result<()> {
        let allocator = ctx.graphics.allocator();

        let geometry = CubeGeometry::new();
        let cube = Mesh::new(allocator, &geometry.vertex_data(), &geometry.index_data()?)
            .context("failed to build the cube mesh")?;
        let shader = Shader::from_file(allocator, SHADER_PATH)?;
        let texture = match Texture2D::from_file(allocator, TEXTURE_PATH, TextureUsage::Diffuse) {
            Ok(texture) => texture,
            Err(e) => {
                log::warn!("{e:#}; using a checkerboard instead");
                Texture2D::from_data(allocator, &checkerboard(256, 8)?, TextureUsage::Diffuse, true)
                    .context("failed to create the checkerboard texture")?
            }
        };

        {
            let mut state = ctx.graphics.render_state();
            state.set_clear_color(CLEAR_COLOR);
            state.set_depth_testing_enabled(true);
            state.set_face_culling_mode(FaceCullingMode::Back);
            state.set_front_face_winding(FrontFaceWinding::CounterClockwise);
        }

        self.camera
            .borrow_mut()
            .set_viewport_size(ctx.window.width(), ctx.window.height());
        self._on_resize = Some(Camera::follow_resizes(&self.camera, ctx.events));
        self.scene = Some(SceneResources { cube, shader, texture });
        log::info!("editor layer attached");
        Ok(())
    }

    fn on_detach(&mut self, ctx: &mut LayerContext<'_>) {
        if self.looking {
            ctx.window.set_cursor_mode(CursorMode::Normal);
        }
        self._on_resize = None;
        self.scene = None;
        log::info!("editor layer detached");
    }

    fn on_update(&mut self, ctx: &mut LayerContext<'_>) {
        if ctx.input.is_key_held_down(Key::Escape) {
            ctx.request_exit();
            return;
        }

        self.update_look_mode(ctx);
        let look = if self.looking {
            ctx.input.mouse_movement().as_vec2()
        } else {
            Vec2::ZERO
        };
        let intent = if ctx.ui.wants_keyboard_input() {
            Vec3::ZERO
        } else {
            movement_intent(ctx.input)
        };
        let transform = self.controller.step(intent, look, ctx.time.delta);
        self.camera.borrow_mut().transform = transform;

        self.cube_rotation = (self.cube_rotation + ctx.time.delta * 0.6) % std::f32::consts::TAU;

        let Some(scene) = &self.scene else { return };
        let renderer = ctx.graphics.renderer();
        scene.shader.bind(renderer);
        {
            let mut uniforms = ctx.graphics.shader_state();
            uniforms.set_mat4("u_ViewProjection", self.camera.borrow().view_projection());
            uniforms.set_mat4(
                "u_Model",
                Mat4::from_quat(Quat::from_rotation_y(self.cube_rotation) * Quat::from_rotation_x(0.4)),
            );
            uniforms.set_vec4("u_Tint", Vec4::ONE);
        }
        scene.texture.bind(renderer, 0);
        renderer.draw_mesh(&scene.cube);
    }

    fn on_ui_render(&mut self, ctx: &mut LayerContext<'_>) {
        let ui_ctx = ctx.ui;
        let time = ctx.time;
        let position = self.controller.position;

        egui::Window::new("Demo")
            .open(&mut self.show_demo)
            .default_pos([16.0, 16.0])
            .show(ui_ctx, |ui| {
                ui.label(format!("frame {}", time.frame_index));
                ui.label(format!(
                    "{:.2} ms ({:.0} fps)",
                    time.delta * 1000.0,
                    1.0 / time.delta.max(f32::EPSILON)
                ));
                ui.label(format!(
                    "camera at ({:.2}, {:.2}, {:.2})",
                    position.x, position.y, position.z
                ));
                ui.separator();
                ui.collapsing("Settings", |ui| ui_ctx.settings_ui(ui));
                ui.collapsing("Inspection", |ui| ui_ctx.inspection_ui(ui));
            });

        for title in ["Window 1", "Window 2"] {
            egui::Window::new(title).show(ui_ctx, |ui| {
                if ui.button("Hello").clicked() {
                    log::info!("{title}: hello");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-4)
    }

    #[test]
    fn forward_intent_moves_down_negative_z() {
        let mut fly = FlyController::new(Vec3::ZERO);
        let t = fly.step(Vec3::Z, Vec2::ZERO, 1.0);
        assert!(close(t.position, Vec3::new(0.0, 0.0, -3.0)));
    }

    #[test]
    fn diagonal_movement_is_not_faster() {
        let mut fly = FlyController::new(Vec3::ZERO);
        let t = fly.step(Vec3::new(1.0, 0.0, 1.0), Vec2::ZERO, 1.0);
        assert!((t.position.length() - fly.speed).abs() < 1e-4);
    }

    #[test]
    fn pitch_stops_short_of_vertical() {
        let mut fly = FlyController::new(Vec3::ZERO);
        let t = fly.step(Vec3::ZERO, Vec2::new(0.0, -100_000.0), 0.0);
        assert!(fly.pitch < FRAC_PI_2);
        assert!(t.forward().y > 0.99);
        assert!(t.up().y > 0.0);
    }

    #[test]
    fn looking_does_not_tilt_horizontal_movement() {
        let mut fly = FlyController::new(Vec3::ZERO);
        fly.step(Vec3::ZERO, Vec2::new(0.0, -200.0), 0.0);
        let t = fly.step(Vec3::Z, Vec2::ZERO, 1.0);
        assert!(t.position.y.abs() < 1e-4);
    }

    #[test]
    fn ui_pass_builds_all_panels() {
        use jerboa_engine::backend::headless::HeadlessDevice;
        use jerboa_engine::time::FrameTime;
        use jerboa_engine::ui::{HeadlessUi, UiBackend};
        use jerboa_engine::window::{HeadlessWindow, WindowProps};
        use std::cell::Cell;

        let mut window = HeadlessWindow::new(WindowProps::new("editor", 1280, 720));
        let device = HeadlessDevice::new();
        let graphics = device.create_context(window.event_bus());
        let input = Input::attach(window.event_bus());
        let events = jerboa_engine::event::EventBus::new();
        let running = Cell::new(true);
        let mut ui = HeadlessUi::new();
        ui.init(&window);

        let mut layer = EditorLayer::new();
        assert!(ui.begin_frame(&window, FrameTime::zero()));
        {
            let mut ctx = LayerContext::new(
                FrameTime::zero(),
                &mut window,
                &graphics,
                &input,
                &events,
                ui.context(),
                &running,
            );
            layer.on_ui_render(&mut ctx);
        }
        ui.end_frame();

        let ids = ["Demo", "Window 1", "Window 2"].map(egui::Id::new);
        ui.context().memory(|memory| {
            for id in ids {
                assert!(memory.area_rect(id).is_some(), "missing panel {id:?}");
            }
        });
        assert!(ui.last_shape_count() > 0);
    }

    #[test]
    fn mouse_right_turns_right() {
        let mut fly = FlyController::new(Vec3::ZERO);
        let t = fly.step(Vec3::ZERO, Vec2::new(100.0, 0.0), 0.0);
        assert!(t.forward().x > 0.0);
    }
}
