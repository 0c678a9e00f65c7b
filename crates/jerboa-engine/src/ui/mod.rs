//! Immediate-mode UI on egui.
//!
//! The application brackets every layer's `on_ui_render` with
//! [`UiBackend::begin_frame`] and [`UiBackend::end_frame`]; layers build
//! their widgets against [`UiBackend::context`]. The wgpu backend provides a
//! windowed implementation that paints over the frame. [`HeadlessUi`] runs
//! the same passes without a window or a GPU.

pub use egui;

use crate::time::FrameTime;
use crate::window::Window;

pub trait UiBackend {
    /// Binds the backend to `window`. Called once, before the first frame.
    fn init(&mut self, window: &dyn Window);

    /// Opens a UI pass. Returns `false` when no pass could be opened, in
    /// which case the layers' UI callbacks are skipped this frame.
    fn begin_frame(&mut self, window: &dyn Window, time: FrameTime) -> bool;

    fn end_frame(&mut self);

    fn shut_down(&mut self);

    fn context(&self) -> &egui::Context;
}

/// Runs egui passes sized to the window but never paints them.
#[derive(Debug, Default)]
pub struct HeadlessUi {
    context: egui::Context,
    initialized: bool,
    in_frame: bool,
    frames: u64,
    last_shape_count: usize,
}

impl HeadlessUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Completed begin/end pairs.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Shapes produced by the last completed pass.
    pub fn last_shape_count(&self) -> usize {
        self.last_shape_count
    }
}

impl UiBackend for HeadlessUi {
    fn init(&mut self, window: &dyn Window) {
        if self.initialized {
            log::error!("ui: backend initialized twice; ignoring");
            return;
        }
        self.initialized = true;
        log::debug!("ui: headless backend bound to \"{}\"", window.title());
    }

    fn begin_frame(&mut self, window: &dyn Window, time: FrameTime) -> bool {
        if !self.initialized {
            log::warn!("ui: begin_frame before init");
            return false;
        }
        debug_assert!(!self.in_frame, "ui frame begun twice");

        let size = egui::vec2(window.width() as f32, window.height() as f32);
        self.context.begin_pass(egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(egui::Pos2::ZERO, size)),
            time: Some(time.elapsed),
            ..Default::default()
        });
        self.in_frame = true;
        true
    }

    fn end_frame(&mut self) {
        if !self.in_frame {
            return;
        }
        self.in_frame = false;
        let output = self.context.end_pass();
        self.last_shape_count = output.shapes.len();
        self.frames += 1;
    }

    fn shut_down(&mut self) {
        if self.initialized {
            log::debug!("ui: headless backend shut down after {} frames", self.frames);
        }
        self.initialized = false;
        self.in_frame = false;
    }

    fn context(&self) -> &egui::Context {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{HeadlessWindow, WindowProps};

    #[test]
    fn second_init_is_ignored() {
        let window = HeadlessWindow::new(WindowProps::default());
        let mut ui = HeadlessUi::new();
        ui.init(&window);
        assert!(ui.begin_frame(&window, FrameTime::zero()));
        ui.init(&window);
        ui.end_frame();
        assert!(ui.is_initialized());
        assert_eq!(ui.frames(), 1);
    }

    #[test]
    fn frames_before_init_do_not_count() {
        let window = HeadlessWindow::new(WindowProps::default());
        let mut ui = HeadlessUi::new();
        assert!(!ui.begin_frame(&window, FrameTime::zero()));
        ui.end_frame();
        assert_eq!(ui.frames(), 0);
    }

    #[test]
    fn shut_down_allows_a_fresh_init() {
        let window = HeadlessWindow::new(WindowProps::default());
        let mut ui = HeadlessUi::new();
        ui.init(&window);
        ui.shut_down();
        assert!(!ui.is_initialized());
        ui.init(&window);
        assert!(ui.is_initialized());
    }

    #[test]
    fn windows_built_in_a_pass_produce_shapes() {
        let window = HeadlessWindow::new(WindowProps::new("ui", 640, 480));
        let mut ui = HeadlessUi::new();
        ui.init(&window);

        let mut clicked = false;
        assert!(ui.begin_frame(&window, FrameTime::zero()));
        egui::Window::new("Window 1").show(ui.context(), |ui| {
            clicked |= ui.button("Hello").clicked();
        });
        ui.end_frame();

        assert!(!clicked);
        assert!(ui.last_shape_count() > 0);
        assert_eq!(ui.frames(), 1);
    }
}
