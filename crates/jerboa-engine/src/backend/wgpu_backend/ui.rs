//! egui on the wgpu surface.

use std::sync::Arc;

use winit::window::Window as PlatformWindow;

use crate::time::FrameTime;
use crate::ui::{UiBackend, egui};
use crate::window::{PlatformEvents, Window};

use super::SharedRef;
use super::ui_painter::UiFrame;

/// [`UiBackend`] fed from the window's raw events and painted by the
/// backend at present, over everything the frame drew.
pub struct WgpuUi {
    shared: SharedRef,
    window: Arc<PlatformWindow>,
    events: PlatformEvents,
    context: egui::Context,
    state: Option<egui_winit::State>,
    in_frame: bool,
}

impl WgpuUi {
    pub(super) fn new(shared: SharedRef, window: Arc<PlatformWindow>, events: PlatformEvents) -> Self {
        Self {
            shared,
            window,
            events,
            context: egui::Context::default(),
            state: None,
            in_frame: false,
        }
    }
}

impl UiBackend for WgpuUi {
    fn init(&mut self, window: &dyn Window) {
        if self.state.is_some() {
            log::error!("ui: backend initialized twice; ignoring");
            return;
        }

        let max_texture_side = {
            let mut shared = self.shared.borrow_mut();
            if let Err(e) = shared.ensure_ui_painter() {
                log::error!("ui: painter unavailable, UI disabled: {e:#}");
                return;
            }
            shared.gpu.device().limits().max_texture_dimension_2d as usize
        };

        // Anything queued before init belongs to start-up.
        self.events.drain();
        self.state = Some(egui_winit::State::new(
            self.context.clone(),
            egui::ViewportId::ROOT,
            &*self.window,
            Some(self.window.scale_factor() as f32),
            None,
            Some(max_texture_side),
        ));
        log::info!("ui: egui bound to \"{}\"", window.title());
    }

    fn begin_frame(&mut self, _window: &dyn Window, time: FrameTime) -> bool {
        let events = self.events.drain();
        let Some(state) = self.state.as_mut() else {
            return false;
        };
        debug_assert!(!self.in_frame, "ui frame begun twice");

        for event in &events {
            let _ = state.on_window_event(&self.window, event);
        }
        let mut input = state.take_egui_input(&self.window);
        input.time = Some(time.elapsed);
        self.context.begin_pass(input);
        self.in_frame = true;
        true
    }

    fn end_frame(&mut self) {
        if !std::mem::take(&mut self.in_frame) {
            return;
        }
        let output = self.context.end_pass();
        if let Some(state) = self.state.as_mut() {
            state.handle_platform_output(&self.window, output.platform_output);
        }

        let primitives = self
            .context
            .tessellate(output.shapes, output.pixels_per_point);
        self.shared.borrow_mut().queue_ui(
            output.textures_delta,
            UiFrame {
                primitives,
                pixels_per_point: output.pixels_per_point,
                free: Vec::new(),
            },
        );
    }

    fn shut_down(&mut self) {
        if self.state.take().is_some() {
            log::debug!("ui: egui backend shut down");
        }
        self.in_frame = false;
        self.shared.borrow_mut().release_ui_painter();
    }

    fn context(&self) -> &egui::Context {
        &self.context
    }
}
