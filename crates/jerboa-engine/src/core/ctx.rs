use std::cell::Cell;

use crate::event::EventBus;
use crate::input::Input;
use crate::render::GraphicsContext;
use crate::time::FrameTime;
use crate::ui::egui;
use crate::window::Window;

/// What a layer callback can reach.
pub struct LayerContext<'a> {
    /// Timing of the current frame; zero during attach and detach.
    pub time: FrameTime,
    pub window: &'a mut dyn Window,
    pub graphics: &'a GraphicsContext,
    pub input: &'a Input,
    /// Bus shared by all layers. Window resizes are re-published here.
    pub events: &'a EventBus,
    /// UI context; widgets only reach the screen from `on_ui_render`.
    pub ui: &'a egui::Context,
    running: &'a Cell<bool>,
}

impl<'a> LayerContext<'a> {
    pub fn new(
        time: FrameTime,
        window: &'a mut dyn Window,
        graphics: &'a GraphicsContext,
        input: &'a Input,
        events: &'a EventBus,
        ui: &'a egui::Context,
        running: &'a Cell<bool>,
    ) -> Self {
        Self {
            time,
            window,
            graphics,
            input,
            events,
            ui,
            running,
        }
    }

    /// Ends the frame loop once the current frame completes.
    pub fn request_exit(&self) {
        if self.running.replace(false) {
            log::info!("exit requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }
}
