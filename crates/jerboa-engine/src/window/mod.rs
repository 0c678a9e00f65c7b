//! Platform windows.
//!
//! [`Window`] is the engine-facing contract. [`WinitWindow`] drives a real
//! desktop window; [`HeadlessWindow`] has no platform surface and lets the
//! caller inject events.

mod headless;
mod winit_window;

use glam::IVec2;

use crate::event::EventBus;

pub use self::headless::HeadlessWindow;
pub use self::winit_window::{PlatformEvents, WinitWindow};

/// How the cursor behaves over the window.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum CursorMode {
    /// Visible and free.
    #[default]
    Normal,
    /// Invisible over the window but free to leave it.
    Hidden,
    /// Invisible and locked; reported positions are virtual and unbounded.
    Disabled,
}

/// Window creation parameters.
#[derive(Debug, Clone)]
pub struct WindowProps {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub cursor_mode: CursorMode,
}

impl Default for WindowProps {
    fn default() -> Self {
        Self {
            title: "Jerboa Engine".to_string(),
            width: 1280,
            height: 720,
            cursor_mode: CursorMode::Normal,
        }
    }
}

impl WindowProps {
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            ..Self::default()
        }
    }

    pub fn with_cursor_mode(mut self, mode: CursorMode) -> Self {
        self.cursor_mode = mode;
        self
    }
}

/// Engine-facing window contract.
///
/// Platform input is published on [`Window::event_bus`] from inside
/// [`Window::update`].
pub trait Window {
    fn title(&self) -> &str;

    /// Framebuffer width in physical pixels.
    fn width(&self) -> u32;

    /// Framebuffer height in physical pixels.
    fn height(&self) -> u32;

    /// Top-left corner in screen coordinates.
    fn position(&self) -> IVec2;

    fn event_bus(&self) -> &EventBus;

    /// Records the swap interval and publishes a `VSyncChangedEvent` so the
    /// renderer can reconfigure presentation.
    fn set_vsync(&mut self, enabled: bool);

    fn is_vsync(&self) -> bool;

    fn cursor_mode(&self) -> CursorMode;

    fn set_cursor_mode(&mut self, mode: CursorMode);

    /// Polls platform events and publishes them on the bus.
    fn update(&mut self);
}
