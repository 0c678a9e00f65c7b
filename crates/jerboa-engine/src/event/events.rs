use crate::input::{Key, Modifiers, MouseButton};

/// Framebuffer size changed, in physical pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WindowResizeEvent {
    pub width: u32,
    pub height: u32,
}

/// The user asked to close the window.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct WindowCloseEvent;

/// Swap interval changed through [`Window::set_vsync`](crate::window::Window::set_vsync).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VSyncChangedEvent {
    pub enabled: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KeyPressedEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KeyReleasedEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

/// Key held long enough for the platform to auto-repeat it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KeyRepeatEvent {
    pub key: Key,
    pub modifiers: Modifiers,
}

/// Cursor position in window coordinates.
///
/// With [`CursorMode::Disabled`](crate::window::CursorMode::Disabled) the
/// position is virtual and unbounded.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MouseMovedEvent {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MouseScrolledEvent {
    pub x_offset: f64,
    pub y_offset: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MouseButtonPressedEvent {
    pub button: MouseButton,
    pub modifiers: Modifiers,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MouseButtonReleasedEvent {
    pub button: MouseButton,
    pub modifiers: Modifiers,
}
