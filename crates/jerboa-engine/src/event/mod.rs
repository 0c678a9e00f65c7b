//! Typed event bus and the window/input event payloads published on it.
//!
//! Dispatch is synchronous: `publish` returns after every observer ran.

mod bus;
mod events;

pub use bus::{EventBus, EventObserver};
pub use events::{
    KeyPressedEvent, KeyReleasedEvent, KeyRepeatEvent, MouseButtonPressedEvent,
    MouseButtonReleasedEvent, MouseMovedEvent, MouseScrolledEvent, VSyncChangedEvent,
    WindowCloseEvent, WindowResizeEvent,
};
