//! Input subsystem.
//!
//! Public types are platform-agnostic. The window backend translates
//! platform events into bus events; [`Input`] folds those into pollable
//! state.

mod state;
mod types;

pub use state::Input;
pub use types::{Key, Modifiers, MouseButton};
