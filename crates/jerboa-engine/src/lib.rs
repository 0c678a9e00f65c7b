//! Jerboa engine crate.
//!
//! Owns the platform window, the event bus, the GPU resource abstraction and
//! the layer-stack frame loop used by the editor.

pub mod backend;
pub mod core;
pub mod event;
pub mod input;
pub mod layer;
pub mod logging;
pub mod render;
pub mod resource;
pub mod scene;
pub mod time;
pub mod ui;
pub mod window;
