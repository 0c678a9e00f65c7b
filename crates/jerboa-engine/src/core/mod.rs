//! Application frame loop and the context handed to layers.

mod app;
mod ctx;

pub use app::{AppState, Application, ApplicationHooks, ApplicationProps};
pub use ctx::LayerContext;
