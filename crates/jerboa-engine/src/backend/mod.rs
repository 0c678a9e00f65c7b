//! Graphics backends behind the [`GraphicsContext`](crate::render::GraphicsContext)
//! traits.

pub mod headless;
pub mod wgpu_backend;

pub use headless::HeadlessDevice;
