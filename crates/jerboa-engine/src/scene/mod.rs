//! Scene-space helpers: rigid transforms and cameras.

mod camera;
mod transform;

pub use camera::{Camera, CameraType};
pub use transform::Transform;
