use std::cell::RefCell;
use std::rc::Rc;

use glam::Mat4;

use crate::event::{EventBus, EventObserver, WindowResizeEvent};

use super::transform::Transform;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CameraType {
    /// Vertical field of view in radians.
    Perspective { fov_y: f32 },
    /// Height of the view volume in world units; width follows the aspect.
    Orthographic { height: f32 },
}

/// A transform looking down its local -Z axis through a projection.
///
/// Projections map depth to `0..=1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub transform: Transform,
    kind: CameraType,
    near: f32,
    far: f32,
    aspect: f32,
}

impl Camera {
    pub fn new(kind: CameraType, aspect: f32, near: f32, far: f32) -> Self {
        debug_assert!(near > 0.0 && far > near, "invalid clip range {near}..{far}");
        Self {
            transform: Transform::IDENTITY,
            kind,
            near,
            far,
            aspect: if aspect > 0.0 { aspect } else { 1.0 },
        }
    }

    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::new(CameraType::Perspective { fov_y }, aspect, near, far)
    }

    pub fn orthographic(height: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self::new(CameraType::Orthographic { height }, aspect, near, far)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn kind(&self) -> CameraType {
        self.kind
    }

    pub fn set_kind(&mut self, kind: CameraType) {
        self.kind = kind;
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Sets the aspect from a framebuffer size. Zero sizes (a minimized
    /// window) keep the previous aspect.
    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.transform.matrix().inverse()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        match self.kind {
            CameraType::Perspective { fov_y } => {
                Mat4::perspective_rh(fov_y, self.aspect, self.near, self.far)
            }
            CameraType::Orthographic { height } => {
                let half_h = height * 0.5;
                let half_w = half_h * self.aspect;
                Mat4::orthographic_rh(-half_w, half_w, -half_h, half_h, self.near, self.far)
            }
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Keeps `camera`'s aspect in step with resizes published on `bus`.
    pub fn follow_resizes(camera: &Rc<RefCell<Camera>>, bus: &EventBus) -> EventObserver {
        let camera = camera.clone();
        bus.subscribe(move |e: &WindowResizeEvent| {
            camera.borrow_mut().set_viewport_size(e.width, e.height);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use glam::{Vec3, Vec4Swizzles};

    use super::*;

    #[test]
    fn field_of_view_is_honored() {
        let narrow = Camera::perspective(0.5, 1.0, 0.1, 100.0);
        let wide = Camera::perspective(FRAC_PI_2, 1.0, 0.1, 100.0);
        // y scale is 1 / tan(fov / 2)
        assert!((wide.projection_matrix().y_axis.y - 1.0).abs() < 1e-5);
        assert!(narrow.projection_matrix().y_axis.y > wide.projection_matrix().y_axis.y);
    }

    #[test]
    fn view_moves_the_world_opposite_the_camera() {
        let camera = Camera::perspective(FRAC_PI_2, 1.0, 0.1, 100.0)
            .with_transform(Transform::from_position(Vec3::new(0.0, 0.0, 5.0)));
        let p = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, -5.0), 1e-5));
    }

    #[test]
    fn depth_maps_to_unit_range() {
        let camera = Camera::perspective(FRAC_PI_2, 1.0, 1.0, 10.0);
        let proj = camera.projection_matrix();
        let near = proj * Vec3::new(0.0, 0.0, -1.0).extend(1.0);
        let far = proj * Vec3::new(0.0, 0.0, -10.0).extend(1.0);
        assert!((near.z / near.w).abs() < 1e-5);
        assert!((far.z / far.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn orthographic_width_follows_aspect() {
        let camera = Camera::orthographic(4.0, 2.0, 0.1, 10.0);
        let corner = camera.projection_matrix() * Vec3::new(4.0, 2.0, -1.0).extend(1.0);
        assert!(corner.xy().abs_diff_eq(glam::Vec2::ONE, 1e-5));
    }

    #[test]
    fn resize_updates_aspect() {
        let bus = EventBus::new();
        let camera = Rc::new(RefCell::new(Camera::perspective(1.0, 1.0, 0.1, 10.0)));
        let _observer = Camera::follow_resizes(&camera, &bus);

        bus.publish(&WindowResizeEvent {
            width: 1600,
            height: 900,
        });
        assert!((camera.borrow().aspect() - 16.0 / 9.0).abs() < 1e-6);

        bus.publish(&WindowResizeEvent { width: 0, height: 0 });
        assert!((camera.borrow().aspect() - 16.0 / 9.0).abs() < 1e-6);
    }
}
