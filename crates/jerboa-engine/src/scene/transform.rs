use glam::{EulerRot, Mat4, Quat, Vec3};

/// Position plus orientation.
///
/// Local axes follow the usual right-handed convention: -Z forward, +X
/// right, +Y up.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub orientation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation: orientation.normalize(),
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
        }
    }

    /// `angle` in radians around `axis`, which need not be normalized.
    pub fn from_axis_angle(position: Vec3, axis: Vec3, angle: f32) -> Self {
        let axis = axis.try_normalize().unwrap_or(Vec3::Y);
        Self::new(position, Quat::from_axis_angle(axis, angle))
    }

    /// Yaw around +Y, then pitch around +X, then roll around -Z; radians.
    pub fn from_euler(position: Vec3, pitch: f32, yaw: f32, roll: f32) -> Self {
        Self::new(position, Quat::from_euler(EulerRot::YXZ, yaw, pitch, roll))
    }

    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }

    /// Applies `rotation` in world space.
    pub fn rotate(&mut self, rotation: Quat) {
        self.orientation = (rotation * self.orientation).normalize();
    }

    /// Applies `rotation` in the transform's own frame.
    pub fn rotate_local(&mut self, rotation: Quat) {
        self.orientation = (self.orientation * rotation).normalize();
    }

    /// World-space rotation of `angle` radians around `axis`.
    pub fn rotate_axis_angle(&mut self, axis: Vec3, angle: f32) {
        if let Some(axis) = axis.try_normalize() {
            self.rotate(Quat::from_axis_angle(axis, angle));
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.orientation * Self::world_forward()
    }

    pub fn right(&self) -> Vec3 {
        self.orientation * Self::world_right()
    }

    pub fn up(&self) -> Vec3 {
        self.orientation * Self::world_up()
    }

    pub const fn world_forward() -> Vec3 {
        Vec3::NEG_Z
    }

    pub const fn world_right() -> Vec3 {
        Vec3::X
    }

    pub const fn world_up() -> Vec3 {
        Vec3::Y
    }

    /// Local-to-world matrix.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    #[test]
    fn identity_axes() {
        let t = Transform::default();
        assert_eq!(t.forward(), Vec3::NEG_Z);
        assert_eq!(t.right(), Vec3::X);
        assert_eq!(t.up(), Vec3::Y);
    }

    #[test]
    fn yaw_turns_forward_to_the_left() {
        let t = Transform::from_euler(Vec3::ZERO, 0.0, FRAC_PI_2, 0.0);
        assert!(close(t.forward(), Vec3::NEG_X));
        assert!(close(t.right(), Vec3::NEG_Z));
        assert!(close(t.up(), Vec3::Y));
    }

    #[test]
    fn axis_angle_matches_euler_pitch() {
        let a = Transform::from_axis_angle(Vec3::ZERO, Vec3::X * 3.0, FRAC_PI_2);
        let b = Transform::from_euler(Vec3::ZERO, FRAC_PI_2, 0.0, 0.0);
        assert!(close(a.forward(), b.forward()));
        assert!(close(a.forward(), Vec3::Y));
    }

    #[test]
    fn world_and_local_rotation_differ() {
        let pitched = Transform::from_euler(Vec3::ZERO, FRAC_PI_2, 0.0, 0.0);

        let mut world = pitched;
        world.rotate(Quat::from_rotation_y(FRAC_PI_2));
        let mut local = pitched;
        local.rotate_local(Quat::from_rotation_y(FRAC_PI_2));

        assert!(close(world.forward(), Vec3::Y));
        assert!(close(local.forward(), Vec3::NEG_X));
    }

    #[test]
    fn matrix_places_local_points() {
        let t = Transform::from_axis_angle(Vec3::new(1.0, 2.0, 3.0), Vec3::Y, FRAC_PI_2);
        let p = t.matrix().transform_point3(Vec3::NEG_Z);
        assert!(close(p, Vec3::new(0.0, 2.0, 3.0)));
    }

    #[test]
    fn zero_axis_rotation_is_ignored() {
        let mut t = Transform::default();
        t.rotate_axis_angle(Vec3::ZERO, 1.0);
        assert_eq!(t.orientation, Quat::IDENTITY);
    }
}
