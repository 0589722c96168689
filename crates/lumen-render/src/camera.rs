//! FPS-style camera.

use glam::{Mat4, Vec2, Vec3};

/// Degrees of rotation per pixel of mouse motion.
pub const MOUSE_SENSITIVITY: f32 = 0.05;
/// Pitch is kept strictly inside this range to avoid flipping at the poles.
pub const PITCH_LIMIT: f32 = 89.0;

/// Movement speed in units per second.
const BASE_SPEED: f32 = 3.0;
/// Added to the speed while boosting.
const BOOST_SPEED: f32 = 4.5;
/// Divides the speed while moving slowly.
const SLOW_DIVISOR: f32 = 10.0;

/// Movement keys held this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementInput {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    /// Move faster (shift).
    pub fast: bool,
    /// Move much slower (control).
    pub slow: bool,
}

/// Camera driven by yaw/pitch mouse look and WASD movement.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub front: Vec3,
    pub up: Vec3,
    /// Degrees. -90 looks down -Z.
    pub yaw: f32,
    /// Degrees, clamped to +-[`PITCH_LIMIT`].
    pub pitch: f32,
    /// Vertical field of view in degrees.
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            front: Vec3::NEG_Z,
            up: Vec3::Y,
            yaw: -90.0,
            pitch: 0.0,
            fov_y: 45.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    /// Apply mouse motion in pixels. Positive `delta.y` moves the view down.
    pub fn rotate(&mut self, delta: Vec2) {
        self.yaw += delta.x * MOUSE_SENSITIVITY;
        self.pitch = (self.pitch - delta.y * MOUSE_SENSITIVITY).clamp(-PITCH_LIMIT, PITCH_LIMIT);

        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos())
            .normalize();
    }

    /// Current speed in units per second for the given modifiers.
    pub fn speed(input: &MovementInput) -> f32 {
        let mut speed = BASE_SPEED;
        if input.fast {
            speed += BOOST_SPEED;
        }
        if input.slow {
            speed /= SLOW_DIVISOR;
        }
        speed
    }

    /// Move along the view direction and its horizontal right vector.
    pub fn translate(&mut self, input: &MovementInput, dt: f32) {
        let step = Self::speed(input) * dt;
        let right = self.front.cross(self.up).normalize();

        if input.forward {
            self.position += self.front * step;
        }
        if input.back {
            self.position -= self.front * step;
        }
        if input.left {
            self.position -= right * step;
        }
        if input.right {
            self.position += right * step;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Perspective projection with Y flipped for Vulkan clip space.
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let mut projection =
            Mat4::perspective_rh(self.fov_y.to_radians(), aspect, self.near, self.far);
        projection.y_axis.y *= -1.0;
        projection
    }
}

/// Uniform buffer contents, one copy per frame slot.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct UniformBufferObject {
    pub model: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
}

impl UniformBufferObject {
    pub fn new(model: Mat4, camera: &Camera, aspect: f32) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            projection: camera.projection_matrix(aspect).to_cols_array_2d(),
        }
    }
}

/// Model transform for assets authored Z-up: rotate -90 degrees about X.
pub fn default_model_matrix() -> Mat4 {
    Mat4::from_rotation_x(-90f32.to_radians())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_looks_down_negative_z() {
        let mut camera = Camera::default();
        camera.rotate(Vec2::ZERO);
        assert_relative_eq!(camera.front.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(camera.front.z, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut camera = Camera::default();
        camera.rotate(Vec2::new(0.0, -100_000.0));
        assert_relative_eq!(camera.pitch, PITCH_LIMIT);
        camera.rotate(Vec2::new(0.0, 100_000.0));
        assert_relative_eq!(camera.pitch, -PITCH_LIMIT);
        assert!(camera.front.y < 0.0);
    }

    #[test]
    fn mouse_sensitivity_scales_yaw() {
        let mut camera = Camera::default();
        camera.rotate(Vec2::new(100.0, 0.0));
        assert_relative_eq!(camera.yaw, -90.0 + 100.0 * MOUSE_SENSITIVITY);
    }

    #[test]
    fn speed_modifiers() {
        let normal = Camera::speed(&MovementInput::default());
        let fast = Camera::speed(&MovementInput {
            fast: true,
            ..Default::default()
        });
        let slow = Camera::speed(&MovementInput {
            slow: true,
            ..Default::default()
        });
        assert!(fast > normal);
        assert_relative_eq!(slow, normal / 10.0);
    }

    #[test]
    fn forward_moves_along_front() {
        let mut camera = Camera::default();
        let start = camera.position;
        camera.translate(
            &MovementInput {
                forward: true,
                ..Default::default()
            },
            1.0,
        );
        assert_relative_eq!(start.z - camera.position.z, Camera::speed(&MovementInput::default()));

        let before = camera.position;
        camera.translate(
            &MovementInput {
                right: true,
                ..Default::default()
            },
            1.0,
        );
        assert!(camera.position.x > before.x);
    }

    #[test]
    fn projection_flips_y() {
        let camera = Camera::default();
        let gl = Mat4::perspective_rh(45f32.to_radians(), 1.5, 0.1, 100.0);
        let vk = camera.projection_matrix(1.5);
        assert_relative_eq!(vk.y_axis.y, -gl.y_axis.y);
        assert_relative_eq!(vk.x_axis.x, gl.x_axis.x);
    }

    #[test]
    fn model_matrix_maps_z_up_to_y_up() {
        let up = default_model_matrix().transform_vector3(Vec3::Z);
        assert_relative_eq!(up.y, 1.0, epsilon = 1e-6);
    }
}
