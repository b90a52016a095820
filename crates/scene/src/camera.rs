//! Perspective camera and first-person camera control.

use glam::{EulerRot, Mat4, Quat, Vec3};

/// A perspective camera positioned in world space.
///
/// The projection matrix is produced for Vulkan clip space: Y is flipped
/// relative to the OpenGL convention and depth runs from 0 to 1.
#[derive(Clone, Debug)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Camera orientation
    pub rotation: Quat,
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            rotation: Quat::IDENTITY,
            fov_y: 45.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.01,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Create a camera with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the perspective projection parameters.
    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.fov_y = fov_y;
        self.aspect = aspect;
        self.near = near;
        self.far = far;
    }

    /// Update the aspect ratio, keeping the other projection parameters.
    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        let forward = self.rotation * Vec3::NEG_Z;
        Mat4::look_at_rh(self.position, self.position + forward, Vec3::Y)
    }

    /// Get the projection matrix with the Vulkan Y-flip applied.
    pub fn projection_matrix(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        // Flip Y for Vulkan clip space
        proj.y_axis.y *= -1.0;
        proj
    }

    /// Get the combined view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get the forward direction vector.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    /// Get the right direction vector.
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Get the up direction vector.
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Orient the camera towards a target position.
    pub fn look_at(&mut self, target: Vec3) {
        let to_target = target - self.position;
        if to_target.length_squared() > 0.0 {
            self.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, to_target.normalize());
        }
    }
}

/// Maximum pitch angle in radians, slightly short of straight up/down
/// so the view direction never becomes collinear with the world up axis.
const PITCH_LIMIT: f32 = 1.54;

/// First-person camera controller driven by mouse look and WASD-style input.
///
/// The controller accumulates yaw and pitch from mouse movement and a
/// movement vector from keyboard input, then applies both to a [`Camera`]
/// each frame via [`update_camera`](Self::update_camera).
#[derive(Clone, Debug)]
pub struct FpsController {
    /// Movement speed in world units per second
    pub move_speed: f32,
    /// Radians of rotation per pixel of mouse movement
    pub mouse_sensitivity: f32,
    yaw: f32,
    pitch: f32,
    movement: Vec3,
}

impl Default for FpsController {
    fn default() -> Self {
        Self::with_settings(3.0, 0.002)
    }
}

impl FpsController {
    /// Create a controller with default speed and sensitivity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a controller with the given movement speed and mouse sensitivity.
    pub fn with_settings(move_speed: f32, mouse_sensitivity: f32) -> Self {
        Self {
            move_speed,
            mouse_sensitivity,
            yaw: 0.0,
            pitch: 0.0,
            movement: Vec3::ZERO,
        }
    }

    /// Accumulate yaw and pitch from a mouse delta in pixels.
    ///
    /// Positive `dx` turns right, positive `dy` looks down. Pitch is clamped
    /// so the camera cannot flip over.
    pub fn process_mouse_movement(&mut self, dx: f32, dy: f32) {
        self.yaw -= dx * self.mouse_sensitivity;
        self.pitch = (self.pitch - dy * self.mouse_sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Set the movement input for this frame.
    ///
    /// Each axis is expected in `-1.0..=1.0`: `forward` along the view
    /// direction, `right` along the camera's right vector, `up` along the
    /// world up axis.
    pub fn set_movement_input(&mut self, forward: f32, right: f32, up: f32) {
        self.movement = Vec3::new(right, up, -forward);
    }

    /// Current yaw in radians.
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Current pitch in radians.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Apply the accumulated rotation and movement input to the camera.
    pub fn update_camera(&self, camera: &mut Camera, delta_time: f32) {
        camera.rotation = Quat::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0);

        if self.movement.length_squared() > 0.0 {
            let direction = self.movement.normalize();
            let horizontal = camera.rotation * Vec3::new(direction.x, 0.0, direction.z);
            let velocity = (horizontal + Vec3::Y * direction.y) * self.move_speed;
            camera.position += velocity * delta_time;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < EPSILON
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::new();
        let proj = camera.projection_matrix();

        // Vulkan clip space has Y pointing down
        assert!(proj.y_axis.y < 0.0);
    }

    #[test]
    fn test_set_aspect_ignores_invalid_values() {
        let mut camera = Camera::new();
        camera.set_aspect(2.0);
        let reference = camera.projection_matrix();

        camera.set_aspect(0.0);
        assert_eq!(camera.projection_matrix(), reference);

        camera.set_aspect(f32::NAN);
        assert_eq!(camera.projection_matrix(), reference);
    }

    #[test]
    fn test_view_matrix_translates_world_opposite() {
        let mut camera = Camera::new();
        camera.position = Vec3::new(0.0, 0.0, 5.0);

        let view = camera.view_matrix();
        let origin_in_view = view.transform_point3(Vec3::ZERO);

        // The world origin sits 5 units in front of the camera (-Z in view space)
        assert!(approx_eq_vec3(origin_in_view, Vec3::new(0.0, 0.0, -5.0)));
    }

    #[test]
    fn test_look_at_faces_target() {
        let mut camera = Camera::new();
        camera.position = Vec3::ZERO;
        camera.look_at(Vec3::new(10.0, 0.0, 0.0));

        assert!(approx_eq_vec3(camera.forward(), Vec3::X));
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut controller = FpsController::with_settings(3.0, 1.0);
        controller.process_mouse_movement(0.0, -10_000.0);

        assert!(controller.pitch() <= PITCH_LIMIT);

        controller.process_mouse_movement(0.0, 20_000.0);
        assert!(controller.pitch() >= -PITCH_LIMIT);
    }

    #[test]
    fn test_zero_input_does_not_move_camera() {
        let controller = FpsController::new();
        let mut camera = Camera::new();
        let start = camera.position;

        controller.update_camera(&mut camera, 0.016);
        assert_eq!(camera.position, start);
    }

    #[test]
    fn test_forward_input_moves_along_view_direction() {
        let mut controller = FpsController::with_settings(1.0, 0.002);
        let mut camera = Camera::new();
        camera.position = Vec3::ZERO;

        controller.set_movement_input(1.0, 0.0, 0.0);
        controller.update_camera(&mut camera, 1.0);

        // Default orientation faces -Z; one second at speed 1 covers one unit
        assert!(approx_eq_vec3(camera.position, Vec3::NEG_Z));
    }

    #[test]
    fn test_diagonal_input_is_normalized() {
        let mut controller = FpsController::with_settings(1.0, 0.002);
        let mut camera = Camera::new();
        camera.position = Vec3::ZERO;

        controller.set_movement_input(1.0, 1.0, 0.0);
        controller.update_camera(&mut camera, 1.0);

        assert!((camera.position.length() - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_yaw_turns_camera() {
        let mut controller = FpsController::with_settings(3.0, 1.0);
        let mut camera = Camera::new();

        // Quarter turn to the left
        controller.process_mouse_movement(-std::f32::consts::FRAC_PI_2, 0.0);
        controller.update_camera(&mut camera, 0.0);

        assert!(approx_eq_vec3(camera.forward(), Vec3::NEG_X));
    }
}
