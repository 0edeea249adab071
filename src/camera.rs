//! Camera module for 3D rendering
//!
//! Orbit camera circling a target point with yaw/pitch/distance controls.

use crate::config::CONFIG;
use glam::{Mat4, Vec3};

/// Camera state and controls
pub struct Camera {
    /// Point the camera orbits and looks at
    pub target: Vec3,
    /// Distance from the target
    pub distance: f32,
    /// Horizontal angle in radians
    pub yaw: f32,
    /// Angle above the horizon in radians
    pub pitch: f32,
    /// Field of view in radians
    pub fov: f32,
    /// Aspect ratio (width / height)
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Radians per pixel of drag
    pub sensitivity: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_pitch: f32,
    pub max_pitch: f32,
}

impl Camera {
    /// Create a new camera with configured defaults
    pub fn new(aspect: f32) -> Self {
        let config = &CONFIG.camera;
        Self {
            target: config.target,
            distance: config.distance,
            yaw: config.yaw.to_radians(),
            pitch: config.pitch.to_radians(),
            fov: config.fov.to_radians(),
            aspect,
            near: config.near,
            far: config.far,
            sensitivity: config.sensitivity,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            min_pitch: -1.2,
            max_pitch: 1.45,
        }
    }

    /// World-space eye position
    pub fn position(&self) -> Vec3 {
        let offset = Vec3::new(
            self.yaw.sin() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.cos() * self.pitch.cos(),
        );
        self.target + offset * self.distance
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position(), self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Update aspect ratio (on window resize)
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    /// Orbit by a mouse drag in pixels
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        self.yaw -= delta_x * self.sensitivity;
        self.pitch = (self.pitch + delta_y * self.sensitivity).clamp(self.min_pitch, self.max_pitch);
    }

    /// Zoom by scroll lines; positive moves closer
    pub fn zoom(&mut self, lines: f32) {
        self.distance = (self.distance * 0.9_f32.powf(lines)).clamp(self.min_distance, self.max_distance);
    }

    /// Camera right and up vectors, for billboards
    pub fn billboard_axes(&self) -> (Vec3, Vec3) {
        let forward = (self.target - self.position()).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();
        let up = right.cross(forward);
        (right, up)
    }

    /// Frame a prop whose bounds reach `radius` from the target
    pub fn frame_radius(&mut self, radius: f32) {
        let fit = radius / (self.fov / 2.0).tan() * 1.2;
        self.distance = fit.clamp(self.min_distance, self.max_distance);
    }

    pub fn reset(&mut self) {
        let aspect = self.aspect;
        *self = Self::new(aspect);
    }
}

/// Uniform buffer data for camera (GPU-compatible)
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    /// Camera position in world space
    pub position: [f32; 4],
    /// Billboard right axis
    pub right: [f32; 4],
    /// Billboard up axis
    pub up: [f32; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            position: [0.0; 4],
            right: [1.0, 0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0, 0.0],
        }
    }

    pub fn update(&mut self, camera: &Camera) {
        self.view_proj = camera.view_projection_matrix().to_cols_array_2d();
        self.position = camera.position().extend(1.0).to_array();
        let (right, up) = camera.billboard_axes();
        self.right = right.extend(0.0).to_array();
        self.up = up.extend(0.0).to_array();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_orbit_keeps_distance() {
        let mut camera = Camera::new(16.0 / 9.0);
        camera.orbit(120.0, -40.0);
        let d = (camera.position() - camera.target).length();
        assert_relative_eq!(d, camera.distance, epsilon = 1e-4);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut camera = Camera::new(1.0);
        camera.zoom(1000.0);
        assert_relative_eq!(camera.distance, camera.min_distance);
        camera.zoom(-1000.0);
        assert_relative_eq!(camera.distance, camera.max_distance);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = Camera::new(1.0);
        camera.orbit(0.0, 1e6);
        assert_relative_eq!(camera.pitch, camera.max_pitch);
    }
}
