//! Orbit camera around a focal point

use meshview_core::Bounds;
use meshview_gpu::EyeView;
use nalgebra::{Matrix4, Perspective3, Point3, Rotation3, Unit, Vector3};

/// Vertical field of view after a reset, in degrees
pub const DEFAULT_VIEW_ANGLE: f32 = 30.0;

/// Maps OpenGL's `[-1, 1]` clip depth onto `[0, 1]`
#[rustfmt::skip]
const OPENGL_TO_WGPU: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

/// A perspective camera orbiting `target`
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view in radians
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Create a new camera
    pub fn new(
        position: Point3<f32>,
        target: Point3<f32>,
        up: Vector3<f32>,
        fov: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            position,
            target,
            up,
            fov,
            aspect_ratio,
            near,
            far,
        }
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Get the projection matrix, with wgpu's `[0, 1]` clip depth
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        let perspective = Perspective3::new(self.aspect_ratio, self.fov, self.near, self.far);
        OPENGL_TO_WGPU * perspective.into_inner()
    }

    /// Distance from the eye to the focal point
    pub fn distance(&self) -> f32 {
        (self.position - self.target).norm()
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect_ratio = width as f32 / height as f32;
        }
    }

    /// Frame `bounds`, keeping the current view direction
    pub fn reset_to_bounds(&mut self, bounds: &Bounds) {
        let mut radius = bounds.radius();
        if radius <= 0.0 {
            radius = 1.0;
        }
        self.fov = DEFAULT_VIEW_ANGLE.to_radians();
        let distance = radius / (self.fov * 0.5).sin();

        let direction = (self.position - self.target)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::z);
        self.target = bounds.center();
        self.position = self.target + direction * distance;
        self.orthogonalize_up();
        self.reset_clipping_range(radius);
    }

    fn reset_clipping_range(&mut self, radius: f32) {
        let distance = self.distance();
        self.far = distance + 2.0 * radius;
        self.near = (distance - 2.0 * radius).max(self.far * 0.001);
    }

    fn orthogonalize_up(&mut self) {
        let forward = self.target - self.position;
        let right = forward.cross(&self.up);
        match right.cross(&forward).try_normalize(f32::EPSILON) {
            Some(up) => self.up = up,
            // View direction parallel to up
            None => self.up = forward.cross(&Vector3::x()).normalize(),
        }
    }

    /// Rotate the eye about the view-up axis through the focal point
    pub fn azimuth(&mut self, degrees: f32) {
        if let Some(axis) = Unit::try_new(self.up, f32::EPSILON) {
            let rotation = Rotation3::from_axis_angle(&axis, degrees.to_radians());
            self.position = self.target + rotation * (self.position - self.target);
        }
    }

    /// Rotate the eye up over the focal point
    pub fn elevation(&mut self, degrees: f32) {
        let offset = self.position - self.target;
        if let Some(axis) = Unit::try_new(offset.cross(&self.up), f32::EPSILON) {
            let rotation = Rotation3::from_axis_angle(&axis, degrees.to_radians());
            self.position = self.target + rotation * offset;
            self.up = rotation * self.up;
        }
    }

    /// Orbit by mouse motion in degrees
    pub fn orbit(&mut self, horizontal: f32, vertical: f32) {
        self.azimuth(-horizontal);
        self.elevation(vertical);
    }

    /// Move toward the focal point; `factor > 1` moves closer
    pub fn zoom(&mut self, factor: f32) {
        if factor <= 0.0 || !factor.is_finite() {
            return;
        }
        let offset = (self.position - self.target) / factor;
        let scale = self.distance() / offset.norm().max(f32::EPSILON);
        self.position = self.target + offset;
        self.near /= scale;
        self.far /= scale;
    }

    /// Single centered view
    pub fn eye_view(&self) -> EyeView {
        self.eye(0.0)
    }

    /// Left and right views, toed in by half of `eye_angle` degrees each
    pub fn stereo_views(&self, eye_angle: f32) -> (EyeView, EyeView) {
        (self.eye(-eye_angle * 0.5), self.eye(eye_angle * 0.5))
    }

    fn eye(&self, degrees: f32) -> EyeView {
        let mut eye = self.clone();
        eye.azimuth(degrees);
        EyeView {
            view: eye.view_matrix(),
            projection: eye.projection_matrix(),
            position: eye.position,
            focal_point: eye.target,
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            DEFAULT_VIEW_ANGLE.to_radians(),
            1.0,
            0.01,
            1000.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    #[test]
    fn test_projection_depth_range() {
        let camera = Camera::default();
        let projection = camera.projection_matrix();
        let depth = |z: f32| {
            let clip = projection * Vector4::new(0.0, 0.0, -z, 1.0);
            clip.z / clip.w
        };
        assert_relative_eq!(depth(camera.near), 0.0, epsilon = 1e-5);
        assert_relative_eq!(depth(camera.far), 1.0, epsilon = 1e-4);
        let middle = depth((camera.near + camera.far) * 0.5);
        assert!(middle > 0.0 && middle < 1.0);
    }

    #[test]
    fn test_reset_frames_bounds() {
        let mut camera = Camera::default();
        let bounds = Bounds {
            min: Point3::new(-1.0, -1.0, -1.0),
            max: Point3::new(3.0, 1.0, 1.0),
        };
        camera.reset_to_bounds(&bounds);
        assert_eq!(camera.target, Point3::new(1.0, 0.0, 0.0));
        let expected = bounds.radius() / (15.0f32).to_radians().sin();
        assert_relative_eq!(camera.distance(), expected, epsilon = 1e-4);
        assert_relative_eq!(camera.position.z, expected, epsilon = 1e-4);
        assert!(camera.near > 0.0 && camera.near < camera.far);
    }

    #[test]
    fn test_azimuth_full_turn() {
        let mut camera = Camera::default();
        camera.azimuth(90.0);
        assert_relative_eq!(camera.position.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(camera.position.z, 0.0, epsilon = 1e-5);
        for _ in 0..270 {
            camera.azimuth(1.0);
        }
        assert_relative_eq!(camera.position, Point3::new(0.0, 0.0, 1.0), epsilon = 1e-4);
    }

    #[test]
    fn test_elevation_keeps_up_orthogonal() {
        let mut camera = Camera::default();
        camera.elevation(30.0);
        assert!(camera.position.y > 0.0);
        let forward = camera.target - camera.position;
        assert_relative_eq!(forward.dot(&camera.up), 0.0, epsilon = 1e-5);
        assert_relative_eq!(camera.distance(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_zoom_scales_distance() {
        let mut camera = Camera::default();
        camera.zoom(2.0);
        assert_relative_eq!(camera.distance(), 0.5, epsilon = 1e-6);
        camera.zoom(0.0);
        assert_relative_eq!(camera.distance(), 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_stereo_views_are_symmetric() {
        let camera = Camera::default();
        let (left, right) = camera.stereo_views(2.0);
        assert!(left.position.x < 0.0);
        assert_relative_eq!(left.position.x, -right.position.x, epsilon = 1e-6);
        assert_eq!(left.focal_point, camera.target);
        assert_eq!(camera.eye_view().position, camera.position);
    }
}
