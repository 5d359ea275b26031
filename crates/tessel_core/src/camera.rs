//! Camera interface and a thin-lens perspective camera.

use std::fmt;

use glam::{Vec2, Vec3};

use crate::Ray;

/// Produces primary rays for normalized screen positions.
///
/// `screen` is in `[0, 1]^2` with `(0, 0)` at the top-left corner of the
/// image; `lens` is a uniform sample in `[0, 1]^2` used by cameras with an
/// aperture.
pub trait CameraModel: Send + Sync + fmt::Debug {
    fn primary_ray(&self, screen: Vec2, lens: Vec2) -> Ray;
}

/// Perspective camera with optional depth of field.
#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    /// Vertical field of view in degrees
    vfov: f32,
    /// Image width / height
    aspect: f32,
    /// Variation angle of rays through each pixel
    defocus_angle: f32,
    /// Distance from camera to plane of perfect focus
    focus_dist: f32,

    // Derived frame, refreshed by every setter
    upper_left: Vec3,
    horizontal: Vec3,
    vertical: Vec3,
    defocus_u: Vec3,
    defocus_v: Vec3,
}

impl PerspectiveCamera {
    /// Create a camera with default placement and lens.
    pub fn new() -> Self {
        let mut camera = Self {
            look_from: Vec3::ZERO,
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::Y,
            vfov: 90.0,
            aspect: 1.0,
            defocus_angle: 0.0,
            focus_dist: 1.0,
            upper_left: Vec3::ZERO,
            horizontal: Vec3::X,
            vertical: Vec3::Y,
            defocus_u: Vec3::ZERO,
            defocus_v: Vec3::ZERO,
        };
        camera.update_frame();
        camera
    }

    /// Place the camera at `look_from` looking at `look_at`.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self.update_frame();
        self
    }

    /// Set vertical field of view (degrees), defocus angle and focus distance.
    pub fn with_lens(mut self, vfov: f32, defocus_angle: f32, focus_dist: f32) -> Self {
        self.vfov = vfov;
        self.defocus_angle = defocus_angle;
        self.focus_dist = focus_dist;
        self.update_frame();
        self
    }

    /// Set the image aspect ratio (width / height).
    pub fn with_aspect(mut self, aspect: f32) -> Self {
        self.aspect = aspect;
        self.update_frame();
        self
    }

    /// Get the camera position.
    pub fn position(&self) -> Vec3 {
        self.look_from
    }

    fn update_frame(&mut self) {
        let h = (self.vfov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h * self.focus_dist;
        let viewport_width = viewport_height * self.aspect;

        let w = (self.look_from - self.look_at).normalize();
        let u = self.vup.cross(w).normalize();
        let v = w.cross(u);

        self.horizontal = viewport_width * u;
        self.vertical = -viewport_height * v;
        self.upper_left =
            self.look_from - self.focus_dist * w - self.horizontal / 2.0 - self.vertical / 2.0;

        let defocus_radius = self.focus_dist * (self.defocus_angle / 2.0).to_radians().tan();
        self.defocus_u = u * defocus_radius;
        self.defocus_v = v * defocus_radius;
    }
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraModel for PerspectiveCamera {
    fn primary_ray(&self, screen: Vec2, lens: Vec2) -> Ray {
        let target = self.upper_left + screen.x * self.horizontal + screen.y * self.vertical;

        let origin = if self.defocus_angle <= 0.0 {
            self.look_from
        } else {
            let p = concentric_disk(lens);
            self.look_from + p.x * self.defocus_u + p.y * self.defocus_v
        };

        Ray::new(origin, target - origin)
    }
}

/// Map a unit-square sample onto the unit disk (Shirley-Chiu).
fn concentric_disk(sample: Vec2) -> Vec2 {
    let offset = 2.0 * sample - Vec2::ONE;
    if offset == Vec2::ZERO {
        return Vec2::ZERO;
    }
    let (r, theta) = if offset.x.abs() > offset.y.abs() {
        (offset.x, std::f32::consts::FRAC_PI_4 * (offset.y / offset.x))
    } else {
        (
            offset.y,
            std::f32::consts::FRAC_PI_2 - std::f32::consts::FRAC_PI_4 * (offset.x / offset.y),
        )
    };
    r * Vec2::new(theta.cos(), theta.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_center_ray_points_forward() {
        let camera = PerspectiveCamera::new()
            .with_position(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
            .with_lens(90.0, 0.0, 1.0);

        let ray = camera.primary_ray(Vec2::splat(0.5), Vec2::splat(0.5));
        let dir = ray.direction.normalize();
        assert_relative_eq!(dir.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(dir.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(dir.z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_top_left_ray_points_up_left() {
        let camera = PerspectiveCamera::new();
        let ray = camera.primary_ray(Vec2::ZERO, Vec2::splat(0.5));
        assert!(ray.direction.x < 0.0);
        assert!(ray.direction.y > 0.0);
    }

    #[test]
    fn test_concentric_disk_stays_inside() {
        for &(x, y) in &[(0.0, 0.0), (1.0, 1.0), (0.3, 0.9), (0.5, 0.5)] {
            assert!(concentric_disk(Vec2::new(x, y)).length() <= 1.0 + 1e-5);
        }
    }
}
