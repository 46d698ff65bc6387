use glam::{DMat4, DVec3};

/// Camera placement: a position looking at a target point.
///
/// USD cameras look down their local -Z axis with +Y up, so the
/// orientation is expressed as a yaw around Y followed by a pitch around X.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAt {
    pub position: DVec3,
    pub target: DVec3,
}

impl LookAt {
    /// Create a new look-at placement
    pub fn new(position: DVec3, target: DVec3) -> Self {
        Self { position, target }
    }

    /// Normalized viewing direction (zero if position == target)
    pub fn direction(&self) -> DVec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Yaw (around Y) and pitch (around X) in degrees.
    pub fn angles(&self) -> (f64, f64) {
        let d = self.direction();
        let yaw = (-d.x).atan2(-d.z).to_degrees();
        let pitch = d.y.clamp(-1.0, 1.0).asin().to_degrees();
        (yaw, pitch)
    }

    /// Camera-to-world matrix (translate, then rotateY, then rotateX)
    pub fn world_matrix(&self) -> DMat4 {
        let (yaw, pitch) = self.angles();
        DMat4::from_translation(self.position)
            * DMat4::from_rotation_y(yaw.to_radians())
            * DMat4::from_rotation_x(pitch.to_radians())
    }

    /// Get the view matrix (world → camera space)
    pub fn view_matrix(&self) -> DMat4 {
        self.world_matrix().inverse()
    }
}

/// Physical lens description in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lens {
    pub focal_length: f64,
    pub horizontal_aperture: f64,
    pub vertical_aperture: f64,
}

impl Default for Lens {
    fn default() -> Self {
        // 35mm lens on a 35mm film back, the USD camera fallbacks for aperture
        Self {
            focal_length: 35.0,
            horizontal_aperture: 20.955,
            vertical_aperture: 15.2908,
        }
    }
}

impl Lens {
    /// Lens with the focal length giving `fov_deg` across the horizontal aperture.
    pub fn from_horizontal_fov(fov_deg: f64, horizontal_aperture: f64, vertical_aperture: f64) -> Self {
        let half = (fov_deg.to_radians() * 0.5).tan();
        Self {
            focal_length: horizontal_aperture * 0.5 / half,
            horizontal_aperture,
            vertical_aperture,
        }
    }

    /// Horizontal field of view in degrees
    pub fn horizontal_fov(&self) -> f64 {
        2.0 * (self.horizontal_aperture * 0.5 / self.focal_length).atan().to_degrees()
    }

    /// Vertical field of view in degrees
    pub fn vertical_fov(&self) -> f64 {
        2.0 * (self.vertical_aperture * 0.5 / self.focal_length).atan().to_degrees()
    }

    /// Pinhole intrinsics for an image of `width` x `height` pixels.
    pub fn intrinsics(&self, width: u32, height: u32) -> Intrinsics {
        let pixel_size_x = self.horizontal_aperture / width as f64;
        let pixel_size_y = self.vertical_aperture / height as f64;
        Intrinsics {
            pixel_size_x,
            pixel_size_y,
            fx: self.focal_length / pixel_size_x,
            fy: self.focal_length / pixel_size_y,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            skew: 0.0,
        }
    }
}

/// Pinhole camera intrinsics in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    /// Millimetres per pixel horizontally
    pub pixel_size_x: f64,
    /// Millimetres per pixel vertically
    pub pixel_size_y: f64,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub skew: f64,
}

impl Intrinsics {
    /// The 3x3 intrinsic matrix K.
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        [
            [self.fx, self.skew, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_at_straight_ahead() {
        let look = LookAt::new(DVec3::new(0.0, 0.0, 10.0), DVec3::ZERO);
        let (yaw, pitch) = look.angles();

        assert!(yaw.abs() < 1e-9);
        assert!(pitch.abs() < 1e-9);
    }

    #[test]
    fn test_look_at_down() {
        let look = LookAt::new(DVec3::new(0.0, 10.0, 10.0), DVec3::ZERO);
        let (_, pitch) = look.angles();
        assert!((pitch + 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_world_matrix_points_at_target() {
        let look = LookAt::new(DVec3::new(3.0, 4.0, -7.0), DVec3::new(1.0, 0.0, 2.0));
        let forward = look.world_matrix().transform_vector3(DVec3::NEG_Z);

        assert!((forward - look.direction()).length() < 1e-9);
        let origin = look.world_matrix().transform_point3(DVec3::ZERO);
        assert!((origin - look.position).length() < 1e-9);
    }

    #[test]
    fn test_view_matrix() {
        let look = LookAt::new(DVec3::new(0.0, 0.0, 5.0), DVec3::ZERO);
        let target_in_view = look.view_matrix().transform_point3(DVec3::ZERO);

        // Target sits 5 units down the camera's -Z axis
        assert!((target_in_view - DVec3::new(0.0, 0.0, -5.0)).length() < 1e-9);
    }

    #[test]
    fn test_degenerate_look_at() {
        let look = LookAt::new(DVec3::ONE, DVec3::ONE);
        let (yaw, pitch) = look.angles();
        assert!(yaw.is_finite() && pitch.is_finite());
    }

    #[test]
    fn test_fov_roundtrip() {
        let lens = Lens::from_horizontal_fov(60.0, 20.955, 15.2908);
        assert!((lens.horizontal_fov() - 60.0).abs() < 1e-9);
        assert!(lens.vertical_fov() < 60.0);
    }

    #[test]
    fn test_intrinsics() {
        let lens = Lens::default();
        let k = lens.intrinsics(512, 512);

        assert_eq!(k.cx, 256.0);
        assert_eq!(k.cy, 256.0);
        assert!((k.fx - 35.0 / (20.955 / 512.0)).abs() < 1e-9);
        assert_eq!(k.matrix()[2], [0.0, 0.0, 1.0]);
    }
}
