// Re-export glam for convenience
pub use glam::*;

// usdgen math types
mod camera;
mod transform;

pub use camera::{Intrinsics, Lens, LookAt};
pub use transform::{euler_transform, ring_positions, DMat4Ext};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dvec3_creation() {
        let v = DVec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }

    #[test]
    fn test_dvec3_from_array() {
        let v = DVec3::from([0.0, 5.0, 15.0]);
        assert_eq!(v, DVec3::new(0.0, 5.0, 15.0));
    }
}
