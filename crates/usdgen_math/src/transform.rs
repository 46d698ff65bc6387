// Transform utilities for DMat4
//
// USD writes matrices row by row with the translation in the last row.
// glam is column-major with the translation in `w_axis`, so a USD row is
// a glam column.

use glam::{DMat4, DVec3};

/// Extension trait for DMat4 to read it back in the layout USD uses.
pub trait DMat4Ext {
    /// The four rows as written in a `matrix4d` value.
    fn usd_rows(&self) -> [[f64; 4]; 4];

    /// Build a matrix from the rows of a `matrix4d` value.
    fn from_usd_rows(rows: [[f64; 4]; 4]) -> Self;

    /// Upper-left 3x3 rotation/scale block (row `i`, column `j`).
    fn rotation_block(&self) -> [[f64; 3]; 3];

    /// Translation component.
    fn translation(&self) -> DVec3;
}

impl DMat4Ext for DMat4 {
    fn usd_rows(&self) -> [[f64; 4]; 4] {
        self.to_cols_array_2d()
    }

    fn from_usd_rows(rows: [[f64; 4]; 4]) -> Self {
        DMat4::from_cols_array_2d(&rows)
    }

    fn rotation_block(&self) -> [[f64; 3]; 3] {
        let cols = [self.x_axis, self.y_axis, self.z_axis];
        let mut block = [[0.0; 3]; 3];
        for (i, row) in block.iter_mut().enumerate() {
            for (j, value) in row.iter_mut().enumerate() {
                *value = cols[j][i];
            }
        }
        block
    }

    fn translation(&self) -> DVec3 {
        self.w_axis.truncate()
    }
}

/// Build a transform from a translation, Euler rotation in degrees and scale.
///
/// The Z rotation is applied first, then Y, then X, then the translation.
pub fn euler_transform(translation: DVec3, rotation_deg: DVec3, scale: DVec3) -> DMat4 {
    DMat4::from_translation(translation)
        * DMat4::from_rotation_x(rotation_deg.x.to_radians())
        * DMat4::from_rotation_y(rotation_deg.y.to_radians())
        * DMat4::from_rotation_z(rotation_deg.z.to_radians())
        * DMat4::from_scale(scale)
}

/// Evenly spaced positions on a horizontal circle around `center`.
///
/// Position `i` sits at angle `2πi/count`, at absolute height `height`.
pub fn ring_positions(center: DVec3, radius: f64, height: f64, count: usize) -> Vec<DVec3> {
    (0..count)
        .map(|i| {
            let angle = std::f64::consts::TAU * i as f64 / count as f64;
            DVec3::new(
                center.x + radius * angle.cos(),
                height,
                center.z + radius * angle.sin(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usd_rows_translation_last() {
        let mat = DMat4::from_translation(DVec3::new(10.0, 20.0, 30.0));
        let rows = mat.usd_rows();

        assert_eq!(rows[3], [10.0, 20.0, 30.0, 1.0]);
        assert_eq!(rows[0], [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_usd_rows_inverse() {
        let mat = euler_transform(
            DVec3::new(1.0, 2.0, 3.0),
            DVec3::new(10.0, 20.0, 30.0),
            DVec3::ONE,
        );
        let back = DMat4::from_usd_rows(mat.usd_rows());
        assert!(back.abs_diff_eq(mat, 1e-12));
    }

    #[test]
    fn test_euler_transform_translation_only() {
        let mat = euler_transform(DVec3::new(0.0, 5.0, -5.0), DVec3::ZERO, DVec3::ONE);
        let origin = mat.transform_point3(DVec3::ZERO);
        assert!((origin - DVec3::new(0.0, 5.0, -5.0)).length() < 1e-9);
    }

    #[test]
    fn test_euler_transform_rotation_order() {
        // Z first: X axis -> Y axis, then X rotation: Y axis -> Z axis
        let mat = euler_transform(DVec3::ZERO, DVec3::new(90.0, 0.0, 90.0), DVec3::ONE);
        let v = mat.transform_vector3(DVec3::X);
        assert!((v - DVec3::Z).length() < 1e-9);
    }

    #[test]
    fn test_rotation_block() {
        let mat = DMat4::from_rotation_z(std::f64::consts::FRAC_PI_2);
        let block = mat.rotation_block();

        // Column-vector rotation matrix: first row is (cos, -sin, 0)
        assert!((block[0][1] + 1.0).abs() < 1e-9);
        assert!((block[1][0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_ring_positions() {
        let ring = ring_positions(DVec3::new(1.0, 0.0, 1.0), 10.0, 5.0, 4);

        assert_eq!(ring.len(), 4);
        assert!((ring[0] - DVec3::new(11.0, 5.0, 1.0)).length() < 1e-9);
        assert!((ring[1] - DVec3::new(1.0, 5.0, 11.0)).length() < 1e-9);
        assert!((ring[2] - DVec3::new(-9.0, 5.0, 1.0)).length() < 1e-9);
    }

    #[test]
    fn test_ring_positions_empty() {
        assert!(ring_positions(DVec3::ZERO, 1.0, 0.0, 0).is_empty());
    }
}
