//! Procedural mesh data for `Mesh` prims.

use usdgen_math::Vec3;

/// Polygon mesh topology as authored on a USD `Mesh`.
///
/// Faces are described the USD way: `face_vertex_counts[i]` vertices per
/// face, consuming `face_vertex_indices` in order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    /// Vertex positions
    pub points: Vec<Vec3>,

    /// Number of vertices per face
    pub face_vertex_counts: Vec<i32>,

    /// Vertex indices for every face, concatenated
    pub face_vertex_indices: Vec<i32>,
}

impl MeshData {
    /// A square ground plane in XZ spanning `-size..size`, as two triangles.
    pub fn plane(size: f32) -> Self {
        Self {
            points: vec![
                Vec3::new(-size, 0.0, -size),
                Vec3::new(size, 0.0, -size),
                Vec3::new(size, 0.0, size),
                Vec3::new(-size, 0.0, size),
            ],
            face_vertex_counts: vec![3, 3],
            face_vertex_indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Axis-aligned bounds as `[min, max]`, or `None` for an empty mesh.
    pub fn extent(&self) -> Option<[Vec3; 2]> {
        let first = *self.points.first()?;
        let (min, max) = self
            .points
            .iter()
            .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Some([min, max])
    }

    /// Check that the topology is consistent with the points.
    pub fn validate(&self) -> Result<(), String> {
        if self.face_vertex_counts.iter().any(|&c| c < 3) {
            return Err("every face needs at least 3 vertices".to_string());
        }
        let expected: i64 = self.face_vertex_counts.iter().map(|&c| c as i64).sum();
        if expected != self.face_vertex_indices.len() as i64 {
            return Err(format!(
                "face vertex counts sum to {} but there are {} indices",
                expected,
                self.face_vertex_indices.len()
            ));
        }
        let n = self.points.len() as i32;
        if let Some(bad) = self.face_vertex_indices.iter().find(|&&i| i < 0 || i >= n) {
            return Err(format!("index {} out of range for {} points", bad, n));
        }
        Ok(())
    }

    /// Triangulate polygons into triangle indices (simple fan triangulation).
    pub fn triangulate(&self) -> Vec<u32> {
        let mut indices = Vec::new();
        let mut vertex_offset = 0usize;

        for &count in &self.face_vertex_counts {
            let count = count.max(0) as usize;
            if count < 3 {
                vertex_offset += count;
                continue;
            }

            // (0,1,2), (0,2,3), ... (0,n-2,n-1)
            for i in 1..(count - 1) {
                indices.push(self.face_vertex_indices[vertex_offset] as u32);
                indices.push(self.face_vertex_indices[vertex_offset + i] as u32);
                indices.push(self.face_vertex_indices[vertex_offset + i + 1] as u32);
            }

            vertex_offset += count;
        }

        indices
    }

    /// Get the number of triangles after triangulation.
    pub fn triangle_count(&self) -> usize {
        self.face_vertex_counts
            .iter()
            .map(|&c| (c.max(2) - 2) as usize)
            .sum()
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }
}
