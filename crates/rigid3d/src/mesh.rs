//! Already-parsed triangle mesh handed in by the host layer.

use crate::error::{Result, SolverError};
use glam::{Vec2, Vec3};

#[derive(Clone, Debug, Default)]
pub struct TriangleMesh {
    pub positions: Vec<Vec3>,
    /// Optional, only carried through for the visual layer
    pub normals: Vec<Vec3>,
    /// Optional, only carried through for the visual layer
    pub uvs: Vec<Vec2>,
    /// Three indices per triangle
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals: Vec::new(),
            uvs: Vec::new(),
            indices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check the mesh can be voxelized: non-empty, whole triangles, indices in range.
    pub fn validate(&self) -> Result<()> {
        if self.positions.is_empty() {
            return Err(SolverError::InvalidMesh("mesh has no vertices".into()));
        }
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(SolverError::InvalidMesh(format!(
                "index count {} is not a positive multiple of 3",
                self.indices.len()
            )));
        }
        let n = self.positions.len();
        if let Some(&bad) = self.indices.iter().find(|&&i| i as usize >= n) {
            return Err(SolverError::InvalidMesh(format!(
                "index {} out of range for {} vertices",
                bad, n
            )));
        }
        if self.positions.iter().any(|p| !p.is_finite()) {
            return Err(SolverError::InvalidMesh("non-finite vertex position".into()));
        }
        Ok(())
    }

    /// Axis-aligned bounds as (min, max). Empty meshes give (ZERO, ZERO).
    pub fn bounds(&self) -> (Vec3, Vec3) {
        if self.positions.is_empty() {
            return (Vec3::ZERO, Vec3::ZERO);
        }
        self.positions.iter().fold(
            (Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)),
            |(lo, hi), p| (lo.min(*p), hi.max(*p)),
        )
    }
}
