//! World-space voxel domain shared by every stage.
//!
//! Voxel `(i, j, k)` covers `[i, i+1) * voxel_length` along each axis in grid
//! space. Grid space maps to world space through the model transform, which
//! starts as a translation to the configured bottom-left-front corner.

use crate::config::GridConfig;
use crate::constants::MAX_U32_INDEX;
use crate::error::{Result, SolverError};
use glam::{IVec3, Mat4, UVec3, Vec3};

#[derive(Clone, Debug)]
pub struct SimulationGrid {
    /// Number of voxels along X, Y, Z
    pub resolution: UVec3,
    voxel_length: f32,
    /// Grid space -> world space
    model: Mat4,
    inv_model: Mat4,
    pub emitter_position: Vec3,
    pub emitter_velocity: Vec3,
}

impl SimulationGrid {
    /// Create a grid whose bottom-left-front corner sits at `origin`.
    ///
    /// # Panics
    ///
    /// Panics if `voxel_length` is not positive. Use [`Self::from_config`]
    /// for unchecked input.
    pub fn new(resolution: UVec3, voxel_length: f32, origin: Vec3) -> Self {
        assert!(
            voxel_length > 0.0,
            "voxel_length must be positive, got {}",
            voxel_length
        );
        let model = Mat4::from_translation(origin);
        Self {
            resolution,
            voxel_length,
            model,
            inv_model: model.inverse(),
            emitter_position: origin,
            emitter_velocity: Vec3::ZERO,
        }
    }

    /// Build a grid from configuration, rejecting sizes the stages cannot
    /// index.
    pub fn from_config(config: &GridConfig) -> Result<Self> {
        if !(config.voxel_length.is_finite() && config.voxel_length > 0.0) {
            return Err(SolverError::InvalidConfig(format!(
                "grid.voxel_length must be positive and finite, got {}",
                config.voxel_length
            )));
        }
        let voxels = config
            .resolution
            .iter()
            .try_fold(1usize, |acc, &r| acc.checked_mul(r as usize));
        match voxels {
            Some(n) if n > 0 && n < MAX_U32_INDEX => {}
            _ => {
                return Err(SolverError::InvalidConfig(format!(
                    "grid.resolution {:?} must be non-zero with fewer than {} voxels",
                    config.resolution, MAX_U32_INDEX
                )))
            }
        }

        let mut grid = Self::new(
            UVec3::from_array(config.resolution),
            config.voxel_length,
            config.origin,
        );
        grid.emitter_position = config.emitter_position;
        grid.emitter_velocity = config.emitter_velocity;
        Ok(grid)
    }

    pub fn voxel_length(&self) -> f32 {
        self.voxel_length
    }

    pub fn voxel_count(&self) -> usize {
        self.resolution.x as usize * self.resolution.y as usize * self.resolution.z as usize
    }

    pub fn model_matrix(&self) -> Mat4 {
        self.model
    }

    /// Move the grid in world space (post-multiplied onto the model transform).
    pub fn translate(&mut self, translation: Vec3) {
        self.model *= Mat4::from_translation(translation);
        self.inv_model = self.model.inverse();
    }

    /// Grid extent in grid space.
    pub fn extent(&self) -> Vec3 {
        self.resolution.as_vec3() * self.voxel_length
    }

    /// World position of the minimum corner.
    pub fn bottom_left_front(&self) -> Vec3 {
        self.model.transform_point3(Vec3::ZERO)
    }

    /// World position of the maximum corner.
    pub fn top_right_back(&self) -> Vec3 {
        self.model.transform_point3(self.extent())
    }

    pub fn world_to_local(&self, world: Vec3) -> Vec3 {
        self.inv_model.transform_point3(world)
    }

    pub fn local_to_world(&self, local: Vec3) -> Vec3 {
        self.model.transform_point3(local)
    }

    /// Voxel coordinates of a world position, without bounds check.
    fn voxel_coords_unchecked(&self, world: Vec3) -> IVec3 {
        (self.world_to_local(world) / self.voxel_length)
            .floor()
            .as_ivec3()
    }

    /// Voxel coordinates of a world position, `None` outside the grid or for
    /// non-finite input.
    pub fn voxel_coords(&self, world: Vec3) -> Option<UVec3> {
        if !world.is_finite() {
            return None;
        }
        self.checked_coords(self.voxel_coords_unchecked(world))
    }

    /// Clip signed voxel coordinates to the grid.
    pub fn checked_coords(&self, c: IVec3) -> Option<UVec3> {
        if c.x < 0 || c.y < 0 || c.z < 0 {
            return None;
        }
        let c = c.as_uvec3();
        if c.x >= self.resolution.x || c.y >= self.resolution.y || c.z >= self.resolution.z {
            return None;
        }
        Some(c)
    }

    /// Linear voxel index, X fastest.
    pub fn voxel_index(&self, c: UVec3) -> usize {
        let (nx, ny) = (self.resolution.x as usize, self.resolution.y as usize);
        c.x as usize + c.y as usize * nx + c.z as usize * nx * ny
    }

    /// Linear voxel index of a world position.
    pub fn voxel_index_of(&self, world: Vec3) -> Option<usize> {
        self.voxel_coords(world).map(|c| self.voxel_index(c))
    }

    /// World position of a voxel center.
    pub fn voxel_center(&self, c: UVec3) -> Vec3 {
        self.local_to_world((c.as_vec3() + Vec3::splat(0.5)) * self.voxel_length)
    }
}
