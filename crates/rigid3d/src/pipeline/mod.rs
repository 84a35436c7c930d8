//! Per-tick stages.
//!
//! Each stage is a data-parallel pass over flat buffers. A stage returning is
//! the barrier before the next one starts:
//!
//! 1. [`particle_values`]: body state -> particle position, velocity, offset
//! 2. [`grid_assign`]: particle positions -> up to four ids per voxel
//! 3. [`collision`]: neighbor contacts, ground and gravity -> particle forces
//! 4. [`momentum`]: particle forces -> body momentum
//! 5. [`integrate`]: momentum -> position and orientation in the inactive copy

pub mod collision;
pub mod grid_assign;
pub mod integrate;
pub mod momentum;
pub mod particle_values;

pub use collision::{compute_forces, ContactParams};
pub use grid_assign::{AssignStats, VoxelGrid};
pub use integrate::integrate_bodies;
pub use momentum::accumulate_momentum;
pub use particle_values::compute_particle_values;

use glam::Mat3;

/// Shape-global mass properties shared by every instance.
#[derive(Clone, Copy, Debug)]
pub struct MassProperties {
    /// Mass of one instance
    pub mass: f32,
    /// Inverse inertia tensor in body space
    pub inverse_inertia: Mat3,
}

impl MassProperties {
    /// World-space inverse inertia for a body rotated by `rotation`.
    pub fn world_inverse_inertia(&self, rotation: Mat3) -> Mat3 {
        rotation * self.inverse_inertia * rotation.transpose()
    }
}
