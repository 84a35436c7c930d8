//! Solver-wide limits and default physical constants.
//!
//! ## Capacity
//!
//! The instance capacity mirrors a 64x64 texture of rigid bodies. The grid is
//! sized under the assumption that particle diameter ~= voxel edge length, so
//! a voxel never legitimately holds more than [`VOXEL_SLOTS`] particles.

/// Gravity acceleration magnitude (m/s^2), applied along -Y
pub const GRAVITY: f32 = 9.807;

/// Up axis of the simulation (gravity acts along the negative)
pub const UP: glam::Vec3 = glam::Vec3::Y;

// =============================================================================
// CAPACITY
// =============================================================================

/// Maximum number of rigid body instances (64 * 64)
pub const MAX_RIGID_BODIES: usize = 64 * 64;

/// Particle identifiers stored per voxel
pub const VOXEL_SLOTS: usize = 4;

/// Sentinel for an unused voxel slot
pub const EMPTY_SLOT: u32 = u32::MAX;

/// Particle ids and voxel indices are stored as u32 and must stay below
/// [`EMPTY_SLOT`]
pub const MAX_U32_INDEX: usize = EMPTY_SLOT as usize;

// =============================================================================
// VOXELIZATION
// =============================================================================

/// Depth layers captured by the depth peel
pub const DEFAULT_DEPTH_LAYERS: usize = 4;

/// Default grid resolution along each axis
pub const DEFAULT_GRID_RESOLUTION: u32 = 128;

/// Default voxel edge length (m)
pub const DEFAULT_VOXEL_LENGTH: f32 = 0.05;
