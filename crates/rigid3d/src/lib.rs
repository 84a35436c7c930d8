//! Data-parallel rigid body solver
//!
//! Many instances of one rigid shape fall, collide and tumble inside a bounded
//! voxel grid. The shape is voxelized once into interior sample points; every
//! tick those points become particles that are hashed into the grid, pushed
//! apart by penalty springs and reduced back into body momentum.
//!
//! # Example
//!
//! ```
//! use rigid3d::{test_geometry, RigidSolver, SolverConfig};
//!
//! let mut config = SolverConfig::default();
//! config.grid.resolution = [32, 32, 32];
//! config.grid.origin = rigid3d::Vec3::new(-0.8, 0.0, -0.8);
//! config.grid.emitter_position = rigid3d::Vec3::new(0.0, 1.2, 0.0);
//! config.voxelizer.preferred_size = Some(0.2);
//!
//! let mut solver = RigidSolver::new(config, &test_geometry::cube(1.0)).unwrap();
//!
//! // Run a second of simulated time
//! for _ in 0..120 {
//!     solver.step();
//! }
//!
//! for (position, orientation) in solver.instances() {
//!     assert!(position.is_finite());
//!     assert!((orientation.length() - 1.0).abs() < 1e-4);
//! }
//! ```

pub mod body;
pub mod config;
pub mod constants;
pub mod debug_dump;
pub mod error;
pub mod grid;
pub mod ground;
pub mod mesh;
pub mod particles;
pub mod pipeline;
pub mod serde_utils;
pub mod solver;
pub mod spawner;
pub mod test_geometry;
pub mod voxelizer;

pub use body::{BodySnapshot, RigidBodies, SnapshotRole};
pub use config::{DebugConfig, GridConfig, GroundConfig, SolverConfig, VoxelizerConfig};
pub use debug_dump::{DebugDump, DumpBuffer};
pub use error::{Result, SolverError};
pub use glam::{Mat3, Quat, Vec3};
pub use grid::SimulationGrid;
pub use ground::GroundPlane;
pub use mesh::TriangleMesh;
pub use particles::{ParticleKinematics, Particles};
pub use solver::{InstanceRaw, RigidSolver, TickStats};
pub use spawner::Spawner;
pub use voxelizer::{ShapeTemplate, ShapeVoxelizer};
