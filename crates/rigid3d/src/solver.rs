//! Host-side orchestration of one simulation instance.
//!
//! [`RigidSolver`] owns every buffer. Each call to [`RigidSolver::step`] spawns
//! the bodies that are due, then runs the five stages in order and swaps the
//! body snapshots. Nothing is shared between solvers.

use crate::body::RigidBodies;
use crate::config::{GridConfig, SolverConfig};
use crate::constants::MAX_U32_INDEX;
use crate::debug_dump::{DebugDump, DumpBuffer};
use crate::error::{Result, SolverError};
use crate::grid::SimulationGrid;
use crate::ground::GroundPlane;
use crate::mesh::TriangleMesh;
use crate::particles::Particles;
use crate::pipeline::{
    accumulate_momentum, compute_forces, compute_particle_values, integrate_bodies, ContactParams,
    MassProperties, VoxelGrid,
};
use crate::spawner::Spawner;
use crate::voxelizer::{ShapeTemplate, ShapeVoxelizer};
use glam::{Quat, Vec3};
use std::path::PathBuf;

/// Counters for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Index of the tick these counters describe
    pub tick: u64,
    pub active_bodies: usize,
    /// Bodies activated at the start of this tick
    pub spawned: usize,
    pub particles: usize,
    pub hashed: usize,
    /// Particles that found their voxel full
    pub dropped_overflow: usize,
    pub out_of_grid: usize,
    /// Particle-side contacts, ground included
    pub contacts: usize,
}

/// Per-instance placement for instanced drawing.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    pub position: [f32; 3],
    pub _pad: f32,
    /// Quaternion as x, y, z, w
    pub orientation: [f32; 4],
}

impl InstanceRaw {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position: position.to_array(),
            _pad: 0.0,
            orientation: orientation.to_array(),
        }
    }
}

pub struct RigidSolver {
    config: SolverConfig,
    grid: SimulationGrid,
    /// Kept to rebuild the template when the grid changes
    mesh: TriangleMesh,
    template: ShapeTemplate,
    mass: MassProperties,
    bodies: RigidBodies,
    particles: Particles,
    voxels: VoxelGrid,
    spawner: Spawner,
    ground: Option<GroundPlane>,
    dump: Option<DebugDump>,
    tick: u64,
}

impl RigidSolver {
    /// Build a solver for `mesh` with the given configuration.
    ///
    /// An invalid configuration, or a grid or body count too large for u32
    /// particle ids, is an error. A mesh that cannot be voxelized degrades to
    /// the fallback or empty template.
    pub fn new(config: SolverConfig, mesh: &TriangleMesh) -> Result<Self> {
        config.validate()?;
        if config.particle_diameter > config.grid.voxel_length {
            log::warn!(
                "Particle diameter {} exceeds voxel length {}, contacts beyond one voxel are missed",
                config.particle_diameter,
                config.grid.voxel_length
            );
        }

        let grid = SimulationGrid::from_config(&config.grid)?;
        let template = build_template(&config, &grid, mesh)?;
        let mass = mass_properties(&config, &template);
        let ground = ground_plane(&config, &grid);

        let solver = Self {
            bodies: RigidBodies::new(config.max_bodies),
            particles: Particles::new(template.sample_count()),
            voxels: VoxelGrid::for_grid(&grid),
            spawner: Spawner::new(config.spawn_interval, config.target_count, config.max_bodies),
            dump: config.debug.clone().map(DebugDump::new),
            mesh: mesh.clone(),
            template,
            mass,
            ground,
            grid,
            config,
            tick: 0,
        };

        log::info!(
            "Rigid solver ready: grid {}x{}x{} (h = {}), {} samples per body, capacity {}",
            solver.grid.resolution.x,
            solver.grid.resolution.y,
            solver.grid.resolution.z,
            solver.grid.voxel_length(),
            solver.template.sample_count(),
            solver.bodies.capacity()
        );
        solver.verify_buffers();
        Ok(solver)
    }

    // ========================================================================
    // Run control
    // ========================================================================

    pub fn set_running(&mut self, running: bool) {
        self.config.running = running;
    }

    pub fn is_running(&self) -> bool {
        self.config.running
    }

    /// Drop every instance and rewind simulated time.
    pub fn reset(&mut self) {
        self.bodies.clear();
        self.spawner.reset();
        self.particles.resize_for(0);
        self.voxels.clear();
        self.tick = 0;
        log::info!("Simulation reset");
    }

    /// Replace the shared shape. Live instances keep their state.
    ///
    /// On error the previous shape stays loaded.
    pub fn load_shape(&mut self, mesh: &TriangleMesh) -> Result<()> {
        let template = build_template(&self.config, &self.grid, mesh)?;
        self.mesh = mesh.clone();
        self.install_template(template);
        self.verify_buffers();
        Ok(())
    }

    /// Replace the grid; every dependent buffer is rebuilt and the
    /// simulation restarts.
    pub fn resize_grid(&mut self, grid: GridConfig) -> Result<()> {
        let config = SolverConfig {
            grid,
            ..self.config.clone()
        };
        config.validate()?;
        let grid = SimulationGrid::from_config(&config.grid)?;
        let template = build_template(&config, &grid, &self.mesh)?;

        self.config = config;
        self.grid = grid;
        self.voxels = VoxelGrid::for_grid(&self.grid);
        self.ground = ground_plane(&self.config, &self.grid);
        self.install_template(template);
        log::info!(
            "Grid resized to {}x{}x{} (h = {})",
            self.grid.resolution.x,
            self.grid.resolution.y,
            self.grid.resolution.z,
            self.grid.voxel_length()
        );
        self.reset();
        self.verify_buffers();
        Ok(())
    }

    /// Move the grid (and the ground footprint) in world space.
    pub fn translate_grid(&mut self, translation: Vec3) {
        self.grid.translate(translation);
        self.ground = ground_plane(&self.config, &self.grid);
    }

    fn install_template(&mut self, template: ShapeTemplate) {
        self.mass = mass_properties(&self.config, &template);
        self.particles = Particles::new(template.sample_count());
        self.template = template;
    }

    /// Check buffer sizes against the configuration. A mismatch is logged and
    /// the run continues.
    pub fn verify_buffers(&self) -> bool {
        let mut ok = true;
        if !self.bodies.is_consistent() || self.bodies.capacity() != self.config.max_bodies {
            log::error!(
                "Body buffers inconsistent (capacity {}, expected {})",
                self.bodies.capacity(),
                self.config.max_bodies
            );
            ok = false;
        }
        if self.voxels.voxel_count() != self.grid.voxel_count() {
            log::error!(
                "Voxel buffer holds {} voxels, grid has {}",
                self.voxels.voxel_count(),
                self.grid.voxel_count()
            );
            ok = false;
        }
        if self.particles.forces.len() != self.particles.kinematics.len()
            || self.particles.samples_per_body() != self.template.sample_count()
        {
            log::error!("Particle buffers do not match the shape template");
            ok = false;
        }
        ok
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance one tick. Returns `None` while paused.
    pub fn step(&mut self) -> Option<TickStats> {
        if !self.config.running {
            return None;
        }
        let dt = self.config.dt;

        // 1. Spawn bodies that are due
        let spawned = self.spawner.spawn_due();
        let spawn_momentum = self.grid.emitter_velocity * self.config.mass;
        for index in spawned.clone() {
            self.bodies.spawn(index, self.grid.emitter_position, spawn_momentum);
            log::debug!("Spawned body {} at {:?}", index, self.grid.emitter_position);
        }
        let active = self.spawner.active();
        let spb = self.template.sample_count();
        self.particles.resize_for(active);

        // 2. Particle values from the active snapshot
        compute_particle_values(
            self.bodies.active(),
            &self.bodies.linear_momentum,
            &self.bodies.angular_momentum,
            &self.template.samples,
            &self.mass,
            &mut self.particles.kinematics,
        );

        // 3. Grid assignment
        let assign = self.voxels.assign(&self.grid, &self.particles.kinematics);

        // 4. Contact and gravity forces
        let contact = ContactParams {
            particle_diameter: self.config.particle_diameter,
            spring: self.config.spring,
            damping: self.config.damping,
            gravity: self.config.gravity,
            particle_mass: self.config.mass / spb.max(1) as f32,
            samples_per_body: spb,
            ground: self.ground,
        };
        let contacts = compute_forces(
            &self.grid,
            &self.voxels,
            &self.particles.kinematics,
            &contact,
            &mut self.particles.forces,
        );

        // 5. Momentum reduction
        accumulate_momentum(
            &self.particles.kinematics,
            &self.particles.forces,
            spb,
            dt,
            &mut self.bodies.linear_momentum,
            &mut self.bodies.angular_momentum,
        );

        // 6. Integrate into the inactive snapshot, then make it active
        let (read, write, linear, angular) = self.bodies.split_with_momentum();
        integrate_bodies(read, write, linear, angular, &self.mass, dt, active);
        self.bodies.swap();

        let stats = TickStats {
            tick: self.tick,
            active_bodies: active,
            spawned: spawned.len(),
            particles: self.particles.len(),
            hashed: assign.hashed,
            dropped_overflow: assign.dropped,
            out_of_grid: assign.outside,
            contacts,
        };
        log::trace!("{:?}", stats);

        self.dump_due_buffers();
        self.spawner.advance(dt);
        self.tick += 1;
        Some(stats)
    }

    fn dump_due_buffers(&self) {
        let Some(dump) = &self.dump else {
            return;
        };
        if !dump.is_due(self.tick) {
            return;
        }
        for &buffer in dump.buffers() {
            if let Err(e) = self.dump_buffer(dump, buffer) {
                log::error!("Failed to dump {}: {}", buffer.name(), e);
            }
        }
    }

    fn dump_buffer(&self, dump: &DebugDump, buffer: DumpBuffer) -> Result<PathBuf> {
        let active = self.active_count();
        let particles = &self.particles;
        let flat = |v: Vec3| v.to_array();
        match buffer {
            DumpBuffer::ParticlePositions => {
                dump.write(buffer, self.tick, particles.positions().flat_map(flat))
            }
            DumpBuffer::ParticleVelocities => {
                dump.write(buffer, self.tick, particles.velocities().flat_map(flat))
            }
            DumpBuffer::ParticleForces => dump.write(
                buffer,
                self.tick,
                particles.forces.iter().copied().flat_map(flat),
            ),
            DumpBuffer::LinearMomentum => dump.write(
                buffer,
                self.tick,
                self.bodies.linear_momentum[..active].iter().copied().flat_map(flat),
            ),
            DumpBuffer::AngularMomentum => dump.write(
                buffer,
                self.tick,
                self.bodies.angular_momentum[..active].iter().copied().flat_map(flat),
            ),
            DumpBuffer::GridOccupancy => dump.write(
                buffer,
                self.tick,
                self.voxels.occupancy_counts().into_iter().map(|c| c as f32),
            ),
            DumpBuffer::BodyPositions => dump.write(
                buffer,
                self.tick,
                self.bodies.active().positions[..active].iter().copied().flat_map(flat),
            ),
            DumpBuffer::BodyOrientations => dump.write(
                buffer,
                self.tick,
                self.bodies.active().orientations[..active]
                    .iter()
                    .flat_map(|q| q.to_array()),
            ),
        }
    }

    // ========================================================================
    // Read access
    // ========================================================================

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn grid(&self) -> &SimulationGrid {
        &self.grid
    }

    pub fn template(&self) -> &ShapeTemplate {
        &self.template
    }

    pub fn mass_properties(&self) -> &MassProperties {
        &self.mass
    }

    pub fn bodies(&self) -> &RigidBodies {
        &self.bodies
    }

    pub fn particles(&self) -> &Particles {
        &self.particles
    }

    pub fn voxels(&self) -> &VoxelGrid {
        &self.voxels
    }

    pub fn active_count(&self) -> usize {
        self.spawner.active()
    }

    /// Number of completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Simulated time (s).
    pub fn elapsed(&self) -> f64 {
        self.spawner.elapsed()
    }

    pub fn ground_plane(&self) -> Option<GroundPlane> {
        self.ground
    }

    /// Position and orientation of every active instance.
    pub fn instances(&self) -> impl Iterator<Item = (Vec3, Quat)> + '_ {
        let active = self.active_count();
        let snapshot = self.bodies.active();
        snapshot.positions[..active]
            .iter()
            .copied()
            .zip(snapshot.orientations[..active].iter().copied())
    }

    pub fn instance_data(&self) -> Vec<InstanceRaw> {
        self.instances()
            .map(|(p, q)| InstanceRaw::new(p, q))
            .collect()
    }
}

/// Voxelize `mesh` and check every particle of a full solver gets a u32 id.
fn build_template(
    config: &SolverConfig,
    grid: &SimulationGrid,
    mesh: &TriangleMesh,
) -> Result<ShapeTemplate> {
    let template = ShapeVoxelizer::new(config.voxelizer.clone(), grid).voxelize(mesh);
    check_particle_ids(config.max_bodies, template.sample_count())?;
    Ok(template)
}

fn check_particle_ids(max_bodies: usize, samples: usize) -> Result<()> {
    match max_bodies.checked_mul(samples) {
        Some(n) if n < MAX_U32_INDEX => Ok(()),
        _ => Err(SolverError::InvalidConfig(format!(
            "{} bodies x {} samples exceed the u32 particle id range",
            max_bodies, samples
        ))),
    }
}

fn mass_properties(config: &SolverConfig, template: &ShapeTemplate) -> MassProperties {
    MassProperties {
        mass: config.mass,
        inverse_inertia: template.inverse_inertia(config.mass),
    }
}

fn ground_plane(config: &SolverConfig, grid: &SimulationGrid) -> Option<GroundPlane> {
    config
        .ground
        .enabled
        .then(|| GroundPlane::from_grid(grid, config.ground.height))
}

impl std::fmt::Debug for RigidSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RigidSolver")
            .field("tick", &self.tick)
            .field("active", &self.active_count())
            .field("samples", &self.template.sample_count())
            .field("running", &self.config.running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DebugConfig;
    use crate::constants::MAX_RIGID_BODIES;
    use crate::test_geometry::{cube, cuboid};

    fn small_config() -> SolverConfig {
        let mut config = SolverConfig {
            spawn_interval: 0.5,
            target_count: 4,
            max_bodies: 8,
            ..Default::default()
        };
        config.grid.resolution = [32, 32, 32];
        config.grid.origin = Vec3::new(-0.8, 0.0, -0.8);
        config.grid.emitter_position = Vec3::new(0.0, 1.0, 0.0);
        config.voxelizer.preferred_size = Some(0.2);
        config
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SolverConfig {
            mass: -1.0,
            ..small_config()
        };
        assert!(matches!(
            RigidSolver::new(config, &cube(1.0)),
            Err(SolverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_first_tick_spawns_one_body() {
        let mut solver = RigidSolver::new(small_config(), &cube(1.0)).unwrap();
        let stats = solver.step().unwrap();
        assert_eq!(stats.tick, 0);
        assert_eq!(stats.spawned, 1);
        assert_eq!(stats.active_bodies, 1);
        assert_eq!(stats.particles, 64);
        assert_eq!(solver.instances().count(), 1);
    }

    #[test]
    fn test_paused_solver_keeps_state() {
        let mut solver = RigidSolver::new(small_config(), &cube(1.0)).unwrap();
        solver.step();
        let before: Vec<_> = solver.instances().collect();

        solver.set_running(false);
        assert!(!solver.is_running());
        assert!(solver.step().is_none());
        assert_eq!(solver.tick(), 1);
        assert_eq!(solver.instances().collect::<Vec<_>>(), before);
    }

    #[test]
    fn test_reset_clears_instances() {
        let mut solver = RigidSolver::new(small_config(), &cube(1.0)).unwrap();
        for _ in 0..120 {
            solver.step();
        }
        assert!(solver.active_count() > 1);
        solver.reset();
        assert_eq!(solver.active_count(), 0);
        assert_eq!(solver.tick(), 0);
        assert_eq!(solver.elapsed(), 0.0);
    }

    #[test]
    fn test_resize_grid_rebuilds_buffers() {
        let mut solver = RigidSolver::new(small_config(), &cube(1.0)).unwrap();
        solver.step();

        let mut grid = solver.config().grid.clone();
        grid.resolution = [16, 24, 16];
        grid.voxel_length = 0.1;
        solver.resize_grid(grid).unwrap();

        assert_eq!(solver.voxels().voxel_count(), 16 * 24 * 16);
        assert_eq!(solver.active_count(), 0);
        // 0.2 edge at h = 0.1 is 2x2x2
        assert_eq!(solver.template().sample_count(), 8);
        assert!(solver.verify_buffers());
    }

    #[test]
    fn test_resize_grid_rejects_zero_resolution() {
        let mut solver = RigidSolver::new(small_config(), &cube(1.0)).unwrap();
        let mut grid = solver.config().grid.clone();
        grid.resolution = [0, 8, 8];
        assert!(solver.resize_grid(grid).is_err());
        assert_eq!(solver.voxels().voxel_count(), 32 * 32 * 32);
    }

    #[test]
    fn test_particle_id_range() {
        assert!(check_particle_ids(MAX_RIGID_BODIES, 64).is_ok());
        assert!(check_particle_ids(MAX_RIGID_BODIES, 1 << 20).is_err());
        assert!(check_particle_ids(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_new_rejects_oversized_body_count() {
        // 64 samples per cube, 2^26 bodies -> 2^32 particle ids
        let config = SolverConfig {
            max_bodies: 1 << 26,
            ..small_config()
        };
        assert!(matches!(
            RigidSolver::new(config, &cube(1.0)),
            Err(SolverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_shape_keeps_live_bodies() {
        let mut solver = RigidSolver::new(small_config(), &cube(1.0)).unwrap();
        for _ in 0..70 {
            solver.step();
        }
        let active = solver.active_count();
        assert!(active >= 2);
        let before: Vec<_> = solver.instances().collect();

        // 2:1:1 box scaled to 0.2 x 0.1 x 0.1 is 4x2x2 voxels
        solver
            .load_shape(&cuboid(Vec3::ZERO, Vec3::new(1.0, 0.5, 0.5)))
            .unwrap();
        assert_eq!(solver.template().sample_count(), 16);
        assert_eq!(solver.active_count(), active);
        assert_eq!(solver.instances().collect::<Vec<_>>(), before);
        assert!(solver.verify_buffers());

        let stats = solver.step().unwrap();
        assert_eq!(stats.particles, stats.active_bodies * 16);
        assert_eq!(solver.particles().samples_per_body(), 16);
    }

    #[test]
    fn test_translate_grid_moves_ground() {
        let mut solver = RigidSolver::new(small_config(), &cube(1.0)).unwrap();
        let before = solver.ground_plane().unwrap();
        solver.translate_grid(Vec3::new(0.5, 0.0, -0.25));
        let after = solver.ground_plane().unwrap();

        assert!((after.min - (before.min + glam::Vec2::new(0.5, -0.25))).length() < 1e-6);
        assert!((after.max - (before.max + glam::Vec2::new(0.5, -0.25))).length() < 1e-6);
        assert_eq!(after.height, before.height);
        assert!((solver.grid().bottom_left_front() - Vec3::new(-0.3, 0.0, -1.05)).length() < 1e-6);
    }

    #[test]
    fn test_dump_writes_one_record_per_element() {
        let dir = std::env::temp_dir().join(format!("rigid3d_solver_dump_{}", std::process::id()));
        let mut config = small_config();
        config.debug = Some(DebugConfig {
            dir: dir.clone(),
            buffers: vec![
                DumpBuffer::GridOccupancy,
                DumpBuffer::BodyOrientations,
                DumpBuffer::ParticlePositions,
            ],
            interval: 1,
        });
        let mut solver = RigidSolver::new(config, &cube(1.0)).unwrap();
        solver.step();

        let lines = |buffer: DumpBuffer| -> Vec<String> {
            let path = dir.join(format!("{}_0.txt", buffer.name()));
            std::fs::read_to_string(path)
                .unwrap()
                .lines()
                .map(str::to_owned)
                .collect()
        };

        let occupancy = lines(DumpBuffer::GridOccupancy);
        assert_eq!(occupancy.len(), 32 * 32 * 32);
        assert!(occupancy.iter().all(|l| l.split(' ').count() == 1));

        let orientations = lines(DumpBuffer::BodyOrientations);
        assert_eq!(orientations.len(), 1);
        assert_eq!(orientations[0].split(' ').count(), 4);

        let positions = lines(DumpBuffer::ParticlePositions);
        assert_eq!(positions.len(), 64);
        assert!(positions.iter().all(|l| l.split(' ').count() == 3));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_instance_data_layout() {
        assert_eq!(std::mem::size_of::<InstanceRaw>(), 32);
        let raw = InstanceRaw::new(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY);
        let bytes: &[u8] = bytemuck::bytes_of(&raw);
        assert_eq!(bytes.len(), 32);
        assert_eq!(raw.orientation, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_body_falls_under_gravity() {
        let mut solver = RigidSolver::new(small_config(), &cube(1.0)).unwrap();
        for _ in 0..30 {
            solver.step();
        }
        let (position, orientation) = solver.instances().next().unwrap();
        assert!(position.y < 1.0);
        // Symmetric shape under uniform gravity does not spin
        assert!((orientation.length() - 1.0).abs() < 1e-5);
    }
}
