//! Stage 3: penalty contacts and gravity.
//!
//! Each particle only computes its own reaction. Candidates come from the
//! 3x3x3 voxel block around it; particles of the same instance are skipped,
//! which also excludes the particle itself.

use super::grid_assign::VoxelGrid;
use crate::constants::UP;
use crate::grid::SimulationGrid;
use crate::ground::GroundPlane;
use crate::particles::ParticleKinematics;
use glam::{IVec3, Vec3};
use rayon::prelude::*;

/// Coincident particles have no contact normal
const MIN_CONTACT_DISTANCE_SQ: f32 = 1.0e-12;

#[derive(Clone, Copy, Debug)]
pub struct ContactParams {
    pub particle_diameter: f32,
    pub spring: f32,
    pub damping: f32,
    /// Gravity magnitude, acting along -UP
    pub gravity: f32,
    /// Mass carried by one particle (instance mass / samples)
    pub particle_mass: f32,
    pub samples_per_body: usize,
    pub ground: Option<GroundPlane>,
}

impl ContactParams {
    /// Spring and damping force on a particle pushed along `normal` by
    /// `penetration`, moving with `v_n` along the normal relative to the
    /// other side.
    fn penalty(&self, penetration: f32, v_n: f32) -> f32 {
        self.spring * penetration - self.damping * v_n
    }
}

/// Write the summed force of every particle into `forces`.
///
/// Returns the number of particle-side contacts (each pair counts twice).
pub fn compute_forces(
    grid: &SimulationGrid,
    voxels: &VoxelGrid,
    particles: &[ParticleKinematics],
    params: &ContactParams,
    forces: &mut [Vec3],
) -> usize {
    let spb = params.samples_per_body.max(1);
    let diameter_sq = params.particle_diameter * params.particle_diameter;
    let gravity = -UP * params.gravity * params.particle_mass;

    forces
        .par_iter_mut()
        .zip(particles.par_iter())
        .enumerate()
        .map(|(i, (force, p))| {
            let mut f = gravity;
            let mut contacts = 0;
            let body = i / spb;

            // Unhashed particles find no neighbors, so every contact has a partner
            if let Some(center) = grid.voxel_coords(p.position) {
                let center = center.as_ivec3();
                for dz in -1..=1 {
                    for dy in -1..=1 {
                        for dx in -1..=1 {
                            let Some(c) = grid.checked_coords(center + IVec3::new(dx, dy, dz))
                            else {
                                continue;
                            };
                            for j in voxels.particles_in(grid.voxel_index(c)) {
                                let j = j as usize;
                                if j / spb == body {
                                    continue;
                                }
                                let other = &particles[j];
                                let diff = other.position - p.position;
                                let dist_sq = diff.length_squared();
                                if dist_sq >= diameter_sq || dist_sq < MIN_CONTACT_DISTANCE_SQ {
                                    continue;
                                }
                                let dist = dist_sq.sqrt();
                                let normal = diff / dist;
                                let v_n = (other.velocity - p.velocity).dot(normal);
                                let penetration = params.particle_diameter - dist;
                                f -= normal * params.penalty(penetration, v_n);
                                contacts += 1;
                            }
                        }
                    }
                }
            }

            if let Some(ground) = &params.ground {
                let penetration = ground.penetration(p.position, params.particle_diameter * 0.5);
                if penetration > 0.0 {
                    // Plane is static: relative velocity is the particle's
                    let v_n = -p.velocity.dot(UP);
                    f += UP * params.penalty(penetration, v_n);
                    contacts += 1;
                }
            }

            *force = f;
            contacts
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec3;

    fn params(diameter: f32) -> ContactParams {
        ContactParams {
            particle_diameter: diameter,
            spring: 100.0,
            damping: 0.0,
            gravity: 0.0,
            particle_mass: 1.0,
            samples_per_body: 1,
            ground: None,
        }
    }

    fn at(position: Vec3, velocity: Vec3) -> ParticleKinematics {
        ParticleKinematics {
            position,
            velocity,
            relative: Vec3::ZERO,
        }
    }

    fn run(grid: &SimulationGrid, particles: &[ParticleKinematics], params: &ContactParams) -> (Vec<Vec3>, usize) {
        let mut voxels = VoxelGrid::for_grid(grid);
        voxels.assign(grid, particles);
        let mut forces = vec![Vec3::ZERO; particles.len()];
        let contacts = compute_forces(grid, &voxels, particles, params, &mut forces);
        (forces, contacts)
    }

    // ========== Pair Contact Tests ==========

    #[test]
    fn test_separated_particles_feel_nothing() {
        let grid = SimulationGrid::new(UVec3::splat(8), 0.05, Vec3::splat(-0.2));
        let particles = [at(Vec3::ZERO, Vec3::ZERO), at(Vec3::new(0.0, 0.0, 0.045), Vec3::ZERO)];
        let (forces, contacts) = run(&grid, &particles, &params(0.04));
        assert_eq!(contacts, 0);
        assert_eq!(forces[0], Vec3::ZERO);
    }

    #[test]
    fn test_damping_opposes_approach() {
        let grid = SimulationGrid::new(UVec3::splat(8), 0.05, Vec3::splat(-0.2));
        let particles = [
            at(Vec3::ZERO, Vec3::Z),
            at(Vec3::new(0.0, 0.0, 0.03), -Vec3::Z),
        ];
        let mut p = params(0.04);
        p.spring = 0.0;
        p.damping = 1.0;
        let (forces, _) = run(&grid, &particles, &p);
        // Closing speed 2 along +Z pushes particle 0 back along -Z
        assert!((forces[0] - Vec3::new(0.0, 0.0, -2.0)).length() < 1e-5);
        assert!((forces[1] - Vec3::new(0.0, 0.0, 2.0)).length() < 1e-5);
    }

    #[test]
    fn test_same_body_excluded() {
        let grid = SimulationGrid::new(UVec3::splat(8), 0.05, Vec3::splat(-0.2));
        let particles = [at(Vec3::ZERO, Vec3::ZERO), at(Vec3::new(0.0, 0.0, 0.03), Vec3::ZERO)];
        let mut p = params(0.04);
        p.samples_per_body = 2;
        let (forces, contacts) = run(&grid, &particles, &p);
        assert_eq!(contacts, 0);
        assert_eq!(forces[1], Vec3::ZERO);
    }

    #[test]
    fn test_neighbor_voxel_contact() {
        // Particles straddle a voxel boundary
        let grid = SimulationGrid::new(UVec3::splat(4), 0.05, Vec3::ZERO);
        let particles = [
            at(Vec3::new(0.045, 0.025, 0.025), Vec3::ZERO),
            at(Vec3::new(0.065, 0.025, 0.025), Vec3::ZERO),
        ];
        let (forces, contacts) = run(&grid, &particles, &params(0.04));
        assert_eq!(contacts, 2);
        assert!(forces[0].x < 0.0 && forces[1].x > 0.0);
        assert!((forces[0] + forces[1]).length() < 1e-5);
    }

    // ========== Gravity and Ground Tests ==========

    #[test]
    fn test_gravity_uses_particle_mass() {
        let grid = SimulationGrid::new(UVec3::splat(4), 1.0, Vec3::ZERO);
        let mut p = params(0.5);
        p.gravity = 10.0;
        p.particle_mass = 0.25;
        let (forces, _) = run(&grid, &[at(Vec3::splat(2.0), Vec3::ZERO)], &p);
        assert!((forces[0] - Vec3::new(0.0, -2.5, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_outside_particle_still_gets_gravity() {
        let grid = SimulationGrid::new(UVec3::splat(4), 1.0, Vec3::ZERO);
        let mut p = params(0.5);
        p.gravity = 1.0;
        let (forces, contacts) = run(&grid, &[at(Vec3::splat(-5.0), Vec3::ZERO)], &p);
        assert_eq!(contacts, 0);
        assert_eq!(forces[0], -UP);
    }

    #[test]
    fn test_far_particle_is_total() {
        let grid = SimulationGrid::new(UVec3::splat(4), 1.0, Vec3::ZERO);
        let mut p = params(0.5);
        p.gravity = 1.0;
        let particles = [
            at(Vec3::new(0.0, -1.0e9, 0.0), Vec3::ZERO),
            at(Vec3::new(1.0e30, 1.0e30, -1.0e30), Vec3::ZERO),
        ];
        let (forces, contacts) = run(&grid, &particles, &p);
        assert_eq!(contacts, 0);
        assert_eq!(forces, vec![-UP, -UP]);
    }

    #[test]
    fn test_grid_face_pair_stays_symmetric() {
        // One particle just inside the x = 0 face, one just outside
        let grid = SimulationGrid::new(UVec3::splat(4), 0.05, Vec3::ZERO);
        let particles = [
            at(Vec3::new(0.01, 0.1, 0.1), Vec3::ZERO),
            at(Vec3::new(-0.01, 0.1, 0.1), Vec3::ZERO),
        ];
        let (forces, contacts) = run(&grid, &particles, &params(0.04));
        assert_eq!(contacts, 0);
        assert!((forces[0] + forces[1]).length() < 1e-6, "{:?}", forces);
        assert_eq!(forces[1], Vec3::ZERO);
    }

    #[test]
    fn test_ground_pushes_up() {
        let grid = SimulationGrid::new(UVec3::splat(4), 1.0, Vec3::ZERO);
        let mut p = params(0.5);
        p.ground = Some(GroundPlane::from_grid(&grid, 0.0));
        let (forces, contacts) = run(&grid, &[at(Vec3::new(2.0, 0.15, 2.0), Vec3::ZERO)], &p);
        assert_eq!(contacts, 1);
        // radius 0.25, height 0.15 -> penetration 0.1
        assert!((forces[0] - Vec3::new(0.0, 10.0, 0.0)).length() < 1e-4);
    }
}
