//! Per-tick particle buffers.
//!
//! Particle `id` belongs to body `id / samples_per_body` and sample
//! `id % samples_per_body`. Buffers grow with the active count and keep their
//! allocation across ticks.

use glam::Vec3;

/// Kinematic values derived from the owning body each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ParticleKinematics {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Sample offset rotated into world space
    pub relative: Vec3,
}

#[derive(Clone, Debug, Default)]
pub struct Particles {
    pub kinematics: Vec<ParticleKinematics>,
    /// Contact plus gravity force per particle
    pub forces: Vec<Vec3>,
    samples_per_body: usize,
}

impl Particles {
    pub fn new(samples_per_body: usize) -> Self {
        Self {
            kinematics: Vec::new(),
            forces: Vec::new(),
            samples_per_body,
        }
    }

    pub fn samples_per_body(&self) -> usize {
        self.samples_per_body
    }

    pub fn len(&self) -> usize {
        self.kinematics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinematics.is_empty()
    }

    /// Size the buffers for `bodies` active instances.
    pub fn resize_for(&mut self, bodies: usize) {
        let n = bodies * self.samples_per_body;
        self.kinematics.resize(n, ParticleKinematics::default());
        self.forces.resize(n, Vec3::ZERO);
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.kinematics.iter().map(|k| k.position)
    }

    pub fn velocities(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.kinematics.iter().map(|k| k.velocity)
    }
}
