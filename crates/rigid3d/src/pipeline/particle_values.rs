//! Stage 1: derive particle kinematics from body state.

use super::MassProperties;
use crate::body::BodySnapshot;
use crate::particles::ParticleKinematics;
use glam::{Mat3, Vec3};
use rayon::prelude::*;

/// Fill `out` for the first `out.len() / samples.len()` bodies.
///
/// `out` holds one chunk of `samples.len()` particles per body.
pub fn compute_particle_values(
    bodies: &BodySnapshot,
    linear_momentum: &[Vec3],
    angular_momentum: &[Vec3],
    samples: &[Vec3],
    mass: &MassProperties,
    out: &mut [ParticleKinematics],
) {
    if samples.is_empty() {
        return;
    }
    let inv_mass = 1.0 / mass.mass;

    out.par_chunks_mut(samples.len())
        .enumerate()
        .for_each(|(body, particles)| {
            let q = bodies.orientations[body];
            let rotation = Mat3::from_quat(q);
            let velocity = linear_momentum[body] * inv_mass;
            let omega = mass.world_inverse_inertia(rotation) * angular_momentum[body];
            let position = bodies.positions[body];

            for (particle, offset) in particles.iter_mut().zip(samples) {
                let relative = q * *offset;
                *particle = ParticleKinematics {
                    position: position + relative,
                    velocity: velocity + omega.cross(relative),
                    relative,
                };
            }
        });
}
