//! Stage 4: reduce particle forces into body momentum.

use crate::particles::ParticleKinematics;
use glam::Vec3;
use rayon::prelude::*;

/// Add `sum(F) * dt` and `sum(r x F) * dt` of each body's particles to its
/// momentum. Only the first `forces.len() / samples_per_body` bodies change.
pub fn accumulate_momentum(
    particles: &[ParticleKinematics],
    forces: &[Vec3],
    samples_per_body: usize,
    dt: f32,
    linear_momentum: &mut [Vec3],
    angular_momentum: &mut [Vec3],
) {
    if samples_per_body == 0 {
        return;
    }

    linear_momentum
        .par_iter_mut()
        .zip(angular_momentum.par_iter_mut())
        .zip(forces.par_chunks(samples_per_body))
        .zip(particles.par_chunks(samples_per_body))
        .for_each(|(((linear, angular), forces), particles)| {
            let mut force = Vec3::ZERO;
            let mut torque = Vec3::ZERO;
            for (f, p) in forces.iter().zip(particles) {
                force += *f;
                torque += p.relative.cross(*f);
            }
            *linear += force * dt;
            *angular += torque * dt;
        });
}
