//! Stage 5: advance position and orientation into the inactive copy.

use super::MassProperties;
use crate::body::BodySnapshot;
use glam::{Mat3, Quat, Vec3};
use rayon::prelude::*;

/// First-order quaternion step, renormalized.
pub fn integrate_orientation(q: Quat, omega: Vec3, dt: f32) -> Quat {
    let spin = Quat::from_xyzw(omega.x, omega.y, omega.z, 0.0) * q;
    (q + spin * (0.5 * dt)).normalize()
}

/// Integrate the first `active` bodies from `read` into `write`.
pub fn integrate_bodies(
    read: &BodySnapshot,
    write: &mut BodySnapshot,
    linear_momentum: &[Vec3],
    angular_momentum: &[Vec3],
    mass: &MassProperties,
    dt: f32,
    active: usize,
) {
    let inv_mass = 1.0 / mass.mass;

    write.positions[..active]
        .par_iter_mut()
        .zip(write.orientations[..active].par_iter_mut())
        .enumerate()
        .for_each(|(i, (position, orientation))| {
            let q = read.orientations[i];
            let velocity = linear_momentum[i] * inv_mass;
            let omega = mass.world_inverse_inertia(Mat3::from_quat(q)) * angular_momentum[i];

            *position = read.positions[i] + velocity * dt;
            *orientation = integrate_orientation(q, omega, dt);
        });
}
