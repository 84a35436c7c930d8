//! Rigid body state for every instance slot.
//!
//! Position and orientation live in two named snapshots. One of them is the
//! active copy this tick reads; integration writes the other one and
//! [`RigidBodies::swap`] flips the roles at the tick boundary. Momentum is
//! single-buffered: the momentum stage updates every slot in place without
//! reading any other slot.

use glam::{Quat, Vec3};

/// One full copy of per-instance placement.
#[derive(Clone, Debug, Default)]
pub struct BodySnapshot {
    pub positions: Vec<Vec3>,
    pub orientations: Vec<Quat>,
}

impl BodySnapshot {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: vec![Vec3::ZERO; capacity],
            orientations: vec![Quat::IDENTITY; capacity],
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Which snapshot a tick reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotRole {
    A,
    B,
}

impl SnapshotRole {
    fn other(self) -> Self {
        match self {
            SnapshotRole::A => SnapshotRole::B,
            SnapshotRole::B => SnapshotRole::A,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RigidBodies {
    a: BodySnapshot,
    b: BodySnapshot,
    active: SnapshotRole,
    /// Number of completed swaps
    generation: u64,
    pub linear_momentum: Vec<Vec3>,
    pub angular_momentum: Vec<Vec3>,
}

impl RigidBodies {
    pub fn new(capacity: usize) -> Self {
        Self {
            a: BodySnapshot::with_capacity(capacity),
            b: BodySnapshot::with_capacity(capacity),
            active: SnapshotRole::A,
            generation: 0,
            linear_momentum: vec![Vec3::ZERO; capacity],
            angular_momentum: vec![Vec3::ZERO; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.linear_momentum.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn active_role(&self) -> SnapshotRole {
        self.active
    }

    /// The copy read this tick and shown by the visual layer.
    pub fn active(&self) -> &BodySnapshot {
        match self.active {
            SnapshotRole::A => &self.a,
            SnapshotRole::B => &self.b,
        }
    }

    fn active_mut(&mut self) -> &mut BodySnapshot {
        match self.active {
            SnapshotRole::A => &mut self.a,
            SnapshotRole::B => &mut self.b,
        }
    }

    /// Borrow the active copy for reading and the inactive copy for writing.
    pub fn split(&mut self) -> (&BodySnapshot, &mut BodySnapshot) {
        match self.active {
            SnapshotRole::A => (&self.a, &mut self.b),
            SnapshotRole::B => (&self.b, &mut self.a),
        }
    }

    /// Like [`Self::split`], also handing out the momentum buffers.
    pub fn split_with_momentum(&mut self) -> (&BodySnapshot, &mut BodySnapshot, &[Vec3], &[Vec3]) {
        let (read, write) = match self.active {
            SnapshotRole::A => (&self.a, &mut self.b),
            SnapshotRole::B => (&self.b, &mut self.a),
        };
        (read, write, &self.linear_momentum, &self.angular_momentum)
    }

    /// Make the copy written this tick the active one.
    pub fn swap(&mut self) {
        self.active = self.active.other();
        self.generation += 1;
    }

    /// Initialize slot `index` in the active copy.
    ///
    /// Returns false (and changes nothing) for an index beyond capacity.
    pub fn spawn(&mut self, index: usize, position: Vec3, linear_momentum: Vec3) -> bool {
        if index >= self.capacity() {
            return false;
        }
        let snapshot = self.active_mut();
        snapshot.positions[index] = position;
        snapshot.orientations[index] = Quat::IDENTITY;
        self.linear_momentum[index] = linear_momentum;
        self.angular_momentum[index] = Vec3::ZERO;
        true
    }

    /// Return every slot and both roles to the initial state.
    pub fn clear(&mut self) {
        for snapshot in [&mut self.a, &mut self.b] {
            snapshot.positions.fill(Vec3::ZERO);
            snapshot.orientations.fill(Quat::IDENTITY);
        }
        self.linear_momentum.fill(Vec3::ZERO);
        self.angular_momentum.fill(Vec3::ZERO);
        self.active = SnapshotRole::A;
        self.generation = 0;
    }

    /// All four buffers agree on capacity.
    pub fn is_consistent(&self) -> bool {
        let n = self.capacity();
        self.a.positions.len() == n
            && self.a.orientations.len() == n
            && self.b.positions.len() == n
            && self.b.orientations.len() == n
            && self.angular_momentum.len() == n
    }
}
