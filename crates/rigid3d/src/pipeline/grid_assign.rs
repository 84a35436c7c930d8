//! Stage 2: capacity-bounded spatial hash.
//!
//! Every particle inside the grid produces a `(voxel, particle)` key. The keys
//! are sorted in parallel, which groups them into one bucket per voxel with
//! ids ascending. The first [`VOXEL_SLOTS`] ids of each bucket are committed,
//! the rest are dropped for this tick. Lowest id wins slot 0, so the result is
//! deterministic and re-running on the same positions reproduces it exactly.

use crate::constants::{EMPTY_SLOT, MAX_U32_INDEX, VOXEL_SLOTS};
use crate::grid::SimulationGrid;
use crate::particles::ParticleKinematics;
use rayon::prelude::*;

pub type VoxelSlots = [u32; VOXEL_SLOTS];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssignStats {
    /// Particles committed to a slot
    pub hashed: usize,
    /// Particles lost to full voxels
    pub dropped: usize,
    /// Particles outside the grid (never hashed)
    pub outside: usize,
}

#[derive(Clone, Debug)]
pub struct VoxelGrid {
    slots: Vec<VoxelSlots>,
    /// Voxels holding at least one id, ascending
    occupied: Vec<u32>,
    keys: Vec<(u32, u32)>,
}

impl VoxelGrid {
    pub fn new(voxel_count: usize) -> Self {
        Self {
            slots: vec![[EMPTY_SLOT; VOXEL_SLOTS]; voxel_count],
            occupied: Vec::new(),
            keys: Vec::new(),
        }
    }

    pub fn for_grid(grid: &SimulationGrid) -> Self {
        Self::new(grid.voxel_count())
    }

    pub fn voxel_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self, voxel: usize) -> &VoxelSlots {
        &self.slots[voxel]
    }

    /// Ids stored in `voxel`, without the empty sentinel.
    pub fn particles_in(&self, voxel: usize) -> impl Iterator<Item = u32> + '_ {
        self.slots[voxel]
            .iter()
            .copied()
            .take_while(|&id| id != EMPTY_SLOT)
    }

    pub fn occupancy(&self, voxel: usize) -> usize {
        self.particles_in(voxel).count()
    }

    pub fn occupied(&self) -> &[u32] {
        &self.occupied
    }

    /// Empty every voxel touched by the previous assignment.
    pub fn clear(&mut self) {
        for &voxel in &self.occupied {
            self.slots[voxel as usize] = [EMPTY_SLOT; VOXEL_SLOTS];
        }
        self.occupied.clear();
    }

    /// Rebuild the hash from scratch for `particles`.
    ///
    /// Particle ids and voxel indices must stay below [`EMPTY_SLOT`]; the
    /// solver rejects grids and templates that could exceed it.
    pub fn assign(&mut self, grid: &SimulationGrid, particles: &[ParticleKinematics]) -> AssignStats {
        debug_assert_eq!(grid.voxel_count(), self.slots.len());
        debug_assert!(particles.len() < MAX_U32_INDEX && self.slots.len() < MAX_U32_INDEX);
        self.clear();

        self.keys.clear();
        self.keys.par_extend(
            particles
                .par_iter()
                .enumerate()
                .filter_map(|(id, p)| {
                    grid.voxel_index_of(p.position)
                        .map(|voxel| (voxel as u32, id as u32))
                }),
        );
        self.keys.par_sort_unstable();

        let mut stats = AssignStats {
            outside: particles.len() - self.keys.len(),
            ..Default::default()
        };

        for bucket in self.keys.chunk_by(|a, b| a.0 == b.0) {
            let voxel = bucket[0].0;
            let slots = &mut self.slots[voxel as usize];
            for (slot, &(_, id)) in slots.iter_mut().zip(bucket) {
                *slot = id;
            }
            let kept = bucket.len().min(VOXEL_SLOTS);
            stats.hashed += kept;
            stats.dropped += bucket.len() - kept;
            self.occupied.push(voxel);
        }

        if stats.dropped > 0 {
            log::trace!("Grid assign dropped {} particles in full voxels", stats.dropped);
        }
        stats
    }

    /// Every voxel's occupancy, X fastest.
    pub fn occupancy_counts(&self) -> Vec<u32> {
        self.slots
            .par_iter()
            .map(|s| s.iter().filter(|&&id| id != EMPTY_SLOT).count() as u32)
            .collect()
    }
}
