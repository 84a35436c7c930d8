//! Plain-text dumps of intermediate buffers.
//!
//! Each requested buffer is written to `<dir>/<buffer>_<tick>.txt`, one record
//! per line, values separated by single spaces.

use crate::config::DebugConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DumpBuffer {
    ParticlePositions,
    ParticleVelocities,
    ParticleForces,
    LinearMomentum,
    AngularMomentum,
    GridOccupancy,
    BodyPositions,
    BodyOrientations,
}

impl DumpBuffer {
    pub const ALL: [DumpBuffer; 8] = [
        DumpBuffer::ParticlePositions,
        DumpBuffer::ParticleVelocities,
        DumpBuffer::ParticleForces,
        DumpBuffer::LinearMomentum,
        DumpBuffer::AngularMomentum,
        DumpBuffer::GridOccupancy,
        DumpBuffer::BodyPositions,
        DumpBuffer::BodyOrientations,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DumpBuffer::ParticlePositions => "particle_positions",
            DumpBuffer::ParticleVelocities => "particle_velocities",
            DumpBuffer::ParticleForces => "particle_forces",
            DumpBuffer::LinearMomentum => "linear_momentum",
            DumpBuffer::AngularMomentum => "angular_momentum",
            DumpBuffer::GridOccupancy => "grid_occupancy",
            DumpBuffer::BodyPositions => "body_positions",
            DumpBuffer::BodyOrientations => "body_orientations",
        }
    }

    /// Values per record.
    pub fn chunk_size(self) -> usize {
        match self {
            DumpBuffer::GridOccupancy => 1,
            DumpBuffer::BodyOrientations => 4,
            _ => 3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DebugDump {
    config: DebugConfig,
}

impl DebugDump {
    pub fn new(config: DebugConfig) -> Self {
        Self { config }
    }

    pub fn buffers(&self) -> &[DumpBuffer] {
        &self.config.buffers
    }

    pub fn is_due(&self, tick: u64) -> bool {
        !self.config.buffers.is_empty() && tick % self.config.interval.max(1) == 0
    }

    pub fn path_for(&self, buffer: DumpBuffer, tick: u64) -> PathBuf {
        self.config
            .dir
            .join(format!("{}_{}.txt", buffer.name(), tick))
    }

    /// Write `values` in records of `buffer.chunk_size()`.
    pub fn write<I>(&self, buffer: DumpBuffer, tick: u64, values: I) -> Result<PathBuf>
    where
        I: IntoIterator<Item = f32>,
    {
        std::fs::create_dir_all(&self.config.dir)?;
        let path = self.path_for(buffer, tick);
        let mut out = BufWriter::new(File::create(&path)?);
        let chunk = buffer.chunk_size();

        for (i, value) in values.into_iter().enumerate() {
            if i % chunk != 0 {
                out.write_all(b" ")?;
            } else if i > 0 {
                out.write_all(b"\n")?;
            }
            write!(out, "{}", value)?;
        }
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(path)
    }
}
