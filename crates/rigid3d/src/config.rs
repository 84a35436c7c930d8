//! Solver configuration.
//!
//! Everything the host layer binds (run flag, spawn timing, contact
//! coefficients, grid layout, voxelizer options) lives here and is handed to
//! [`crate::RigidSolver`] explicitly. Configs round-trip through JSON and YAML.

use crate::constants::{
    DEFAULT_DEPTH_LAYERS, DEFAULT_GRID_RESOLUTION, DEFAULT_VOXEL_LENGTH, GRAVITY,
    MAX_RIGID_BODIES,
};
use crate::debug_dump::DumpBuffer;
use crate::error::{Result, SolverError};
use crate::serde_utils::{deserialize_vec3, serialize_vec3};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level solver parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Pipeline is dispatched only while this is set
    pub running: bool,
    /// Fixed tick duration (s)
    pub dt: f32,
    /// Simulated time between two spawns (s)
    pub spawn_interval: f32,
    /// Number of instances the spawner grows towards
    pub target_count: usize,
    /// Instance capacity N_max
    pub max_bodies: usize,
    /// Collision particle diameter (m)
    pub particle_diameter: f32,
    /// Mass of one instance (kg)
    pub mass: f32,
    /// Gravity magnitude (m/s^2), acting along -Y
    pub gravity: f32,
    /// Penalty spring coefficient (N/m)
    pub spring: f32,
    /// Penalty damping coefficient (N*s/m)
    pub damping: f32,
    pub grid: GridConfig,
    pub voxelizer: VoxelizerConfig,
    pub ground: GroundConfig,
    pub debug: Option<DebugConfig>,
}

/// Voxel domain and emitter.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Voxel count along X, Y, Z
    pub resolution: [u32; 3],
    /// Voxel edge length (m)
    pub voxel_length: f32,
    /// World position of the grid's bottom-left-front corner
    #[serde(serialize_with = "serialize_vec3", deserialize_with = "deserialize_vec3")]
    pub origin: Vec3,
    #[serde(serialize_with = "serialize_vec3", deserialize_with = "deserialize_vec3")]
    pub emitter_position: Vec3,
    #[serde(serialize_with = "serialize_vec3", deserialize_with = "deserialize_vec3")]
    pub emitter_velocity: Vec3,
}

/// Options for turning a mesh into collision samples.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VoxelizerConfig {
    /// Largest extent of the shape after scaling; `None` keeps the mesh scale
    pub preferred_size: Option<f32>,
    /// Number of depth layers K captured per column
    pub depth_layers: usize,
    /// Substitute six axis points when no interior voxel is found
    pub fallback: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundConfig {
    pub enabled: bool,
    /// Height of the plane in world space
    pub height: f32,
}

/// Where and what to dump each tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DebugConfig {
    pub dir: PathBuf,
    pub buffers: Vec<DumpBuffer>,
    /// Dump every n-th tick (1 = every tick)
    #[serde(default = "default_dump_interval")]
    pub interval: u64,
}

fn default_dump_interval() -> u64 {
    1
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            running: true,
            dt: 1.0 / 120.0,
            spawn_interval: 1.0,
            target_count: 64,
            max_bodies: MAX_RIGID_BODIES,
            particle_diameter: DEFAULT_VOXEL_LENGTH,
            mass: 1.0,
            gravity: GRAVITY,
            spring: 60.0,
            damping: 0.4,
            grid: GridConfig::default(),
            voxelizer: VoxelizerConfig::default(),
            ground: GroundConfig::default(),
            debug: None,
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        let res = DEFAULT_GRID_RESOLUTION;
        let half = res as f32 * DEFAULT_VOXEL_LENGTH * 0.5;
        Self {
            resolution: [res; 3],
            voxel_length: DEFAULT_VOXEL_LENGTH,
            origin: Vec3::new(-half, 0.0, -half),
            emitter_position: Vec3::new(0.0, half, 0.0),
            emitter_velocity: Vec3::ZERO,
        }
    }
}

impl Default for VoxelizerConfig {
    fn default() -> Self {
        Self {
            preferred_size: Some(0.5),
            depth_layers: DEFAULT_DEPTH_LAYERS,
            fallback: true,
        }
    }
}

impl Default for GroundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            height: 0.0,
        }
    }
}

impl SolverConfig {
    /// Check every value the pipeline divides by or integrates with.
    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f32) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(SolverError::InvalidConfig(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )))
            }
        }
        fn non_negative(name: &str, value: f32) -> Result<()> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(SolverError::InvalidConfig(format!(
                    "{} must be non-negative and finite, got {}",
                    name, value
                )))
            }
        }

        positive("dt", self.dt)?;
        positive("spawn_interval", self.spawn_interval)?;
        positive("particle_diameter", self.particle_diameter)?;
        positive("mass", self.mass)?;
        non_negative("gravity", self.gravity)?;
        non_negative("spring", self.spring)?;
        non_negative("damping", self.damping)?;
        positive("grid.voxel_length", self.grid.voxel_length)?;

        if self.max_bodies == 0 {
            return Err(SolverError::InvalidConfig("max_bodies must be at least 1".into()));
        }
        if self.grid.resolution.iter().any(|&r| r == 0) {
            return Err(SolverError::InvalidConfig(format!(
                "grid.resolution must be non-zero on every axis, got {:?}",
                self.grid.resolution
            )));
        }
        if self.voxelizer.depth_layers == 0 {
            return Err(SolverError::InvalidConfig(
                "voxelizer.depth_layers must be at least 1".into(),
            ));
        }
        if let Some(size) = self.voxelizer.preferred_size {
            positive("voxelizer.preferred_size", size)?;
        }
        if !(self.grid.origin.is_finite()
            && self.grid.emitter_position.is_finite()
            && self.grid.emitter_velocity.is_finite())
        {
            return Err(SolverError::InvalidConfig(
                "grid origin and emitter must be finite".into(),
            ));
        }
        Ok(())
    }

    /// Save configuration to JSON file
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_json(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn save_yaml(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Load configuration from YAML file
    pub fn load_yaml(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&yaml)?;
        config.validate()?;
        Ok(config)
    }
}
