//! Error type for the solver's edges (configuration, shape loading, debug I/O).
//!
//! Pipeline stages never fail; only setup and file handling return errors.

use std::fmt;

#[derive(Debug)]
pub enum SolverError {
    /// A configuration value is out of range
    InvalidConfig(String),
    /// The mesh handed to the voxelizer cannot describe a solid
    InvalidMesh(String),
    Io(std::io::Error),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            SolverError::InvalidMesh(msg) => write!(f, "Invalid mesh: {}", msg),
            SolverError::Io(e) => write!(f, "I/O error: {}", e),
            SolverError::Json(e) => write!(f, "JSON error: {}", e),
            SolverError::Yaml(e) => write!(f, "YAML error: {}", e),
        }
    }
}

impl std::error::Error for SolverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SolverError::Io(e) => Some(e),
            SolverError::Json(e) => Some(e),
            SolverError::Yaml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SolverError {
    fn from(e: std::io::Error) -> Self {
        SolverError::Io(e)
    }
}

impl From<serde_json::Error> for SolverError {
    fn from(e: serde_json::Error) -> Self {
        SolverError::Json(e)
    }
}

impl From<serde_yaml::Error> for SolverError {
    fn from(e: serde_yaml::Error) -> Self {
        SolverError::Yaml(e)
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;
