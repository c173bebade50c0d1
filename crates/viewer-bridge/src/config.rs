use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use model_pipeline::export::DEFAULT_TESSELLATION_TOLERANCE;
use model_pipeline::{Axis, SeparationPolicy};

use crate::catalog::ModelCatalog;

/// Configuration for the bridge. Every field has a default, so `{}` is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Directory model identifiers are resolved against.
    pub models_root: PathBuf,
    /// Chordal tolerance for display meshes.
    pub tessellation_tolerance: f64,
    /// Preview placement of the second model.
    pub separation: SeparationPolicy,
    pub separation_axis: Axis,
    /// Replaces the built-in selector table when present.
    pub catalog: Option<ModelCatalog>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            models_root: PathBuf::from("public"),
            tessellation_tolerance: DEFAULT_TESSELLATION_TOLERANCE,
            separation: SeparationPolicy::default(),
            separation_axis: Axis::default(),
            catalog: None,
        }
    }
}

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read configuration {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("tessellation tolerance must be positive, got {0}")]
    Tolerance(f64),
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let json = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            reason: e.to_string(),
            path,
        })?;
        Self::from_json(&json)
    }

    pub fn catalog(&self) -> ModelCatalog {
        self.catalog.clone().unwrap_or_default()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tessellation_tolerance > 0.0) || !self.tessellation_tolerance.is_finite() {
            return Err(ConfigError::Tolerance(self.tessellation_tolerance));
        }
        Ok(())
    }
}
