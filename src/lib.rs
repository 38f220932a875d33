//! Document-structure model training
//!
//! Trains small feed-forward networks on tabular document statistics and
//! exports an inference-ready model together with the metadata needed to
//! reproduce its input transform.

pub mod data;
pub mod export;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod predict;
pub mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Kind of supervised problem a pipeline solves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    /// Multi-class classification over string class names
    Classification,
    /// Scalar regression against a `[0,1]` target
    Regression,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Classification => write!(f, "classification"),
            Task::Regression => write!(f, "regression"),
        }
    }
}

/// Pipeline-wide errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Feature '{feature}' (column {index}) has zero variance in the training split")]
    DegenerateFeature { feature: String, index: usize },

    #[error("Numeric instability at epoch {epoch}: {detail}")]
    NumericInstability { epoch: usize, detail: String },

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Row {row} has {cells} cells, header has {expected}")]
    MalformedRow {
        row: usize,
        cells: usize,
        expected: usize,
    },

    #[error("Invalid label at row {row}: {value:?}")]
    InvalidLabel { row: usize, value: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tensor error: {0}")]
    Tensor(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub training: TrainingConfig,
    pub split: SplitConfig,
    pub normalization: NormalizationConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
    /// Epoch interval for progress logging
    pub progress_interval: usize,
    pub non_finite: NonFinitePolicy,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 100,
            learning_rate: 1e-3,
            seed: 42,
            progress_interval: 10,
            non_finite: NonFinitePolicy::Freeze,
        }
    }
}

/// What to do when the training loss or a validation metric is NaN/Inf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonFinitePolicy {
    /// Keep training; a non-finite metric never replaces the checkpoint
    Freeze,
    /// Abort with `PipelineError::NumericInstability`
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of all samples held out for test
    pub test_fraction: f64,
    /// Fraction of the non-test remainder held out for validation
    pub val_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        SplitConfig {
            test_fraction: 0.2,
            val_fraction: 0.2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub zero_variance: ZeroVariancePolicy,
}

/// Handling of features whose training standard deviation is exactly zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    /// Use a scale of 1.0 so the feature maps to zero
    #[default]
    UnitScale,
    /// Reject with `PipelineError::DegenerateFeature`
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: "models".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let in_unit = |f: f64| f > 0.0 && f < 1.0;
        if !in_unit(self.split.test_fraction) || !in_unit(self.split.val_fraction) {
            return Err(PipelineError::Config(format!(
                "split fractions must lie in (0, 1), got test={} val={}",
                self.split.test_fraction, self.split.val_fraction
            )));
        }
        if !(self.training.learning_rate > 0.0) {
            return Err(PipelineError::Config(format!(
                "learning_rate must be positive, got {}",
                self.training.learning_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.training.epochs = 7;
        config.normalization.zero_variance = ZeroVariancePolicy::Fail;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.training.epochs, 7);
        assert_eq!(loaded.training.seed, 42);
        assert_eq!(loaded.normalization.zero_variance, ZeroVariancePolicy::Fail);
        assert_eq!(loaded.training.non_finite, NonFinitePolicy::Freeze);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str("[training]\nepochs = 20\n").unwrap();
        assert_eq!(config.training.epochs, 20);
        assert_eq!(config.training.progress_interval, 10);
        assert!((config.split.test_fraction - 0.2).abs() < 1e-12);
        assert_eq!(config.output.dir, "models");
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        let mut config = Config::default();
        config.split.val_fraction = 1.0;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }
}
