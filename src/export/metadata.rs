//! Metadata record written next to every exported model

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::features::normalize::NormalizationParams;
use crate::model::mlp::{MlpConfig, OutputActivation};
use crate::{PipelineError, Result, Task};

/// Everything a consumer needs to reproduce the input transform and read
/// the model's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Input column order expected by the model
    pub feature_names: Vec<String>,
    /// Class code to class name (classifier only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_mapping: Option<BTreeMap<usize, String>>,
    pub scaler_mean: Vec<f64>,
    pub scaler_std: Vec<f64>,
    /// Written as `null` when not finite
    #[serde(
        default,
        deserialize_with = "nullable_metric",
        skip_serializing_if = "Option::is_none"
    )]
    pub test_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_classes: Option<usize>,
    #[serde(
        default,
        deserialize_with = "nullable_metric",
        skip_serializing_if = "Option::is_none"
    )]
    pub test_mae: Option<f64>,
    pub input_dim: usize,
    pub architecture: MlpConfig,
    /// Weights file name, relative to the metadata file
    pub model_file: String,
}

/// serde_json writes a NaN metric as `null`; read it back as NaN so a
/// degraded run's metadata loads again. An absent field stays `None`.
fn nullable_metric<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(|v| Some(v.unwrap_or(f64::NAN)))
}

impl ModelMetadata {
    /// Metadata for a classifier; `num_classes` comes from the mapping
    pub fn classifier(
        feature_names: Vec<String>,
        label_mapping: BTreeMap<usize, String>,
        normalization: &NormalizationParams,
        test_accuracy: f64,
        architecture: MlpConfig,
    ) -> Self {
        ModelMetadata {
            input_dim: feature_names.len(),
            feature_names,
            num_classes: Some(label_mapping.len()),
            label_mapping: Some(label_mapping),
            scaler_mean: normalization.mean.clone(),
            scaler_std: normalization.scale.clone(),
            test_accuracy: Some(test_accuracy),
            test_mae: None,
            architecture,
            model_file: String::new(),
        }
    }

    pub fn regressor(
        feature_names: Vec<String>,
        normalization: &NormalizationParams,
        test_mae: f64,
        architecture: MlpConfig,
    ) -> Self {
        ModelMetadata {
            input_dim: feature_names.len(),
            feature_names,
            label_mapping: None,
            scaler_mean: normalization.mean.clone(),
            scaler_std: normalization.scale.clone(),
            test_accuracy: None,
            num_classes: None,
            test_mae: Some(test_mae),
            architecture,
            model_file: String::new(),
        }
    }

    pub fn task(&self) -> Task {
        match self.architecture.output_activation {
            OutputActivation::Softmax => Task::Classification,
            OutputActivation::Sigmoid => Task::Regression,
        }
    }

    pub fn normalization(&self) -> NormalizationParams {
        NormalizationParams {
            mean: self.scaler_mean.clone(),
            scale: self.scaler_std.clone(),
        }
    }

    /// Check that every field agrees with every other field
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(PipelineError::Export(msg));

        if self.input_dim != self.feature_names.len() {
            return fail(format!(
                "input_dim {} does not match {} feature names",
                self.input_dim,
                self.feature_names.len()
            ));
        }
        if self.scaler_mean.len() != self.input_dim || self.scaler_std.len() != self.input_dim {
            return fail(format!(
                "scaler has {} means and {} scales for input_dim {}",
                self.scaler_mean.len(),
                self.scaler_std.len(),
                self.input_dim
            ));
        }
        if let Some(i) = self.scaler_std.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
            return fail(format!(
                "scale for '{}' is {}",
                self.feature_names[i], self.scaler_std[i]
            ));
        }
        if self.architecture.input_dim != self.input_dim {
            return fail(format!(
                "architecture expects {} inputs, metadata declares {}",
                self.architecture.input_dim, self.input_dim
            ));
        }

        match self.task() {
            Task::Classification => {
                let Some(mapping) = &self.label_mapping else {
                    return fail("classifier metadata has no label_mapping".to_string());
                };
                if !mapping.keys().copied().eq(0..mapping.len()) {
                    return fail("label codes must be contiguous from 0".to_string());
                }
                if self.num_classes != Some(mapping.len())
                    || self.architecture.output_dim != mapping.len()
                {
                    return fail(format!(
                        "num_classes {:?} and output width {} disagree with {} labels",
                        self.num_classes,
                        self.architecture.output_dim,
                        mapping.len()
                    ));
                }
                if self.test_accuracy.is_none() {
                    return fail("classifier metadata has no test_accuracy".to_string());
                }
            }
            Task::Regression => {
                if self.architecture.output_dim != 1 {
                    return fail(format!(
                        "score predictor must have one output, found {}",
                        self.architecture.output_dim
                    ));
                }
                if self.label_mapping.is_some() {
                    return fail("score predictor metadata carries a label_mapping".to_string());
                }
                if self.test_mae.is_none() {
                    return fail("score predictor metadata has no test_mae".to_string());
                }
            }
        }
        Ok(())
    }

    /// Read and validate a metadata file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let metadata: ModelMetadata = serde_json::from_str(&content)?;
        metadata.validate()?;
        Ok(metadata)
    }
}
