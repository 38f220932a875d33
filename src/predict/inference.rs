//! Inference from an exported model directory

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::path::Path;

use crate::export::metadata::ModelMetadata;
use crate::features::normalize::NormalizationParams;
use crate::model::mlp::MlpModel;
use crate::training::metrics::{argmax_rows, to_host};
use crate::{PipelineError, Result, Task};

/// Output for one raw feature row
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    Class {
        code: usize,
        label: String,
        probabilities: Vec<f32>,
    },
    /// Score clipped to [0, 1]
    Score(f32),
}

/// A model loaded together with the metadata that describes its inputs
pub struct ExportedModel<B: Backend> {
    model: MlpModel<B>,
    metadata: ModelMetadata,
    normalization: NormalizationParams,
    device: B::Device,
}

impl<B: Backend> ExportedModel<B>
where
    B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
    B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Load `metadata_file` from `dir` and the weights file it names
    pub fn load(dir: impl AsRef<Path>, metadata_file: &str, device: B::Device) -> Result<Self> {
        let dir = dir.as_ref();
        let metadata = ModelMetadata::load(dir.join(metadata_file))?;
        let bytes = std::fs::read(dir.join(&metadata.model_file))?;
        let model = MlpModel::from_bytes(&device, bytes, &metadata.architecture)?;

        Ok(ExportedModel {
            model,
            normalization: metadata.normalization(),
            metadata,
            device,
        })
    }
}

impl<B: Backend> ExportedModel<B> {
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Standardize one raw row with the exported scaler and run the model
    pub fn predict(&self, raw: &[f32]) -> Result<Prediction> {
        let dim = self.metadata.input_dim;
        if raw.len() != dim {
            return Err(PipelineError::InsufficientData(format!(
                "expected {} features ({}), got {}",
                dim,
                self.metadata.feature_names.join(", "),
                raw.len()
            )));
        }

        let mut row = raw.to_vec();
        self.normalization.apply_row(&mut row);
        let input = Tensor::<B, 1>::from_floats(row.as_slice(), &self.device).reshape([1, dim]);
        let output = to_host(
            self.model
                .infer(input, self.metadata.architecture.output_activation),
        )?;

        match self.metadata.task() {
            Task::Classification => {
                let code = argmax_rows(&output, output.len())
                    .first()
                    .copied()
                    .unwrap_or(0);
                let label = self
                    .metadata
                    .label_mapping
                    .as_ref()
                    .and_then(|m| m.get(&code).cloned())
                    .unwrap_or_else(|| code.to_string());
                Ok(Prediction::Class {
                    code,
                    label,
                    probabilities: output,
                })
            }
            Task::Regression => {
                let score = output.first().copied().unwrap_or(f32::NAN);
                Ok(Prediction::Score(score.clamp(0.0, 1.0)))
            }
        }
    }
}
