//! Writes a trained model and its metadata as one unit

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::path::{Path, PathBuf};

use crate::export::metadata::ModelMetadata;
use crate::model::mlp::MlpModel;
use crate::training::metrics::to_host;
use crate::{PipelineError, Result};

/// Paths and metadata of a finished export
#[derive(Debug, Clone)]
pub struct ExportBundle {
    pub model_path: PathBuf,
    pub metadata_path: PathBuf,
    pub metadata: ModelMetadata,
}

/// Exports a model into `dir` under fixed file names
#[derive(Debug, Clone)]
pub struct ModelExporter {
    dir: PathBuf,
    model_file: String,
    metadata_file: String,
}

impl ModelExporter {
    pub fn new(dir: impl Into<PathBuf>, model_file: &str, metadata_file: &str) -> Self {
        ModelExporter {
            dir: dir.into(),
            model_file: model_file.to_string(),
            metadata_file: metadata_file.to_string(),
        }
    }

    /// Export `model`, which must live on a backend without autodiff so
    /// dropout is inactive.
    ///
    /// Both files are staged first and only renamed into place once both were
    /// written; on failure neither final file is left behind.
    pub fn export<B: Backend>(
        &self,
        model: &MlpModel<B>,
        mut metadata: ModelMetadata,
        device: &B::Device,
    ) -> Result<ExportBundle>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        metadata.model_file = self.model_file.clone();
        metadata.validate()?;
        trace(model, &metadata, device)?;

        std::fs::create_dir_all(&self.dir).map_err(|e| {
            PipelineError::Export(format!(
                "cannot create output directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let bytes = model.to_bytes()?;
        let json = serde_json::to_string_pretty(&metadata)?;

        let model_path = self.dir.join(&self.model_file);
        let metadata_path = self.dir.join(&self.metadata_file);
        let staged_model = staged(&model_path);
        let staged_metadata = staged(&metadata_path);

        let written = std::fs::write(&staged_model, &bytes)
            .and_then(|_| std::fs::write(&staged_metadata, &json));
        if let Err(e) = written {
            remove_quietly(&[&staged_model, &staged_metadata]);
            return Err(export_error(&self.dir, e));
        }

        if let Err(e) = std::fs::rename(&staged_model, &model_path) {
            remove_quietly(&[&staged_model, &staged_metadata]);
            return Err(export_error(&self.dir, e));
        }
        if let Err(e) = std::fs::rename(&staged_metadata, &metadata_path) {
            remove_quietly(&[&model_path, &staged_metadata]);
            return Err(export_error(&self.dir, e));
        }

        log::info!("Model saved to {}", model_path.display());
        log::info!("Metadata saved to {}", metadata_path.display());

        Ok(ExportBundle {
            model_path,
            metadata_path,
            metadata,
        })
    }
}

/// Run one zero-valued `(1, input_dim)` example through the model and check
/// the output width against the metadata
fn trace<B: Backend>(model: &MlpModel<B>, metadata: &ModelMetadata, device: &B::Device) -> Result<()> {
    let example = Tensor::<B, 2>::zeros([1, metadata.input_dim], device);
    let output = model.infer(example, metadata.architecture.output_activation);

    let expected = [1, metadata.architecture.output_dim];
    if output.dims() != expected {
        return Err(PipelineError::Export(format!(
            "model produced shape {:?} for a single example, expected {:?}",
            output.dims(),
            expected
        )));
    }
    if to_host(output)?.iter().any(|v| !v.is_finite()) {
        log::warn!("Exported model produces non-finite output for a zero input");
    }
    Ok(())
}

fn staged(path: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".tmp");
    path.with_file_name(name)
}

fn remove_quietly(paths: &[&Path]) {
    for path in paths {
        let _ = std::fs::remove_file(path);
    }
}

fn export_error(dir: &Path, e: std::io::Error) -> PipelineError {
    PipelineError::Export(format!("cannot write to {}: {}", dir.display(), e))
}
