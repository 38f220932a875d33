//! End-to-end training pipeline
//!
//! load → extract → split → normalize → train → evaluate → export

use burn::module::AutodiffModule;
use burn::tensor::backend::{AutodiffBackend, Backend};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::data::dataset::{TabularDataset, Targets};
use crate::data::split::Splitter;
use crate::data::table::RecordTable;
use crate::export::exporter::ModelExporter;
use crate::export::metadata::ModelMetadata;
use crate::features::extractor::{
    FeatureExtractor, FeatureSpec, RawLabels, DOCUMENT_CLASSIFIER_FEATURES,
    SCORE_PREDICTOR_FEATURES,
};
use crate::features::labels::LabelEncoder;
use crate::features::normalize::{NormalizationParams, Normalizer};
use crate::model::mlp::{MlpConfig, MlpModel};
use crate::training::evaluator::{EvaluationReport, Evaluator};
use crate::training::metrics::TrainingHistory;
use crate::training::progress::ProgressObserver;
use crate::training::trainer::Trainer;
use crate::{Config, PipelineError, Result, Task};

/// One trainable pipeline instance: its columns and its artifact names
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    pub name: String,
    pub features: FeatureSpec,
    pub model_file: String,
    pub metadata_file: String,
}

impl PipelineSpec {
    /// Document type classifier over document-level statistics
    pub fn document_classifier() -> Self {
        PipelineSpec {
            name: "document_classifier".to_string(),
            features: FeatureSpec::new(&DOCUMENT_CLASSIFIER_FEATURES, "label", Task::Classification),
            model_file: "document_classifier.mpk".to_string(),
            metadata_file: "model_metadata.json".to_string(),
        }
    }

    /// Structural score regressor over cell-level statistics
    pub fn score_predictor() -> Self {
        PipelineSpec {
            name: "score_predictor".to_string(),
            features: FeatureSpec::new(&SCORE_PREDICTOR_FEATURES, "score", Task::Regression),
            model_file: "score_predictor.mpk".to_string(),
            metadata_file: "score_predictor_metadata.json".to_string(),
        }
    }

    pub fn task(&self) -> Task {
        self.features.task
    }
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub name: String,
    pub task: Task,
    pub train_samples: usize,
    pub val_samples: usize,
    pub test_samples: usize,
    pub history: TrainingHistory,
    pub best_epoch: Option<usize>,
    pub evaluation: EvaluationReport,
    pub metadata: ModelMetadata,
    pub model_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Train, evaluate and export one pipeline into `config.output.dir`.
///
/// Column checks run before anything else, so a schema error never leaves
/// events, files or partial state behind.
pub fn run_pipeline<B: AutodiffBackend>(
    spec: &PipelineSpec,
    table: &RecordTable,
    config: &Config,
    device: &B::Device,
    observer: &mut dyn ProgressObserver,
) -> Result<PipelineReport>
where
    <B::InnerBackend as Backend>::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
    <B::InnerBackend as Backend>::IntElem: serde::Serialize + serde::de::DeserializeOwned,
{
    config.validate()?;
    let task = spec.task();
    let extractor = FeatureExtractor::new(spec.features.clone());
    extractor.check_schema(table)?;

    log::info!("Running {} pipeline on {} rows", spec.name, table.len());
    let extracted = extractor.extract(table)?;
    extracted.labels.log_summary();

    let (targets, label_mapping) = encode_labels(&extracted.labels)?;
    let dataset = TabularDataset::new(extracted.features, targets)?;

    let assignment = Splitter::new(&config.split, config.training.seed).split(&dataset.targets)?;
    let splits = assignment.apply(&dataset);
    log::info!(
        "Train: {}, Val: {}, Test: {}",
        splits.train.features.n_rows(),
        splits.validation.features.n_rows(),
        splits.test.features.n_rows()
    );

    let normalization = Normalizer::new(
        config.normalization.zero_variance,
        extracted.feature_names.clone(),
    )
    .fit(&splits.train.features)?;
    let train = standardize(&splits.train, &normalization)?;
    let validation = standardize(&splits.validation, &normalization)?;
    let test = standardize(&splits.test, &normalization)?;

    let input_dim = spec.features.input_dim();
    let architecture = match &label_mapping {
        Some(mapping) => MlpConfig::document_classifier(input_dim, mapping.len()),
        None => MlpConfig::score_predictor(input_dim),
    };

    let model = MlpModel::<B>::new(device, &architecture, config.training.seed);
    let mut trainer = Trainer::new(
        model,
        config.training.clone(),
        task,
        architecture.output_dim,
        device.clone(),
    );
    let outcome = trainer.train(&train, &validation, observer)?;
    let best_epoch = outcome.checkpoint.as_ref().map(|c| c.epoch);

    let final_model = outcome.model.valid();
    let evaluation = Evaluator::new(label_mapping.as_ref()).evaluate(&final_model, &test, device)?;
    evaluation.log();

    let metadata = match label_mapping {
        Some(mapping) => ModelMetadata::classifier(
            extracted.feature_names,
            mapping,
            &normalization,
            evaluation.headline(),
            architecture,
        ),
        None => ModelMetadata::regressor(
            extracted.feature_names,
            &normalization,
            evaluation.headline(),
            architecture,
        ),
    };

    let bundle = ModelExporter::new(&config.output.dir, &spec.model_file, &spec.metadata_file)
        .export(&final_model, metadata, device)?;

    Ok(PipelineReport {
        name: spec.name.clone(),
        task,
        train_samples: train.features.n_rows(),
        val_samples: validation.features.n_rows(),
        test_samples: test.features.n_rows(),
        history: outcome.history,
        best_epoch,
        evaluation,
        metadata: bundle.metadata,
        model_path: bundle.model_path,
        metadata_path: bundle.metadata_path,
    })
}

/// Dense codes for class names, or the scores as-is
fn encode_labels(labels: &RawLabels) -> Result<(Targets, Option<BTreeMap<usize, String>>)> {
    match labels {
        RawLabels::Classes(names) => {
            let encoder = LabelEncoder::fit(names);
            if encoder.num_classes() < 2 {
                return Err(PipelineError::InsufficientData(format!(
                    "need at least two classes, found {}",
                    encoder.num_classes()
                )));
            }
            let codes = encoder.encode(names)?;
            Ok((Targets::Classes(codes), Some(encoder.mapping())))
        }
        RawLabels::Scores(scores) => {
            let outside = scores
                .iter()
                .filter(|s| s.is_finite() && !(0.0..=1.0).contains(*s))
                .count();
            if outside > 0 {
                log::warn!("{} score(s) fall outside [0, 1]", outside);
            }
            Ok((Targets::Scores(scores.clone()), None))
        }
    }
}

fn standardize(dataset: &TabularDataset, params: &NormalizationParams) -> Result<TabularDataset> {
    TabularDataset::new(params.transform(&dataset.features)?, dataset.targets.clone())
}
