//! Held-out evaluation on the test split

use burn::tensor::backend::Backend;
use std::collections::BTreeMap;
use std::fmt;

use crate::data::dataset::{TabularDataset, Targets};
use crate::model::mlp::{MlpModel, OutputActivation};
use crate::training::metrics::{
    accuracy, argmax_rows, mean_absolute_error, mean_squared_error, to_host,
};
use crate::{PipelineError, Result};

/// Accuracy restricted to one class present in the test split
#[derive(Debug, Clone, PartialEq)]
pub struct ClassAccuracy {
    pub code: usize,
    pub name: String,
    pub correct: usize,
    pub support: usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub accuracy: f64,
    /// Ordered by class code; classes absent from the test split are omitted
    pub per_class: Vec<ClassAccuracy>,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressionReport {
    pub mse: f64,
    pub mae: f64,
    pub rmse: f64,
    pub samples: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationReport {
    Classification(ClassificationReport),
    Regression(RegressionReport),
}

impl EvaluationReport {
    /// Test accuracy or test MAE
    pub fn headline(&self) -> f64 {
        match self {
            EvaluationReport::Classification(r) => r.accuracy,
            EvaluationReport::Regression(r) => r.mae,
        }
    }

    pub fn log(&self) {
        match self {
            EvaluationReport::Classification(r) => {
                log::info!("Test accuracy: {:.4} ({} samples)", r.accuracy, r.samples);
                for class in &r.per_class {
                    log::info!(
                        "  {}: {:.4} ({}/{})",
                        class.name,
                        class.accuracy,
                        class.correct,
                        class.support
                    );
                }
            }
            EvaluationReport::Regression(r) => {
                log::info!("Test MSE: {:.4}", r.mse);
                log::info!("Test MAE: {:.4}", r.mae);
                log::info!("Test RMSE: {:.4}", r.rmse);
            }
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationReport::Classification(r) => {
                write!(f, "accuracy {:.4} over {} samples", r.accuracy, r.samples)
            }
            EvaluationReport::Regression(r) => write!(
                f,
                "MAE {:.4}, MSE {:.4}, RMSE {:.4} over {} samples",
                r.mae, r.mse, r.rmse, r.samples
            ),
        }
    }
}

/// Scores a finished model on data it has never seen
pub struct Evaluator<'a> {
    class_names: Option<&'a BTreeMap<usize, String>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(class_names: Option<&'a BTreeMap<usize, String>>) -> Self {
        Evaluator { class_names }
    }

    /// Per-class tallies under the same rule as `accuracy`: once any score is
    /// non-finite no prediction counts, and every class reports NaN.
    fn class_breakdown(&self, scores: &[f32], n_cols: usize, codes: &[usize]) -> Vec<ClassAccuracy> {
        let finite = scores.iter().all(|v| v.is_finite());
        let predicted = argmax_rows(scores, n_cols);

        let mut tally: BTreeMap<usize, (usize, usize)> = BTreeMap::new();
        for (p, t) in predicted.iter().zip(codes) {
            let entry = tally.entry(*t).or_insert((0, 0));
            entry.1 += 1;
            if finite && p == t {
                entry.0 += 1;
            }
        }

        tally
            .into_iter()
            .map(|(code, (correct, support))| ClassAccuracy {
                code,
                name: self
                    .class_names
                    .and_then(|m| m.get(&code).cloned())
                    .unwrap_or_else(|| code.to_string()),
                correct,
                support,
                accuracy: if finite {
                    correct as f64 / support as f64
                } else {
                    f64::NAN
                },
            })
            .collect()
    }

    pub fn evaluate<B: Backend>(
        &self,
        model: &MlpModel<B>,
        test: &TabularDataset,
        device: &B::Device,
    ) -> Result<EvaluationReport> {
        let samples = test.features.n_rows();
        if samples == 0 {
            return Err(PipelineError::InsufficientData(
                "test split is empty".to_string(),
            ));
        }

        let batch = test.full_batch::<B>(device);

        match &test.targets {
            Targets::Classes(codes) => {
                let logits = model.forward(batch.features);
                let n_cols = logits.dims()[1];
                let scores = to_host(logits)?;
                let per_class = self.class_breakdown(&scores, n_cols, codes);

                Ok(EvaluationReport::Classification(ClassificationReport {
                    accuracy: accuracy(&scores, n_cols, codes),
                    per_class,
                    samples,
                }))
            }
            Targets::Scores(expected) => {
                let predicted = to_host(model.infer(batch.features, OutputActivation::Sigmoid))?;
                let mse = mean_squared_error(&predicted, expected);
                Ok(EvaluationReport::Regression(RegressionReport {
                    mse,
                    mae: mean_absolute_error(&predicted, expected),
                    rmse: mse.sqrt(),
                    samples,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::FeatureMatrix;
    use crate::model::mlp::MlpConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_per_class_breakdown_covers_present_classes_only() {
        let device = Default::default();
        let model = MlpModel::<TestBackend>::new(&device, &MlpConfig::document_classifier(2, 4), 3);
        let test = TabularDataset::new(
            FeatureMatrix::new(vec![0.1, 0.2, -0.3, 0.4, 1.0, -1.0, 0.0, 0.5], 2).unwrap(),
            Targets::Classes(vec![0, 2, 2, 0]),
        )
        .unwrap();

        let names: BTreeMap<usize, String> = [(0, "A"), (1, "B"), (2, "C"), (3, "D")]
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect();
        let report = Evaluator::new(Some(&names))
            .evaluate(&model, &test, &device)
            .unwrap();

        let EvaluationReport::Classification(r) = report else {
            panic!("expected classification report");
        };
        assert_eq!(r.samples, 4);
        let codes: Vec<usize> = r.per_class.iter().map(|c| c.code).collect();
        assert_eq!(codes, vec![0, 2]);
        assert_eq!(r.per_class[1].name, "C");
        assert!(r.per_class.iter().all(|c| c.support == 2));

        let correct: usize = r.per_class.iter().map(|c| c.correct).sum();
        assert!((r.accuracy - correct as f64 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_scores_void_every_class() {
        let scores = [2.0, 0.0, f32::NAN, 1.0, 0.0, 3.0, 5.0, 1.0];
        let codes = [0, 1, 1, 0];

        let evaluator = Evaluator::new(None);
        let per_class = evaluator.class_breakdown(&scores, 2, &codes);
        assert!(accuracy(&scores, 2, &codes).is_nan());
        assert_eq!(per_class.len(), 2);
        for class in &per_class {
            assert!(class.accuracy.is_nan(), "class {} accuracy {}", class.code, class.accuracy);
            assert_eq!(class.correct, 0);
            assert_eq!(class.support, 2);
        }

        // Same scores with the NaN replaced: both rules count normally again
        let mut clean = scores;
        clean[2] = 0.5;
        let per_class = evaluator.class_breakdown(&clean, 2, &codes);
        assert_eq!(accuracy(&clean, 2, &codes), 1.0);
        assert!(per_class.iter().all(|c| c.accuracy == 1.0 && c.correct == 2));
    }

    #[test]
    fn test_regression_metrics_are_consistent() {
        let device = Default::default();
        let model = MlpModel::<TestBackend>::new(&device, &MlpConfig::score_predictor(3), 8);
        let test = TabularDataset::new(
            FeatureMatrix::new((0..15).map(|i| i as f32 * 0.1).collect(), 3).unwrap(),
            Targets::Scores(vec![0.2, 0.4, 0.6, 0.8, 1.0]),
        )
        .unwrap();

        let report = Evaluator::new(None).evaluate(&model, &test, &device).unwrap();
        let EvaluationReport::Regression(r) = &report else {
            panic!("expected regression report");
        };
        assert!((r.rmse - r.mse.sqrt()).abs() < 1e-12);
        assert!(r.mae <= r.rmse + 1e-12);
        assert_eq!(report.headline(), r.mae);
    }

    #[test]
    fn test_empty_test_split_rejected() {
        let device = Default::default();
        let model = MlpModel::<TestBackend>::new(&device, &MlpConfig::score_predictor(2), 1);
        let test = TabularDataset::new(
            FeatureMatrix::new(Vec::new(), 2).unwrap(),
            Targets::Scores(Vec::new()),
        )
        .unwrap();
        assert!(matches!(
            Evaluator::new(None).evaluate(&model, &test, &device),
            Err(PipelineError::InsufficientData(_))
        ));
    }
}
