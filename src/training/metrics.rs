//! Training metrics and evaluation helpers

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::fmt;

use crate::{PipelineError, Result, Task};

/// Copy a tensor to host memory as `f32`
pub fn to_host<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| PipelineError::Tensor(format!("{:?}", e)))
}

/// Index of the largest value in each row; NaN never wins
pub fn argmax_rows(values: &[f32], n_cols: usize) -> Vec<usize> {
    values
        .chunks_exact(n_cols.max(1))
        .map(|row| {
            let mut best = 0;
            for (i, &v) in row.iter().enumerate() {
                if v > row[best] || row[best].is_nan() {
                    best = i;
                }
            }
            best
        })
        .collect()
}

/// Fraction of rows whose arg-max matches the target code.
/// NaN if any score is non-finite, since the ranking is then meaningless.
pub fn accuracy(scores: &[f32], n_cols: usize, targets: &[usize]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    if scores.iter().any(|v| !v.is_finite()) {
        return f64::NAN;
    }
    let correct = argmax_rows(scores, n_cols)
        .iter()
        .zip(targets)
        .filter(|(p, t)| p == t)
        .count();
    correct as f64 / targets.len() as f64
}

pub fn mean_absolute_error(predictions: &[f32], targets: &[f32]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (*p as f64 - *t as f64).abs())
        .sum::<f64>()
        / targets.len() as f64
}

pub fn mean_squared_error(predictions: &[f32], targets: &[f32]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (*p as f64 - *t as f64).powi(2))
        .sum::<f64>()
        / targets.len() as f64
}

/// Metrics recorded for one epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    /// Zero-based epoch index
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    /// Validation accuracy (classification only)
    pub val_accuracy: Option<f64>,
    /// Validation MAE (regression only)
    pub val_mae: Option<f64>,
}

impl EpochMetrics {
    /// The value that decides checkpoint retention
    pub fn monitored(&self, task: Task) -> f64 {
        match task {
            Task::Classification => self.val_accuracy.unwrap_or(f64::NAN),
            Task::Regression => self.val_loss,
        }
    }
}

impl fmt::Display for EpochMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Loss: {:.4}, Val Loss: {:.4}", self.train_loss, self.val_loss)?;
        if let Some(acc) = self.val_accuracy {
            write!(f, ", Val Acc: {:.4}", acc)?;
        }
        if let Some(mae) = self.val_mae {
            write!(f, ", Val MAE: {:.4}", mae)?;
        }
        Ok(())
    }
}

/// Training history for tracking progress
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
    /// (epoch, metric) each time the checkpoint was replaced
    pub improvements: Vec<(usize, f64)>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_epoch(&mut self, metrics: EpochMetrics) {
        self.epochs.push(metrics);
    }

    pub fn record_improvement(&mut self, epoch: usize, metric: f64) {
        self.improvements.push((epoch, metric));
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    /// Epoch of the retained checkpoint, if any
    pub fn best_epoch(&self) -> Option<usize> {
        self.improvements.last().map(|(e, _)| *e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_rows() {
        let scores = [0.1, 0.7, 0.2, 0.5, 0.4, 0.1];
        assert_eq!(argmax_rows(&scores, 3), vec![1, 0]);
    }

    #[test]
    fn test_accuracy() {
        let scores = [0.9, 0.1, 0.2, 0.8, 0.6, 0.4];
        assert!((accuracy(&scores, 2, &[0, 1, 1]) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(accuracy(&[], 2, &[]), 0.0);
        assert!(accuracy(&[f32::NAN, 0.1], 2, &[0]).is_nan());
    }

    #[test]
    fn test_regression_errors() {
        let p = [0.5, 0.25, 1.0];
        let t = [0.5, 0.75, 0.0];
        assert!((mean_absolute_error(&p, &t) - 0.5).abs() < 1e-12);
        assert!((mean_squared_error(&p, &t) - (0.25 + 1.0) / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_monitored_metric_by_task() {
        let m = EpochMetrics {
            epoch: 0,
            train_loss: 0.9,
            val_loss: 0.4,
            val_accuracy: Some(0.75),
            val_mae: None,
        };
        assert_eq!(m.monitored(Task::Classification), 0.75);
        assert_eq!(m.monitored(Task::Regression), 0.4);
    }
}
