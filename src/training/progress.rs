//! Training progress events
//!
//! The trainer reports what happens through a `ProgressObserver`; whether
//! anything is printed is up to the observer.

use super::metrics::EpochMetrics;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started {
        epochs: usize,
        train_samples: usize,
        val_samples: usize,
    },
    Epoch(EpochMetrics),
    CheckpointImproved {
        epoch: usize,
        metric: f64,
    },
    NonFiniteMetric {
        epoch: usize,
    },
    Finished {
        best_epoch: Option<usize>,
        best_metric: Option<f64>,
    },
}

pub trait ProgressObserver {
    fn on_event(&mut self, event: &ProgressEvent);
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_event(&mut self, _event: &ProgressEvent) {}
}

/// Collects events in order
impl ProgressObserver for Vec<ProgressEvent> {
    fn on_event(&mut self, event: &ProgressEvent) {
        self.push(event.clone());
    }
}

/// Logs every `interval` epochs and the final epoch
#[derive(Debug, Clone)]
pub struct LogProgress {
    interval: usize,
    total_epochs: usize,
}

impl LogProgress {
    pub fn new(interval: usize) -> Self {
        LogProgress {
            interval: interval.max(1),
            total_epochs: 0,
        }
    }
}

impl ProgressObserver for LogProgress {
    fn on_event(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started {
                epochs,
                train_samples,
                val_samples,
            } => {
                self.total_epochs = *epochs;
                log::info!(
                    "Starting training for {} epochs (train={}, val={})",
                    epochs,
                    train_samples,
                    val_samples
                );
            }
            ProgressEvent::Epoch(metrics) => {
                let n = metrics.epoch + 1;
                if n % self.interval == 0 || n == self.total_epochs {
                    log::info!("Epoch {}/{} - {}", n, self.total_epochs, metrics);
                }
            }
            ProgressEvent::CheckpointImproved { epoch, metric } => {
                log::debug!("  New best model at epoch {} ({:.4})", epoch + 1, metric);
            }
            ProgressEvent::NonFiniteMetric { epoch } => {
                log::warn!(
                    "Non-finite validation metric at epoch {}; checkpoint unchanged",
                    epoch + 1
                );
            }
            ProgressEvent::Finished {
                best_epoch,
                best_metric,
            } => match (best_epoch, best_metric) {
                (Some(epoch), Some(metric)) => {
                    log::info!("Training complete - best epoch {} ({:.4})", epoch + 1, metric)
                }
                _ => log::warn!("Training complete - no epoch improved; keeping final parameters"),
            },
        }
    }
}
