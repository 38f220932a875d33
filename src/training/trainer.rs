//! Full-batch training loop with best-checkpoint retention

use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::tensor::activation::sigmoid;
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};

use crate::data::dataset::{BatchTargets, TabularBatch, TabularDataset, Targets};
use crate::model::mlp::MlpModel;
use crate::training::checkpoint::{Checkpoint, CheckpointSlot, Objective};
use crate::training::metrics::{
    accuracy, mean_absolute_error, to_host, EpochMetrics, TrainingHistory,
};
use crate::training::progress::{ProgressEvent, ProgressObserver};
use crate::{NonFinitePolicy, PipelineError, Result, Task, TrainingConfig};

/// Cross-entropy on logits for class codes, MSE on sigmoid outputs for scores
pub fn task_loss<B: Backend>(logits: Tensor<B, 2>, targets: &BatchTargets<B>) -> Tensor<B, 1> {
    match targets {
        BatchTargets::Classes(codes) => CrossEntropyLossConfig::new()
            .init(&logits.device())
            .forward(logits, codes.clone()),
        BatchTargets::Scores(scores) => (sigmoid(logits) - scores.clone())
            .powf_scalar(2.0)
            .mean(),
    }
}

/// Validation loss plus accuracy (classes) or MAE (scores), without gradients
pub fn validation_metrics<B: Backend>(
    model: &MlpModel<B>,
    batch: &TabularBatch<B>,
    targets: &Targets,
    output_dim: usize,
) -> Result<(f64, Option<f64>, Option<f64>)> {
    let logits = model.forward(batch.features.clone());
    let loss: f64 = task_loss(logits.clone(), &batch.targets)
        .into_scalar()
        .elem();

    match targets {
        Targets::Classes(codes) => {
            let scores = to_host(logits)?;
            Ok((loss, Some(accuracy(&scores, output_dim, codes)), None))
        }
        Targets::Scores(expected) => {
            let predicted = to_host(sigmoid(logits))?;
            Ok((loss, None, Some(mean_absolute_error(&predicted, expected))))
        }
    }
}

/// Lifecycle of a trainer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Initialized,
    Training { epoch: usize },
    Converged,
}

/// Result of a training run
pub struct TrainingOutcome<B: AutodiffBackend> {
    /// Best checkpoint's parameters, or the final ones if none was retained
    pub model: MlpModel<B>,
    pub checkpoint: Option<Checkpoint<MlpModel<B>>>,
    pub history: TrainingHistory,
}

impl<B: AutodiffBackend> TrainingOutcome<B> {
    pub fn best_metric(&self) -> Option<f64> {
        self.checkpoint.as_ref().map(|c| c.metric)
    }
}

/// Trainer for the MLP model
pub struct Trainer<B: AutodiffBackend> {
    model: MlpModel<B>,
    optimizer: OptimizerAdaptor<Adam, MlpModel<B>, B>,
    config: TrainingConfig,
    task: Task,
    output_dim: usize,
    device: B::Device,
    state: TrainerState,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create a new trainer
    pub fn new(
        model: MlpModel<B>,
        config: TrainingConfig,
        task: Task,
        output_dim: usize,
        device: B::Device,
    ) -> Self {
        let optimizer = AdamConfig::new().with_epsilon(1e-8).init();

        Trainer {
            model,
            optimizer,
            config,
            task,
            output_dim,
            device,
            state: TrainerState::Initialized,
        }
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    /// Get the current model
    pub fn model(&self) -> &MlpModel<B> {
        &self.model
    }

    /// Run exactly `config.epochs` full-batch epochs.
    ///
    /// Each epoch does one gradient step on the whole training split, then
    /// scores the whole validation split. On return the trainer's model is the
    /// best checkpoint, or the last state if no epoch ever improved.
    pub fn train(
        &mut self,
        train: &TabularDataset,
        val: &TabularDataset,
        observer: &mut dyn ProgressObserver,
    ) -> Result<TrainingOutcome<B>> {
        if self.state != TrainerState::Initialized {
            return Err(PipelineError::Config(
                "trainer has already run; create a new one per training run".to_string(),
            ));
        }
        if train.features.n_rows() == 0 || val.features.n_rows() == 0 {
            return Err(PipelineError::InsufficientData(
                "training and validation splits must be non-empty".to_string(),
            ));
        }

        B::seed(self.config.seed);

        let train_batch = train.full_batch::<B>(&self.device);
        let val_batch = val.full_batch::<B::InnerBackend>(&self.device);

        let epochs = self.config.epochs;
        let mut slot = CheckpointSlot::new(Objective::for_task(self.task));
        let mut history = TrainingHistory::new();

        observer.on_event(&ProgressEvent::Started {
            epochs,
            train_samples: train.features.n_rows(),
            val_samples: val.features.n_rows(),
        });

        for epoch in 0..epochs {
            self.state = TrainerState::Training { epoch };

            let logits = self.model.forward(train_batch.features.clone());
            let loss = task_loss(logits, &train_batch.targets);
            let train_loss: f64 = loss.clone().into_scalar().elem();

            if !train_loss.is_finite() && self.config.non_finite == NonFinitePolicy::Fail {
                return Err(PipelineError::NumericInstability {
                    epoch,
                    detail: format!("training loss is {}", train_loss),
                });
            }

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &self.model);
            self.model = self
                .optimizer
                .step(self.config.learning_rate, self.model.clone(), grads);

            let (val_loss, val_accuracy, val_mae) = validation_metrics(
                &self.model.valid(),
                &val_batch,
                &val.targets,
                self.output_dim,
            )?;

            let metrics = EpochMetrics {
                epoch,
                train_loss,
                val_loss,
                val_accuracy,
                val_mae,
            };
            let monitored = metrics.monitored(self.task);
            observer.on_event(&ProgressEvent::Epoch(metrics.clone()));
            history.record_epoch(metrics);

            if !monitored.is_finite() {
                if self.config.non_finite == NonFinitePolicy::Fail {
                    return Err(PipelineError::NumericInstability {
                        epoch,
                        detail: format!("validation metric is {}", monitored),
                    });
                }
                observer.on_event(&ProgressEvent::NonFiniteMetric { epoch });
            }

            let model = &self.model;
            if slot.offer(epoch, monitored, || model.clone()) {
                history.record_improvement(epoch, monitored);
                observer.on_event(&ProgressEvent::CheckpointImproved {
                    epoch,
                    metric: monitored,
                });
            }
        }

        self.state = TrainerState::Converged;

        let checkpoint = slot.into_checkpoint();
        if let Some(best) = &checkpoint {
            self.model = best.model.clone();
        }

        observer.on_event(&ProgressEvent::Finished {
            best_epoch: checkpoint.as_ref().map(|c| c.epoch),
            best_metric: checkpoint.as_ref().map(|c| c.metric),
        });

        Ok(TrainingOutcome {
            model: self.model.clone(),
            checkpoint,
            history,
        })
    }
}
