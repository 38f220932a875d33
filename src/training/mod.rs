//! Model training
//!
//! Training loop, checkpoint retention, evaluation and metrics tracking.

pub mod checkpoint;
pub mod evaluator;
pub mod metrics;
pub mod progress;
pub mod trainer;

pub use checkpoint::{Checkpoint, CheckpointSlot, Objective};
pub use evaluator::{EvaluationReport, Evaluator};
pub use metrics::{EpochMetrics, TrainingHistory};
pub use progress::{LogProgress, NoProgress, ProgressEvent, ProgressObserver};
pub use trainer::{Trainer, TrainerState, TrainingOutcome};
