//! Best-validation checkpoint slot
//!
//! Holds at most one snapshot. A candidate replaces it only when its metric
//! is strictly better than the best seen so far; NaN never qualifies, so a run
//! that goes non-finite keeps the last finite best.

use crate::Task;

/// Direction in which the monitored metric improves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Higher is better (accuracy), baseline 0.0
    Maximize,
    /// Lower is better (loss), baseline +inf
    Minimize,
}

impl Objective {
    pub fn for_task(task: Task) -> Self {
        match task {
            Task::Classification => Objective::Maximize,
            Task::Regression => Objective::Minimize,
        }
    }

    /// Metric value an epoch has to beat before any checkpoint exists
    pub fn baseline(&self) -> f64 {
        match self {
            Objective::Maximize => 0.0,
            Objective::Minimize => f64::INFINITY,
        }
    }

    pub fn improves(&self, candidate: f64, best: f64) -> bool {
        match self {
            Objective::Maximize => candidate > best,
            Objective::Minimize => candidate < best,
        }
    }
}

/// Model snapshot plus the validation metric that justified keeping it
#[derive(Debug, Clone)]
pub struct Checkpoint<M> {
    pub model: M,
    pub epoch: usize,
    pub metric: f64,
}

/// Single-slot store for the best checkpoint of one training run
#[derive(Debug)]
pub struct CheckpointSlot<M> {
    objective: Objective,
    best_metric: f64,
    checkpoint: Option<Checkpoint<M>>,
}

impl<M> CheckpointSlot<M> {
    pub fn new(objective: Objective) -> Self {
        CheckpointSlot {
            objective,
            best_metric: objective.baseline(),
            checkpoint: None,
        }
    }

    /// Replace the checkpoint if `metric` strictly improves on the best.
    /// `snapshot` is only called when the checkpoint is replaced.
    pub fn offer(&mut self, epoch: usize, metric: f64, snapshot: impl FnOnce() -> M) -> bool {
        if !self.objective.improves(metric, self.best_metric) {
            return false;
        }
        self.best_metric = metric;
        self.checkpoint = Some(Checkpoint {
            model: snapshot(),
            epoch,
            metric,
        });
        true
    }

    pub fn best_metric(&self) -> f64 {
        self.best_metric
    }

    pub fn checkpoint(&self) -> Option<&Checkpoint<M>> {
        self.checkpoint.as_ref()
    }

    pub fn into_checkpoint(self) -> Option<Checkpoint<M>> {
        self.checkpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_slot_keeps_strict_improvements_only() {
        let mut slot = CheckpointSlot::new(Objective::Maximize);
        let metrics = [0.0, 0.4, 0.4, 0.3, 0.6, f64::NAN, 0.5, 0.6, 0.7];
        let mut accepted = Vec::new();
        for (epoch, &m) in metrics.iter().enumerate() {
            if slot.offer(epoch, m, || epoch) {
                accepted.push(m);
            }
        }

        assert_eq!(accepted, vec![0.4, 0.6, 0.7]);
        let cp = slot.checkpoint().unwrap();
        assert_eq!(cp.model, 8);
        assert_eq!(cp.metric, 0.7);
        assert!(accepted.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_loss_slot_is_non_increasing() {
        let mut slot = CheckpointSlot::new(Objective::Minimize);
        let metrics = [0.9, 0.8, 0.85, 0.5, 0.5, 0.2];
        let mut accepted = Vec::new();
        for (epoch, &m) in metrics.iter().enumerate() {
            if slot.offer(epoch, m, || epoch) {
                accepted.push(m);
            }
        }
        assert_eq!(accepted, vec![0.9, 0.8, 0.5, 0.2]);
        assert_eq!(slot.checkpoint().unwrap().epoch, 5);
    }

    #[test]
    fn test_nan_freezes_checkpoint() {
        let mut slot = CheckpointSlot::new(Objective::Minimize);
        assert!(slot.offer(0, 0.3, || "first"));
        assert!(!slot.offer(1, f64::NAN, || "nan"));
        assert!(!slot.offer(2, f64::NAN, || "nan"));
        assert_eq!(slot.checkpoint().unwrap().model, "first");
        assert_eq!(slot.best_metric(), 0.3);
    }

    #[test]
    fn test_no_improvement_over_baseline() {
        let mut slot: CheckpointSlot<()> = CheckpointSlot::new(Objective::Maximize);
        assert!(!slot.offer(0, 0.0, || ()));
        assert!(slot.into_checkpoint().is_none());
    }

    #[test]
    fn test_snapshot_only_taken_on_improvement() {
        let mut slot = CheckpointSlot::new(Objective::Maximize);
        let mut calls = 0;
        slot.offer(0, 0.5, || {
            calls += 1;
        });
        slot.offer(1, 0.2, || {
            calls += 1;
        });
        assert_eq!(calls, 1);
    }
}
