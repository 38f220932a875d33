//! Burn Dataset implementation for tabular feature data
//!
//! Provides full-batch tensors for training and evaluation.

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};

use crate::{PipelineError, Result, Task};

/// Row-major matrix of feature values with a fixed column count
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    values: Vec<f32>,
    n_features: usize,
}

impl FeatureMatrix {
    /// Wrap row-major values; the length must be a multiple of `n_features`
    pub fn new(values: Vec<f32>, n_features: usize) -> Result<Self> {
        if n_features == 0 || values.len() % n_features != 0 {
            return Err(PipelineError::InsufficientData(format!(
                "{} values cannot form rows of {} features",
                values.len(),
                n_features
            )));
        }
        Ok(FeatureMatrix { values, n_features })
    }

    /// Build from equally long columns
    pub fn from_columns(columns: &[Vec<f32>]) -> Result<Self> {
        let n_features = columns.len();
        let n_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        if columns.iter().any(|c| c.len() != n_rows) {
            return Err(PipelineError::InsufficientData(
                "feature columns have different lengths".to_string(),
            ));
        }

        let mut values = Vec::with_capacity(n_rows * n_features);
        for row in 0..n_rows {
            values.extend(columns.iter().map(|c| c[row]));
        }
        Self::new(values, n_features)
    }

    pub fn n_rows(&self) -> usize {
        self.values.len() / self.n_features
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn row(&self, index: usize) -> &[f32] {
        let start = index * self.n_features;
        &self.values[start..start + self.n_features]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.values.chunks_exact(self.n_features)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Copy the given rows, in order, into a new matrix
    pub fn select(&self, indices: &[usize]) -> Self {
        let mut values = Vec::with_capacity(indices.len() * self.n_features);
        for &i in indices {
            values.extend_from_slice(self.row(i));
        }
        FeatureMatrix {
            values,
            n_features: self.n_features,
        }
    }
}

/// Encoded training targets
#[derive(Debug, Clone, PartialEq)]
pub enum Targets {
    /// Dense class codes `0..C-1`
    Classes(Vec<usize>),
    /// Continuous scores
    Scores(Vec<f32>),
}

impl Targets {
    pub fn len(&self) -> usize {
        match self {
            Targets::Classes(c) => c.len(),
            Targets::Scores(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn task(&self) -> Task {
        match self {
            Targets::Classes(_) => Task::Classification,
            Targets::Scores(_) => Task::Regression,
        }
    }

    pub fn select(&self, indices: &[usize]) -> Self {
        match self {
            Targets::Classes(c) => Targets::Classes(indices.iter().map(|&i| c[i]).collect()),
            Targets::Scores(s) => Targets::Scores(indices.iter().map(|&i| s[i]).collect()),
        }
    }

    fn get(&self, index: usize) -> Option<SampleTarget> {
        match self {
            Targets::Classes(c) => c.get(index).map(|&c| SampleTarget::Class(c)),
            Targets::Scores(s) => s.get(index).map(|&s| SampleTarget::Score(s)),
        }
    }
}

/// Target of a single sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleTarget {
    Class(usize),
    Score(f32),
}

/// One row of features with its target
#[derive(Debug, Clone, PartialEq)]
pub struct TabularSample {
    pub features: Vec<f32>,
    pub target: SampleTarget,
}

/// Feature matrix paired with targets, one target per row
#[derive(Debug, Clone, PartialEq)]
pub struct TabularDataset {
    pub features: FeatureMatrix,
    pub targets: Targets,
}

impl TabularDataset {
    pub fn new(features: FeatureMatrix, targets: Targets) -> Result<Self> {
        if features.n_rows() != targets.len() {
            return Err(PipelineError::InsufficientData(format!(
                "{} feature rows but {} targets",
                features.n_rows(),
                targets.len()
            )));
        }
        Ok(TabularDataset { features, targets })
    }

    pub fn n_features(&self) -> usize {
        self.features.n_features()
    }

    /// Subset of rows, preserving the given order
    pub fn select(&self, indices: &[usize]) -> Self {
        TabularDataset {
            features: self.features.select(indices),
            targets: self.targets.select(indices),
        }
    }

    /// The whole dataset as a single batch
    pub fn full_batch<B: Backend>(&self, device: &B::Device) -> TabularBatch<B> {
        let batcher = TabularBatcher::<B>::new(device.clone());
        batcher.batch(self.iter().collect(), device)
    }
}

impl Dataset<TabularSample> for TabularDataset {
    fn get(&self, index: usize) -> Option<TabularSample> {
        if index >= self.features.n_rows() {
            return None;
        }
        Some(TabularSample {
            features: self.features.row(index).to_vec(),
            target: self.targets.get(index)?,
        })
    }

    fn len(&self) -> usize {
        self.features.n_rows()
    }
}

/// Targets of a batch, on device
#[derive(Debug, Clone)]
pub enum BatchTargets<B: Backend> {
    /// Class codes: [batch]
    Classes(Tensor<B, 1, Int>),
    /// Scores: [batch, 1]
    Scores(Tensor<B, 2>),
}

/// Batch of tabular samples
#[derive(Debug, Clone)]
pub struct TabularBatch<B: Backend> {
    /// Features: [batch, n_features]
    pub features: Tensor<B, 2>,
    pub targets: BatchTargets<B>,
}

/// Batcher for creating tabular batches
#[derive(Clone)]
pub struct TabularBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> TabularBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        TabularBatcher { device }
    }
}

impl<B: Backend> Batcher<B, TabularSample, TabularBatch<B>> for TabularBatcher<B> {
    fn batch(&self, items: Vec<TabularSample>, _device: &B::Device) -> TabularBatch<B> {
        let batch_size = items.len();
        let n_features = items.first().map(|s| s.features.len()).unwrap_or(0);

        let mut feature_data = Vec::with_capacity(batch_size * n_features);
        let mut class_data = Vec::with_capacity(batch_size);
        let mut score_data = Vec::with_capacity(batch_size);

        for sample in &items {
            feature_data.extend_from_slice(&sample.features);
            match sample.target {
                SampleTarget::Class(c) => class_data.push(c as i64),
                SampleTarget::Score(s) => score_data.push(s),
            }
        }

        let features = Tensor::<B, 1>::from_floats(feature_data.as_slice(), &self.device)
            .reshape([batch_size, n_features]);

        let targets = if score_data.is_empty() {
            BatchTargets::Classes(Tensor::<B, 1, Int>::from_ints(
                class_data.as_slice(),
                &self.device,
            ))
        } else {
            BatchTargets::Scores(
                Tensor::<B, 1>::from_floats(score_data.as_slice(), &self.device)
                    .reshape([batch_size, 1]),
            )
        };

        TabularBatch { features, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn sample_dataset() -> TabularDataset {
        let features = FeatureMatrix::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2).unwrap();
        TabularDataset::new(features, Targets::Classes(vec![0, 1, 2])).unwrap()
    }

    #[test]
    fn test_matrix_from_columns_is_row_major() {
        let m = FeatureMatrix::from_columns(&[vec![1.0, 2.0], vec![10.0, 20.0]]).unwrap();
        assert_eq!(m.n_rows(), 2);
        assert_eq!(m.row(0), &[1.0, 10.0]);
        assert_eq!(m.row(1), &[2.0, 20.0]);
    }

    #[test]
    fn test_select_preserves_order() {
        let ds = sample_dataset();
        let sub = ds.select(&[2, 0]);
        assert_eq!(sub.features.values(), &[5.0, 6.0, 1.0, 2.0]);
        assert_eq!(sub.targets, Targets::Classes(vec![2, 0]));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let features = FeatureMatrix::new(vec![1.0, 2.0], 2).unwrap();
        assert!(TabularDataset::new(features, Targets::Scores(vec![0.1, 0.2])).is_err());
    }

    #[test]
    fn test_full_batch_shapes() {
        let device = Default::default();
        let batch = sample_dataset().full_batch::<TestBackend>(&device);
        assert_eq!(batch.features.dims(), [3, 2]);
        match batch.targets {
            BatchTargets::Classes(t) => assert_eq!(t.dims(), [3]),
            BatchTargets::Scores(_) => panic!("expected class targets"),
        }

        let features = FeatureMatrix::new(vec![1.0, 2.0], 1).unwrap();
        let ds = TabularDataset::new(features, Targets::Scores(vec![0.25, 0.75])).unwrap();
        let batch = ds.full_batch::<TestBackend>(&device);
        match batch.targets {
            BatchTargets::Scores(t) => assert_eq!(t.dims(), [2, 1]),
            BatchTargets::Classes(_) => panic!("expected score targets"),
        }
    }
}
