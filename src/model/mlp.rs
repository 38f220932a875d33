//! Feed-forward network shared by both pipelines
//!
//! Architecture: Input(d) → [Linear → ReLU → Dropout] × N → Linear(out)
//! with softmax (classifier) or sigmoid (score predictor) applied at inference.

use burn::module::{Module, Param};
use burn::nn::{Dropout, DropoutConfig, Linear};
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Recorder};
use burn::tensor::activation::{relu, sigmoid, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{PipelineError, Result};

/// Activation turning logits into the exported output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputActivation {
    /// Class probabilities over the last dimension
    Softmax,
    /// Scalar in [0, 1]
    Sigmoid,
}

/// One hidden layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HiddenLayer {
    pub width: usize,
    /// Dropout rate after the activation (0.0 disables it)
    pub dropout: f64,
}

/// Configuration for the MLP model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpConfig {
    pub input_dim: usize,
    pub hidden: Vec<HiddenLayer>,
    pub output_dim: usize,
    pub output_activation: OutputActivation,
}

impl MlpConfig {
    /// 64 → 32 → 16 hidden widths, dropout after the first two
    pub fn document_classifier(input_dim: usize, num_classes: usize) -> Self {
        MlpConfig {
            input_dim,
            hidden: vec![
                HiddenLayer { width: 64, dropout: 0.2 },
                HiddenLayer { width: 32, dropout: 0.2 },
                HiddenLayer { width: 16, dropout: 0.0 },
            ],
            output_dim: num_classes,
            output_activation: OutputActivation::Softmax,
        }
    }

    /// 32 → 16 hidden widths, dropout after the first
    pub fn score_predictor(input_dim: usize) -> Self {
        MlpConfig {
            input_dim,
            hidden: vec![
                HiddenLayer { width: 32, dropout: 0.2 },
                HiddenLayer { width: 16, dropout: 0.0 },
            ],
            output_dim: 1,
            output_activation: OutputActivation::Sigmoid,
        }
    }

    /// Same architecture with every dropout rate set to zero
    pub fn without_dropout(mut self) -> Self {
        for layer in &mut self.hidden {
            layer.dropout = 0.0;
        }
        self
    }
}

/// Linear layer initialized from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`
fn seeded_linear<B: Backend>(
    rng: &mut StdRng,
    device: &B::Device,
    in_dim: usize,
    out_dim: usize,
) -> Linear<B> {
    let bound = 1.0 / (in_dim as f32).sqrt();
    let weight: Vec<f32> = (0..in_dim * out_dim)
        .map(|_| rng.random_range(-bound..bound))
        .collect();
    let bias: Vec<f32> = (0..out_dim).map(|_| rng.random_range(-bound..bound)).collect();

    Linear {
        weight: Param::from_tensor(
            Tensor::<B, 1>::from_floats(weight.as_slice(), device).reshape([in_dim, out_dim]),
        ),
        bias: Some(Param::from_tensor(Tensor::<B, 1>::from_floats(
            bias.as_slice(),
            device,
        ))),
    }
}

/// A single hidden layer block: Linear → ReLU → Dropout
#[derive(Module, Debug)]
pub struct HiddenBlock<B: Backend> {
    linear: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> HiddenBlock<B> {
    fn new(rng: &mut StdRng, device: &B::Device, in_dim: usize, layer: &HiddenLayer) -> Self {
        HiddenBlock {
            linear: seeded_linear(rng, device, in_dim, layer.width),
            dropout: DropoutConfig::new(layer.dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(x);
        let x = relu(x);
        self.dropout.forward(x)
    }
}

/// Multi-Layer Perceptron producing raw logits
#[derive(Module, Debug)]
pub struct MlpModel<B: Backend> {
    hidden: Vec<HiddenBlock<B>>,
    output: Linear<B>,
}

impl<B: Backend> MlpModel<B> {
    /// Create a model whose initial weights depend only on `seed`
    pub fn new(device: &B::Device, config: &MlpConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut in_dim = config.input_dim;
        let mut hidden = Vec::with_capacity(config.hidden.len());
        for layer in &config.hidden {
            hidden.push(HiddenBlock::new(&mut rng, device, in_dim, layer));
            in_dim = layer.width;
        }

        MlpModel {
            hidden,
            output: seeded_linear(&mut rng, device, in_dim, config.output_dim),
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Standardized features [batch, input_dim]
    ///
    /// # Returns
    /// Logits [batch, output_dim]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden.iter().fold(x, |x, block| block.forward(x));
        self.output.forward(x)
    }

    /// Forward pass followed by the output activation
    pub fn infer(&self, x: Tensor<B, 2>, activation: OutputActivation) -> Tensor<B, 2> {
        let logits = self.forward(x);
        match activation {
            OutputActivation::Softmax => softmax(logits, 1),
            OutputActivation::Sigmoid => sigmoid(logits),
        }
    }

    /// Serialize weights to named MessagePack bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        NamedMpkBytesRecorder::<FullPrecisionSettings>::new()
            .record(self.clone().into_record(), ())
            .map_err(|e| PipelineError::Export(e.to_string()))
    }

    /// Rebuild a model from `config` and load weights from bytes
    pub fn from_bytes(device: &B::Device, bytes: Vec<u8>, config: &MlpConfig) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let record = NamedMpkBytesRecorder::<FullPrecisionSettings>::new()
            .load(bytes, device)
            .map_err(|e| PipelineError::Export(format!("cannot load model record: {}", e)))?;

        Ok(Self::new(device, config, 0).load_record(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    fn input(device: &<TestBackend as Backend>::Device, rows: usize, dim: usize) -> Tensor<TestBackend, 2> {
        let values: Vec<f32> = (0..rows * dim).map(|i| (i as f32 * 0.37).sin()).collect();
        Tensor::<TestBackend, 1>::from_floats(values.as_slice(), device).reshape([rows, dim])
    }

    #[test]
    fn test_classifier_shapes_and_probabilities() {
        let device = Default::default();
        let config = MlpConfig::document_classifier(6, 4);
        let model = MlpModel::<TestBackend>::new(&device, &config, 1);

        let probs = model.infer(input(&device, 5, 6), OutputActivation::Softmax);
        assert_eq!(probs.dims(), [5, 4]);

        let values = probs.into_data().to_vec::<f32>().unwrap();
        for row in values.chunks(4) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "row sums to {}", sum);
        }
    }

    #[test]
    fn test_score_predictor_output_in_unit_interval() {
        let device = Default::default();
        let config = MlpConfig::score_predictor(7);
        let model = MlpModel::<TestBackend>::new(&device, &config, 2);

        let out = model.infer(input(&device, 3, 7), OutputActivation::Sigmoid);
        assert_eq!(out.dims(), [3, 1]);
        for v in out.into_data().to_vec::<f32>().unwrap() {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_same_seed_same_weights() {
        let device = Default::default();
        let config = MlpConfig::score_predictor(7);
        let a = MlpModel::<TestBackend>::new(&device, &config, 9);
        let b = MlpModel::<TestBackend>::new(&device, &config, 9);
        let c = MlpModel::<TestBackend>::new(&device, &config, 10);

        let x = input(&device, 4, 7);
        let ya = a.forward(x.clone()).into_data();
        let yb = b.forward(x.clone()).into_data();
        let yc = c.forward(x).into_data();
        assert_eq!(ya, yb);
        assert_ne!(ya, yc);
    }

    #[test]
    fn test_bytes_round_trip() {
        let device = Default::default();
        let config = MlpConfig::document_classifier(6, 3);
        let model = MlpModel::<TestBackend>::new(&device, &config, 5);

        let bytes = model.to_bytes().unwrap();
        let restored = MlpModel::<TestBackend>::from_bytes(&device, bytes, &config).unwrap();

        let x = input(&device, 2, 6);
        let expected: TensorData = model.forward(x.clone()).into_data();
        let actual: TensorData = restored.forward(x).into_data();
        assert_eq!(expected, actual);
    }
}
