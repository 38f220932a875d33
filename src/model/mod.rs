//! Neural network architecture
//!
//! Shallow MLPs with fixed layer widths for both pipeline instances.

pub mod mlp;

pub use mlp::{HiddenLayer, MlpConfig, MlpModel, OutputActivation};
