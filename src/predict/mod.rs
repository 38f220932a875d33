//! Prediction and inference
//!
//! Load exported models and generate predictions from raw feature rows.

pub mod inference;

pub use inference::{ExportedModel, Prediction};
