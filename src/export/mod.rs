//! Model export
//!
//! A trained model is exported as a weights file plus a JSON metadata record
//! describing its input transform and output semantics.

pub mod exporter;
pub mod metadata;

pub use exporter::{ExportBundle, ModelExporter};
pub use metadata::ModelMetadata;
