//! Data ingestion and partitioning
//!
//! CSV tables, burn datasets/batchers over feature matrices, and
//! deterministic train/validation/test splitting.

pub mod dataset;
pub mod split;
pub mod table;

pub use dataset::{FeatureMatrix, TabularBatch, TabularBatcher, TabularDataset, Targets};
pub use split::{Partition, SplitAssignment, Splitter};
pub use table::RecordTable;
