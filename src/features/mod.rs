//! Feature extraction and preprocessing
//!
//! Converts table rows into a fixed-order feature matrix, encodes class
//! labels, and standardizes features with training-split statistics.

pub mod extractor;
pub mod labels;
pub mod normalize;

pub use extractor::{ExtractedFeatures, FeatureExtractor, FeatureSpec, RawLabels};
pub use labels::LabelEncoder;
pub use normalize::{Normalizer, NormalizationParams};
