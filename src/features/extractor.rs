//! Column selection into a fixed-order feature matrix

use crate::data::dataset::FeatureMatrix;
use crate::data::table::RecordTable;
use crate::{PipelineError, Result, Task};

/// Document-level statistics used by the document type classifier
pub const DOCUMENT_CLASSIFIER_FEATURES: [&str; 6] = [
    "headers_ratio",
    "lists_ratio",
    "paragraphs_ratio",
    "avg_length",
    "avg_importance",
    "log_cell_count",
];

/// Cell-level statistics used by the structural score predictor
pub const SCORE_PREDICTOR_FEATURES: [&str; 7] = [
    "importance",
    "resonance",
    "is_header",
    "length",
    "relative_font_size",
    "indent_level",
    "word_count",
];

/// Ordered feature columns plus the label column
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    pub feature_names: Vec<String>,
    pub label_column: String,
    pub task: Task,
}

impl FeatureSpec {
    pub fn new(feature_names: &[&str], label_column: &str, task: Task) -> Self {
        FeatureSpec {
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
            label_column: label_column.to_string(),
            task,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.feature_names.len()
    }
}

/// Labels as read from the table, before encoding
#[derive(Debug, Clone, PartialEq)]
pub enum RawLabels {
    Classes(Vec<String>),
    Scores(Vec<f32>),
}

impl RawLabels {
    pub fn len(&self) -> usize {
        match self {
            RawLabels::Classes(c) => c.len(),
            RawLabels::Scores(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Log the class distribution or the score summary
    pub fn log_summary(&self) {
        match self {
            RawLabels::Classes(classes) => {
                let mut counts = std::collections::BTreeMap::<&str, usize>::new();
                for c in classes {
                    *counts.entry(c.as_str()).or_default() += 1;
                }
                log::info!("Label distribution:");
                for (class, count) in counts {
                    log::info!("  {}: {}", class, count);
                }
            }
            RawLabels::Scores(scores) => {
                let finite: Vec<f64> = scores
                    .iter()
                    .filter(|s| s.is_finite())
                    .map(|&s| s as f64)
                    .collect();
                if finite.is_empty() {
                    log::warn!("No finite score values");
                    return;
                }
                let n = finite.len() as f64;
                let mean = finite.iter().sum::<f64>() / n;
                let std = (finite.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n).sqrt();
                let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
                let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                log::info!(
                    "Score summary: count={}, mean={:.4}, std={:.4}, min={:.4}, max={:.4}",
                    finite.len(),
                    mean,
                    std,
                    min,
                    max
                );
                if min < 0.0 || max > 1.0 {
                    log::warn!("Scores outside [0, 1]: min={:.4}, max={:.4}", min, max);
                }
            }
        }
    }
}

/// Output of feature extraction
#[derive(Debug, Clone)]
pub struct ExtractedFeatures {
    pub features: FeatureMatrix,
    pub labels: RawLabels,
    /// Same order as the `FeatureSpec` columns
    pub feature_names: Vec<String>,
}

/// Pulls the configured columns out of a table
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    spec: FeatureSpec,
}

impl FeatureExtractor {
    pub fn new(spec: FeatureSpec) -> Self {
        FeatureExtractor { spec }
    }

    pub fn spec(&self) -> &FeatureSpec {
        &self.spec
    }

    /// Check that every required column exists
    pub fn check_schema(&self, table: &RecordTable) -> Result<()> {
        let missing: Vec<String> = self
            .spec
            .feature_names
            .iter()
            .chain(std::iter::once(&self.spec.label_column))
            .filter(|name| table.column_index(name).is_none())
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Schema { missing })
        }
    }

    /// Extract features and labels. Missing numeric values stay NaN.
    pub fn extract(&self, table: &RecordTable) -> Result<ExtractedFeatures> {
        self.check_schema(table)?;

        let columns: Vec<Vec<f32>> = self
            .spec
            .feature_names
            .iter()
            .filter_map(|name| table.column_index(name))
            .map(|idx| table.numeric_column(idx))
            .collect();

        let features = if table.is_empty() {
            FeatureMatrix::new(Vec::new(), self.spec.input_dim())?
        } else {
            FeatureMatrix::from_columns(&columns)?
        };

        let label_idx = table
            .column_index(&self.spec.label_column)
            .ok_or_else(|| PipelineError::Schema {
                missing: vec![self.spec.label_column.clone()],
            })?;

        let labels = match self.spec.task {
            Task::Classification => {
                let mut classes = Vec::with_capacity(table.len());
                for (row, value) in table.column(label_idx).enumerate() {
                    if value.is_empty() {
                        return Err(PipelineError::InvalidLabel {
                            row: row + 1,
                            value: value.to_string(),
                        });
                    }
                    classes.push(value.to_string());
                }
                RawLabels::Classes(classes)
            }
            Task::Regression => RawLabels::Scores(table.numeric_column(label_idx)),
        };

        Ok(ExtractedFeatures {
            features,
            labels,
            feature_names: self.spec.feature_names.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> RecordTable {
        RecordTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_extract_follows_spec_order_not_table_order() {
        let spec = FeatureSpec::new(&["b", "a"], "label", Task::Classification);
        let t = table("a,label,b\n1,x,2\n3,y,4\n");

        let out = FeatureExtractor::new(spec).extract(&t).unwrap();
        assert_eq!(out.feature_names, vec!["b", "a"]);
        assert_eq!(out.features.row(0), &[2.0, 1.0]);
        assert_eq!(out.features.row(1), &[4.0, 3.0]);
        assert_eq!(
            out.labels,
            RawLabels::Classes(vec!["x".to_string(), "y".to_string()])
        );
    }

    #[test]
    fn test_missing_columns_reported() {
        let spec = FeatureSpec::new(&DOCUMENT_CLASSIFIER_FEATURES, "label", Task::Classification);
        let t = table("headers_ratio,lists_ratio,label\n0.1,0.2,REPORT\n");

        match FeatureExtractor::new(spec).extract(&t) {
            Err(PipelineError::Schema { missing }) => {
                assert_eq!(
                    missing,
                    vec![
                        "paragraphs_ratio",
                        "avg_length",
                        "avg_importance",
                        "log_cell_count"
                    ]
                );
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_label_column() {
        let spec = FeatureSpec::new(&["a"], "score", Task::Regression);
        let t = table("a\n1\n");
        assert!(matches!(
            FeatureExtractor::new(spec).extract(&t),
            Err(PipelineError::Schema { .. })
        ));
    }

    #[test]
    fn test_nan_passes_through() {
        let spec = FeatureSpec::new(&["a"], "score", Task::Regression);
        let t = table("a,score\n,0.5\n2,\n");

        let out = FeatureExtractor::new(spec).extract(&t).unwrap();
        assert!(out.features.row(0)[0].is_nan());
        match out.labels {
            RawLabels::Scores(s) => {
                assert_eq!(s[0], 0.5);
                assert!(s[1].is_nan());
            }
            RawLabels::Classes(_) => panic!("expected scores"),
        }
    }

    #[test]
    fn test_empty_class_label_rejected() {
        let spec = FeatureSpec::new(&["a"], "label", Task::Classification);
        let t = table("a,label\n1,REPORT\n2,\n");
        assert!(matches!(
            FeatureExtractor::new(spec).extract(&t),
            Err(PipelineError::InvalidLabel { row: 2, .. })
        ));
    }
}
