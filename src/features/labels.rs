//! Class name <-> dense code mapping

use std::collections::BTreeMap;

use crate::{PipelineError, Result};

/// Bijection between class names and codes `0..C-1`, ordered by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Learn the sorted set of distinct class names
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut classes: Vec<String> = labels.iter().map(|l| l.as_ref().to_string()).collect();
        classes.sort();
        classes.dedup();
        LabelEncoder { classes }
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn code_of(&self, label: &str) -> Option<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .ok()
    }

    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(|s| s.as_str())
    }

    /// Encode labels; an unseen class is an error
    pub fn encode<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>> {
        labels
            .iter()
            .enumerate()
            .map(|(row, l)| {
                self.code_of(l.as_ref())
                    .ok_or_else(|| PipelineError::InvalidLabel {
                        row: row + 1,
                        value: l.as_ref().to_string(),
                    })
            })
            .collect()
    }

    /// Code -> class name
    pub fn mapping(&self) -> BTreeMap<usize, String> {
        self.classes.iter().cloned().enumerate().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_lexicographic_and_contiguous() {
        let enc = LabelEncoder::fit(&["REPORT", "CONTRACT", "MANUAL", "CONTRACT"]);
        assert_eq!(enc.num_classes(), 3);
        assert_eq!(enc.classes(), &["CONTRACT", "MANUAL", "REPORT"]);

        let mapping = enc.mapping();
        assert_eq!(mapping.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(mapping[&2], "REPORT");
    }

    #[test]
    fn test_encode_decode() {
        let enc = LabelEncoder::fit(&["b", "a", "c"]);
        let codes = enc.encode(&["c", "a", "b", "a"]).unwrap();
        assert_eq!(codes, vec![2, 0, 1, 0]);
        assert_eq!(enc.decode(1), Some("b"));
        assert_eq!(enc.decode(3), None);
    }

    #[test]
    fn test_unknown_label() {
        let enc = LabelEncoder::fit(&["a"]);
        assert!(matches!(
            enc.encode(&["a", "z"]),
            Err(PipelineError::InvalidLabel { row: 2, .. })
        ));
    }
}
