//! Z-score standardization fitted on the training split
//!
//! The fitted mean/scale are exported as-is, so any consumer that applies
//! `(x - mean) / scale` with them reproduces the training transform.

use serde::{Deserialize, Serialize};

use crate::data::dataset::FeatureMatrix;
use crate::{PipelineError, Result, ZeroVariancePolicy};

/// Per-feature mean and scale, immutable once fitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl NormalizationParams {
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Standardize one row in place
    pub fn apply_row(&self, row: &mut [f32]) {
        for ((x, m), s) in row.iter_mut().zip(&self.mean).zip(&self.scale) {
            *x = ((*x as f64 - m) / s) as f32;
        }
    }

    /// Standardize a copy of the matrix
    pub fn transform(&self, matrix: &FeatureMatrix) -> Result<FeatureMatrix> {
        if matrix.n_features() != self.dim() {
            return Err(PipelineError::InsufficientData(format!(
                "matrix has {} features, normalizer was fitted on {}",
                matrix.n_features(),
                self.dim()
            )));
        }
        let mut out = matrix.clone();
        for row in out.values_mut().chunks_exact_mut(self.dim()) {
            self.apply_row(row);
        }
        Ok(out)
    }
}

/// Fits `NormalizationParams` from training rows
#[derive(Debug, Clone)]
pub struct Normalizer {
    policy: ZeroVariancePolicy,
    feature_names: Vec<String>,
}

impl Normalizer {
    pub fn new(policy: ZeroVariancePolicy, feature_names: Vec<String>) -> Self {
        Normalizer {
            policy,
            feature_names,
        }
    }

    /// Population mean and standard deviation per column.
    ///
    /// NaN and infinite cells are left out of a column's statistics; they stay
    /// non-finite after `transform`. A column with no finite value at all is
    /// treated as zero-variance with mean 0.
    pub fn fit(&self, train: &FeatureMatrix) -> Result<NormalizationParams> {
        if train.n_rows() == 0 {
            return Err(PipelineError::InsufficientData(
                "cannot fit normalization on an empty training split".to_string(),
            ));
        }

        let dim = train.n_features();
        let mut count = vec![0usize; dim];
        let mut sum = vec![0.0f64; dim];
        for row in train.rows() {
            for ((c, s), &x) in count.iter_mut().zip(sum.iter_mut()).zip(row) {
                if x.is_finite() {
                    *c += 1;
                    *s += x as f64;
                }
            }
        }
        let mean: Vec<f64> = sum
            .iter()
            .zip(&count)
            .map(|(s, &c)| if c == 0 { 0.0 } else { s / c as f64 })
            .collect();

        let mut sq = vec![0.0f64; dim];
        for row in train.rows() {
            for ((q, &x), m) in sq.iter_mut().zip(row).zip(&mean) {
                if x.is_finite() {
                    *q += (x as f64 - m).powi(2);
                }
            }
        }

        let skipped: usize = count.iter().map(|&c| train.n_rows() - c).sum();
        if skipped > 0 {
            log::warn!(
                "{} non-finite feature value(s) left out of normalization statistics",
                skipped
            );
        }

        let mut scale = Vec::with_capacity(dim);
        for (j, (q, &c)) in sq.iter().zip(&count).enumerate() {
            let std = if c == 0 { 0.0 } else { (q / c as f64).sqrt() };
            if std == 0.0 {
                let feature = self
                    .feature_names
                    .get(j)
                    .cloned()
                    .unwrap_or_else(|| format!("#{}", j));
                match self.policy {
                    ZeroVariancePolicy::Fail => {
                        return Err(PipelineError::DegenerateFeature { feature, index: j });
                    }
                    ZeroVariancePolicy::UnitScale => {
                        log::warn!("Feature '{}' has zero variance; using scale 1.0", feature);
                        scale.push(1.0);
                    }
                }
            } else {
                scale.push(std);
            }
        }

        log::debug!("Normalization: mean={:?}, scale={:?}", mean, scale);
        Ok(NormalizationParams { mean, scale })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    fn column_stats(m: &FeatureMatrix, j: usize) -> (f64, f64) {
        let vals: Vec<f64> = m.rows().map(|r| r[j] as f64).collect();
        let n = vals.len() as f64;
        let mean = vals.iter().sum::<f64>() / n;
        let var = vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    #[test]
    fn test_fit_population_stats() {
        let m = FeatureMatrix::new(vec![1.0, 10.0, 3.0, 30.0], 2).unwrap();
        let params = Normalizer::new(ZeroVariancePolicy::Fail, names(2)).fit(&m).unwrap();

        assert_eq!(params.mean, vec![2.0, 20.0]);
        assert_eq!(params.scale, vec![1.0, 10.0]);
    }

    #[test]
    fn test_transform_standardizes_train() {
        let m = FeatureMatrix::new(vec![1.0, 5.0, 2.0, 7.0, 4.0, 6.0, 9.0, 1.0], 2).unwrap();
        let params = Normalizer::new(ZeroVariancePolicy::Fail, names(2)).fit(&m).unwrap();
        let z = params.transform(&m).unwrap();

        for j in 0..2 {
            let (mean, std) = column_stats(&z, j);
            assert!(mean.abs() < 1e-6, "mean {}", mean);
            assert!((std - 1.0).abs() < 1e-6, "std {}", std);
        }

        // Reapplying the fitted map is just the affine map again, not a refit
        let zz = params.transform(&z).unwrap();
        for j in 0..2 {
            let (mean, std) = column_stats(&zz, j);
            let expected_mean = -params.mean[j] / params.scale[j];
            let expected_std = 1.0 / params.scale[j];
            assert!((mean - expected_mean).abs() < 1e-5);
            assert!((std - expected_std).abs() < 1e-5);
        }
    }

    #[test]
    fn test_zero_variance_unit_scale() {
        let m = FeatureMatrix::new(vec![3.0, 1.0, 3.0, 2.0], 2).unwrap();
        let params = Normalizer::new(ZeroVariancePolicy::UnitScale, names(2))
            .fit(&m)
            .unwrap();
        assert_eq!(params.scale[0], 1.0);

        let z = params.transform(&m).unwrap();
        assert_eq!(z.row(0)[0], 0.0);
        assert_eq!(z.row(1)[0], 0.0);
    }

    #[test]
    fn test_zero_variance_fail() {
        let m = FeatureMatrix::new(vec![3.0, 1.0, 3.0, 2.0], 2).unwrap();
        match Normalizer::new(ZeroVariancePolicy::Fail, names(2)).fit(&m) {
            Err(PipelineError::DegenerateFeature { feature, index }) => {
                assert_eq!(feature, "f0");
                assert_eq!(index, 0);
            }
            other => panic!("expected degenerate feature, got {:?}", other),
        }
    }

    #[test]
    fn test_fit_skips_missing_cells() {
        let m = FeatureMatrix::new(
            vec![1.0, f32::NAN, f32::NAN, f32::NAN, 3.0, 10.0, 5.0, 30.0],
            2,
        )
        .unwrap();
        let params = Normalizer::new(ZeroVariancePolicy::Fail, names(2)).fit(&m).unwrap();

        assert_eq!(params.mean, vec![3.0, 20.0]);
        let expected = (8.0f64 / 3.0).sqrt();
        assert!((params.scale[0] - expected).abs() < 1e-12);
        assert_eq!(params.scale[1], 10.0);

        let z = params.transform(&m).unwrap();
        assert!(z.row(1)[0].is_nan());
        assert_eq!(z.row(2)[1], -1.0);
    }

    #[test]
    fn test_all_missing_column_is_zero_variance() {
        let m = FeatureMatrix::new(vec![f32::NAN, 1.0, f32::NAN, 2.0], 2).unwrap();
        let params = Normalizer::new(ZeroVariancePolicy::UnitScale, names(2))
            .fit(&m)
            .unwrap();
        assert_eq!(params.mean[0], 0.0);
        assert_eq!(params.scale[0], 1.0);

        assert!(matches!(
            Normalizer::new(ZeroVariancePolicy::Fail, names(2)).fit(&m),
            Err(PipelineError::DegenerateFeature { index: 0, .. })
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        let m = FeatureMatrix::new(vec![1.0, 2.0], 1).unwrap();
        let params = Normalizer::new(ZeroVariancePolicy::Fail, names(1)).fit(&m).unwrap();
        let other = FeatureMatrix::new(vec![1.0, 2.0], 2).unwrap();
        assert!(params.transform(&other).is_err());
    }
}
