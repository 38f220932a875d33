//! Seeded train/validation/test splitting
//!
//! Two sequential carves: test from the whole set, then validation from the
//! remainder. Class-coded targets are stratified so every partition keeps the
//! global class proportions up to integer rounding.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::dataset::{TabularDataset, Targets};
use crate::{PipelineError, Result, SplitConfig};

/// Which partition a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    Train,
    Validation,
    Test,
}

/// Disjoint sample indices for each partition, each sorted ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitAssignment {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

impl SplitAssignment {
    /// Total number of assigned samples
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Partition containing a sample index
    pub fn partition_of(&self, index: usize) -> Option<Partition> {
        if self.train.binary_search(&index).is_ok() {
            Some(Partition::Train)
        } else if self.validation.binary_search(&index).is_ok() {
            Some(Partition::Validation)
        } else if self.test.binary_search(&index).is_ok() {
            Some(Partition::Test)
        } else {
            None
        }
    }

    /// Materialize the three partitions of a dataset
    pub fn apply(&self, dataset: &TabularDataset) -> SplitDatasets {
        SplitDatasets {
            train: dataset.select(&self.train),
            validation: dataset.select(&self.validation),
            test: dataset.select(&self.test),
        }
    }
}

/// The three partitions as datasets
#[derive(Debug, Clone)]
pub struct SplitDatasets {
    pub train: TabularDataset,
    pub validation: TabularDataset,
    pub test: TabularDataset,
}

/// Deterministic splitter
#[derive(Debug, Clone)]
pub struct Splitter {
    pub test_fraction: f64,
    pub val_fraction: f64,
    pub seed: u64,
}

impl Splitter {
    pub fn new(config: &SplitConfig, seed: u64) -> Self {
        Splitter {
            test_fraction: config.test_fraction,
            val_fraction: config.val_fraction,
            seed,
        }
    }

    /// Assign every sample to exactly one partition
    ///
    /// Class targets are stratified; score targets are shuffled uniformly.
    pub fn split(&self, targets: &Targets) -> Result<SplitAssignment> {
        let classes = match targets {
            Targets::Classes(c) => Some(c.as_slice()),
            Targets::Scores(_) => None,
        };

        let mut rng = StdRng::seed_from_u64(self.seed);
        let all: Vec<usize> = (0..targets.len()).collect();

        let (remainder, test) = carve(&all, classes, self.test_fraction, &mut rng)?;
        let (train, validation) = carve(&remainder, classes, self.val_fraction, &mut rng)?;

        log::debug!(
            "Split {} samples: train={}, val={}, test={}",
            targets.len(),
            train.len(),
            validation.len(),
            test.len()
        );

        Ok(SplitAssignment {
            train,
            validation,
            test,
        })
    }
}

/// Split `indices` into (kept, carved) with `ceil(n * fraction)` carved
fn carve(
    indices: &[usize],
    classes: Option<&[usize]>,
    fraction: f64,
    rng: &mut StdRng,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let n = indices.len();
    // tolerance keeps e.g. 50 * 0.2 from rounding up to 11
    let n_carve = (n as f64 * fraction - 1e-9).ceil() as usize;
    if n_carve == 0 || n_carve >= n {
        return Err(PipelineError::InsufficientData(format!(
            "cannot carve {:.0}% of {} samples into two non-empty parts",
            fraction * 100.0,
            n
        )));
    }

    let mut carved = match classes {
        None => {
            let mut shuffled = indices.to_vec();
            shuffled.shuffle(rng);
            shuffled.truncate(n_carve);
            shuffled
        }
        Some(classes) => stratified_carve(indices, classes, n_carve, rng),
    };
    carved.sort_unstable();

    let kept = indices
        .iter()
        .copied()
        .filter(|i| carved.binary_search(i).is_err())
        .collect();

    Ok((kept, carved))
}

/// Take `n_carve` indices so each class contributes its proportional share.
/// Leftover slots go to the largest fractional shares, ties to the lower code.
fn stratified_carve(
    indices: &[usize],
    classes: &[usize],
    n_carve: usize,
    rng: &mut StdRng,
) -> Vec<usize> {
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &i in indices {
        by_class.entry(classes[i]).or_default().push(i);
    }

    let n = indices.len();
    let mut quotas: Vec<(usize, usize, f64)> = by_class
        .iter()
        .map(|(&class, members)| {
            let exact = members.len() as f64 * n_carve as f64 / n as f64;
            (class, exact.floor() as usize, exact - exact.floor())
        })
        .collect();

    let assigned: usize = quotas.iter().map(|q| q.1).sum();
    let mut order: Vec<usize> = (0..quotas.len()).collect();
    order.sort_by(|&a, &b| quotas[b].2.total_cmp(&quotas[a].2).then(a.cmp(&b)));
    for &slot in order.iter().take(n_carve.saturating_sub(assigned)) {
        quotas[slot].1 += 1;
    }

    let mut carved = Vec::with_capacity(n_carve);
    for (class, quota, _) in quotas {
        if let Some(members) = by_class.get_mut(&class) {
            members.shuffle(rng);
            carved.extend(members.iter().take(quota).copied());
        }
    }
    carved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balanced_classes(n: usize, k: usize) -> Targets {
        Targets::Classes((0..n).map(|i| i % k).collect())
    }

    fn splitter(seed: u64) -> Splitter {
        Splitter::new(&SplitConfig::default(), seed)
    }

    fn class_count(indices: &[usize], classes: &[usize], class: usize) -> usize {
        indices.iter().filter(|&&i| classes[i] == class).count()
    }

    #[test]
    fn test_default_sizes() {
        let split = splitter(42).split(&Targets::Scores(vec![0.5; 50])).unwrap();
        assert_eq!(split.test.len(), 10);
        assert_eq!(split.validation.len(), 8);
        assert_eq!(split.train.len(), 32);
    }

    #[test]
    fn test_every_sample_in_exactly_one_partition() {
        let targets = balanced_classes(100, 3);
        let split = splitter(7).split(&targets).unwrap();

        assert_eq!(split.len(), 100);
        for i in 0..100 {
            let hits = [&split.train, &split.validation, &split.test]
                .iter()
                .filter(|p| p.contains(&i))
                .count();
            assert_eq!(hits, 1, "sample {} assigned {} times", i, hits);
            assert!(split.partition_of(i).is_some());
        }
    }

    #[test]
    fn test_same_seed_same_assignment() {
        let targets = balanced_classes(60, 4);
        let a = splitter(123).split(&targets).unwrap();
        let b = splitter(123).split(&targets).unwrap();
        assert_eq!(a, b);

        let c = splitter(124).split(&targets).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_stratification_within_one_sample() {
        let targets = balanced_classes(100, 3);
        let classes = match &targets {
            Targets::Classes(c) => c.clone(),
            Targets::Scores(_) => unreachable!(),
        };
        let split = splitter(42).split(&targets).unwrap();

        for part in [&split.train, &split.validation, &split.test] {
            for class in 0..3 {
                let global = class_count(&(0..100).collect::<Vec<_>>(), &classes, class);
                let expected = global as f64 * part.len() as f64 / 100.0;
                let actual = class_count(part, &classes, class) as f64;
                assert!(
                    (actual - expected).abs() <= 1.0,
                    "class {} expected {:.2} got {}",
                    class,
                    expected,
                    actual
                );
            }
        }
    }

    #[test]
    fn test_imbalanced_classes_keep_minority_in_every_split() {
        let mut codes = vec![0usize; 80];
        codes.extend(vec![1usize; 20]);
        let targets = Targets::Classes(codes.clone());
        let split = splitter(3).split(&targets).unwrap();

        assert_eq!(class_count(&split.test, &codes, 1), 4);
        assert_eq!(class_count(&split.validation, &codes, 1), 3);
        assert_eq!(class_count(&split.train, &codes, 1), 13);
    }

    #[test]
    fn test_too_few_samples() {
        let result = splitter(1).split(&Targets::Scores(vec![0.1, 0.2]));
        assert!(matches!(result, Err(PipelineError::InsufficientData(_))));
    }
}
