//! Seeded train/test splitting and k-fold index generation.
//!
//! All functions work on row indices so the same split can be applied to a
//! [`FeatureTable`], a design matrix or a label vector.

use crate::dataset::error::DatasetError;
use crate::dataset::table::FeatureTable;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Default fraction of rows held out for testing.
pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// Default random seed for reproducible splits.
pub const DEFAULT_SEED: u64 = 42;

/// Row indices of a train/test (or train/validation) partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitIndices {
    /// Rows used for fitting.
    pub train: Vec<usize>,
    /// Held-out rows.
    pub test: Vec<usize>,
}

fn validate_test_size(n_samples: usize, test_size: f64) -> Result<(), DatasetError> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(DatasetError::InvalidSplit(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }
    if n_samples < 2 {
        return Err(DatasetError::InvalidSplit(format!(
            "need at least 2 samples to split, got {}",
            n_samples
        )));
    }
    Ok(())
}

/// Shuffle `0..n_samples` and split off `ceil(n_samples * test_size)` test rows.
///
/// With `stratify = Some(labels)` the same number of test rows is shared among
/// the classes in proportion to their size, so both partitions follow the
/// input class proportions. Both partitions are non-empty.
pub fn train_test_split(
    n_samples: usize,
    test_size: f64,
    seed: u64,
    stratify: Option<&[usize]>,
) -> Result<SplitIndices, DatasetError> {
    validate_test_size(n_samples, test_size)?;
    let mut rng = StdRng::seed_from_u64(seed);

    match stratify {
        None => {
            let mut indices: Vec<usize> = (0..n_samples).collect();
            indices.shuffle(&mut rng);
            let train = indices.split_off(test_count(n_samples, test_size));
            Ok(SplitIndices {
                train,
                test: indices,
            })
        }
        Some(labels) => {
            if labels.len() != n_samples {
                return Err(DatasetError::LengthMismatch {
                    column: "<stratify labels>".to_string(),
                    expected: n_samples,
                    got: labels.len(),
                });
            }
            let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
            for (idx, &label) in labels.iter().enumerate() {
                by_class.entry(label).or_default().push(idx);
            }

            let groups: Vec<Vec<usize>> = by_class
                .into_values()
                .map(|mut members| {
                    members.shuffle(&mut rng);
                    members
                })
                .collect();
            let quotas = stratified_test_counts(
                &groups.iter().map(Vec::len).collect::<Vec<_>>(),
                test_count(n_samples, test_size),
            );

            let mut train = Vec::with_capacity(n_samples);
            let mut test = Vec::new();
            for (mut members, n_test) in groups.into_iter().zip(quotas) {
                let rest = members.split_off(n_test);
                test.extend(members);
                train.extend(rest);
            }

            train.shuffle(&mut rng);
            test.shuffle(&mut rng);
            Ok(SplitIndices { train, test })
        }
    }
}

/// `ceil(n_samples * test_size)`, keeping at least one row on each side.
fn test_count(n_samples: usize, test_size: f64) -> usize {
    ((n_samples as f64 * test_size).ceil() as usize).clamp(1, n_samples - 1)
}

/// Share `n_test` test rows among classes of the given sizes in proportion to
/// their size (largest remainder first, earlier classes win ties).
///
/// Classes with more than one member keep at least one training row unless
/// the total cannot be met otherwise.
fn stratified_test_counts(sizes: &[usize], n_test: usize) -> Vec<usize> {
    let n: usize = sizes.iter().sum();
    let soft_cap = |size: usize| if size > 1 { size - 1 } else { size };
    let mut counts: Vec<usize> = sizes
        .iter()
        .map(|&size| (size * n_test / n).min(soft_cap(size)))
        .collect();

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    // stable sort keeps class order among equal remainders
    order.sort_by_key(|&c| std::cmp::Reverse(sizes[c] * n_test % n));

    let mut remaining = n_test - counts.iter().sum::<usize>();
    let caps: [fn(usize) -> usize; 2] = [soft_cap, |size| size];
    for cap in caps {
        while remaining > 0 {
            let mut placed = false;
            for &c in &order {
                if remaining > 0 && counts[c] < cap(sizes[c]) {
                    counts[c] += 1;
                    remaining -= 1;
                    placed = true;
                }
            }
            if !placed {
                break;
            }
        }
    }
    counts
}

/// Split the rows of a table, optionally stratified on a label column.
pub fn split_table(
    table: &FeatureTable,
    test_size: f64,
    seed: u64,
    stratify_column: Option<&str>,
) -> Result<(FeatureTable, FeatureTable), DatasetError> {
    let codes = match stratify_column {
        Some(name) => Some(label_codes(&table.labels(name)?)),
        None => None,
    };
    let split = train_test_split(table.n_rows(), test_size, seed, codes.as_deref())?;
    Ok((table.select_rows(&split.train)?, table.select_rows(&split.test)?))
}

/// Map label strings to dense codes in sorted order; missing labels get their own code.
fn label_codes(labels: &[Option<String>]) -> Vec<usize> {
    let mut codes: BTreeMap<Option<&str>, usize> = BTreeMap::new();
    for label in labels {
        codes.entry(label.as_deref()).or_insert(0);
    }
    for (code, value) in codes.values_mut().enumerate() {
        *value = code;
    }
    labels.iter().map(|label| codes[&label.as_deref()]).collect()
}

/// Plain k-fold cross-validation splitter.
#[derive(Clone, Debug)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl KFold {
    /// Create a splitter with `n_splits` folds and shuffling enabled.
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: true,
            seed: DEFAULT_SEED,
        }
    }

    /// Set whether rows are shuffled before being assigned to folds.
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set the shuffling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generate one [`SplitIndices`] per fold; `test` is the validation fold.
    pub fn split(&self, n_samples: usize) -> Result<Vec<SplitIndices>, DatasetError> {
        check_folds(self.n_splits, n_samples)?;
        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            indices.shuffle(&mut StdRng::seed_from_u64(self.seed));
        }

        // First `n_samples % n_splits` folds get one extra row.
        let base = n_samples / self.n_splits;
        let extra = n_samples % self.n_splits;
        let mut assignment = vec![0usize; n_samples];
        let mut start = 0;
        for fold in 0..self.n_splits {
            let size = base + usize::from(fold < extra);
            for &idx in &indices[start..start + size] {
                assignment[idx] = fold;
            }
            start += size;
        }
        Ok(folds_from_assignment(&assignment, self.n_splits))
    }
}

/// K-fold splitter that keeps class proportions in every fold.
#[derive(Clone, Debug)]
pub struct StratifiedKFold {
    n_splits: usize,
    seed: u64,
}

impl StratifiedKFold {
    /// Create a stratified splitter with `n_splits` folds.
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            seed: DEFAULT_SEED,
        }
    }

    /// Set the shuffling seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generate one [`SplitIndices`] per fold from class labels.
    pub fn split(&self, labels: &[usize]) -> Result<Vec<SplitIndices>, DatasetError> {
        check_folds(self.n_splits, labels.len())?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in labels.iter().enumerate() {
            by_class.entry(label).or_default().push(idx);
        }

        // Deal each class round-robin, continuing where the previous class stopped
        // so fold sizes stay balanced.
        let mut assignment = vec![0usize; labels.len()];
        let mut next_fold = 0;
        for (_, mut members) in by_class {
            members.shuffle(&mut rng);
            for idx in members {
                assignment[idx] = next_fold;
                next_fold = (next_fold + 1) % self.n_splits;
            }
        }
        Ok(folds_from_assignment(&assignment, self.n_splits))
    }
}

fn check_folds(n_splits: usize, n_samples: usize) -> Result<(), DatasetError> {
    if n_splits < 2 {
        return Err(DatasetError::InvalidSplit(format!(
            "n_splits must be at least 2, got {}",
            n_splits
        )));
    }
    if n_samples < n_splits {
        return Err(DatasetError::InvalidSplit(format!(
            "cannot make {} folds from {} samples",
            n_splits, n_samples
        )));
    }
    Ok(())
}

fn folds_from_assignment(assignment: &[usize], n_splits: usize) -> Vec<SplitIndices> {
    (0..n_splits)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..assignment.len()).partition(|&idx| assignment[idx] == fold);
            SplitIndices { train, test }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::table::Column;
    use std::collections::HashSet;

    #[test]
    fn test_split_sizes_default() {
        let split = train_test_split(10, 0.2, DEFAULT_SEED, None).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn test_split_test_size_rounds_up() {
        let split = train_test_split(11, 0.2, DEFAULT_SEED, None).unwrap();
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);
    }

    #[test]
    fn test_split_is_partition() {
        let split = train_test_split(50, 0.3, 7, None).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_deterministic_for_seed() {
        let a = train_test_split(100, 0.2, 42, None).unwrap();
        let b = train_test_split(100, 0.2, 42, None).unwrap();
        let c = train_test_split(100, 0.2, 43, None).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_split_invalid_parameters() {
        assert!(train_test_split(10, 0.0, 42, None).is_err());
        assert!(train_test_split(10, 1.0, 42, None).is_err());
        assert!(train_test_split(1, 0.2, 42, None).is_err());
    }

    #[test]
    fn test_split_two_samples_both_sides_non_empty() {
        let split = train_test_split(2, 0.9, 42, None).unwrap();
        assert_eq!(split.train.len(), 1);
        assert_eq!(split.test.len(), 1);
    }

    #[test]
    fn test_stratified_split_keeps_proportions() {
        // 80 of class 0, 20 of class 1.
        let labels: Vec<usize> = (0..100).map(|i| usize::from(i >= 80)).collect();
        let split = train_test_split(100, 0.25, 42, Some(&labels)).unwrap();
        let test_pos = split.test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(split.test.len(), 25);
        assert_eq!(test_pos, 5);
    }

    #[test]
    fn test_stratified_and_plain_splits_hold_out_the_same_count() {
        // three classes whose rounded per-class counts would overshoot
        let labels: Vec<usize> = (0..30).map(|i| i % 3).collect();
        for test_size in [0.1, 0.15, 0.2, 0.25, 0.5] {
            let plain = train_test_split(30, test_size, 42, None).unwrap();
            let strat = train_test_split(30, test_size, 42, Some(&labels)).unwrap();
            assert_eq!(strat.test.len(), plain.test.len(), "test_size {test_size}");
            assert_eq!(strat.train.len() + strat.test.len(), 30);
        }

        let labels: Vec<usize> = (0..19).map(|i| usize::from(i % 2 == 1)).collect();
        let split = train_test_split(19, 0.2, 42, Some(&labels)).unwrap();
        assert_eq!(split.test.len(), 4);
        let test_pos = split.test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(test_pos, 2);
    }

    #[test]
    fn test_stratified_test_counts() {
        assert_eq!(stratified_test_counts(&[80, 20], 25), vec![20, 5]);
        assert_eq!(stratified_test_counts(&[10, 10, 10], 5), vec![2, 2, 1]);
        // a singleton class may go to test, larger classes keep a training row
        assert_eq!(stratified_test_counts(&[1, 2], 2), vec![1, 1]);
        assert_eq!(stratified_test_counts(&[2, 2], 3), vec![2, 1]);
    }

    #[test]
    fn test_stratified_label_length_mismatch() {
        let labels = vec![0, 1, 0];
        assert!(matches!(
            train_test_split(4, 0.5, 42, Some(&labels)),
            Err(DatasetError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_split_table_stratified_on_strings() {
        let labels: Vec<Option<String>> = (0..20)
            .map(|i| Some(if i % 4 == 0 { "FALSE POSITIVE" } else { "CANDIDATE" }.to_string()))
            .collect();
        let table = FeatureTable::from_columns(vec![
            ("row", Column::Numeric((0..20).map(f64::from).collect())),
            ("koi_disposition", Column::Categorical(labels)),
        ])
        .unwrap();

        let (train, test) = split_table(&table, 0.2, 42, Some("koi_disposition")).unwrap();
        assert_eq!(train.n_rows() + test.n_rows(), 20);
        let fp_test = test
            .value_counts("koi_disposition")
            .unwrap()
            .into_iter()
            .find(|(v, _)| v == "FALSE POSITIVE")
            .map(|(_, c)| c);
        assert_eq!(fp_test, Some(1));
    }

    #[test]
    fn test_kfold_covers_every_row_once() {
        let folds = KFold::new(3).split(10).unwrap();
        assert_eq!(folds.len(), 3);
        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);

        let mut seen = HashSet::new();
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), 10);
            for &idx in &fold.test {
                assert!(seen.insert(idx));
            }
        }
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn test_kfold_without_shuffle_is_contiguous() {
        let folds = KFold::new(2).with_shuffle(false).split(4).unwrap();
        assert_eq!(folds[0].test, vec![0, 1]);
        assert_eq!(folds[1].test, vec![2, 3]);
    }

    #[test]
    fn test_stratified_kfold_balances_classes() {
        let labels: Vec<usize> = (0..30).map(|i| usize::from(i < 10)).collect();
        let folds = StratifiedKFold::new(5).split(&labels).unwrap();
        for fold in &folds {
            let pos = fold.test.iter().filter(|&&i| labels[i] == 1).count();
            assert_eq!(pos, 2);
            assert_eq!(fold.test.len(), 6);
        }
    }

    #[test]
    fn test_kfold_invalid() {
        assert!(KFold::new(1).split(10).is_err());
        assert!(StratifiedKFold::new(5).split(&[0, 1, 0]).is_err());
    }
}
