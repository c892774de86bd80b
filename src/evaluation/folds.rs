use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::errors::EvalError;

/// Assignment of every rating index to exactly one of `k` buckets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folds {
    k: usize,
    assignment: Vec<usize>,
}

impl Folds {
    /// Shuffle `0..n` with a seeded RNG and deal it into `k` buckets.
    ///
    /// The first `n % k` buckets receive `n / k + 1` indices, the rest `n / k`.
    pub fn shuffled(n: usize, k: usize, seed: u64) -> Result<Self, EvalError> {
        check_fold_count(n, k)?;

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let base = n / k;
        let remainder = n % k;
        let mut assignment = vec![0; n];
        let mut start = 0;
        for fold in 0..k {
            let size = base + usize::from(fold < remainder);
            for &idx in &indices[start..start + size] {
                assignment[idx] = fold;
            }
            start += size;
        }

        let folds = Self { k, assignment };
        folds.assert_partition();
        Ok(folds)
    }

    /// Folds from an explicit bucket per rating index.
    pub fn from_assignment(k: usize, assignment: Vec<usize>) -> Result<Self, EvalError> {
        check_fold_count(assignment.len(), k)?;

        if let Some(&bad) = assignment.iter().find(|&&fold| fold >= k) {
            return Err(EvalError::insufficient(format!(
                "fold assignment {bad} is out of range for {k} folds"
            )));
        }
        let folds = Self { k, assignment };
        if let Some(empty) = folds.sizes().iter().position(|&size| size == 0) {
            return Err(EvalError::insufficient_in_fold(empty, "no held-out ratings"));
        }
        Ok(folds)
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.assignment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignment.is_empty()
    }

    pub fn test_indices(&self, fold: usize) -> Vec<usize> {
        self.indices_where(|f| f == fold)
    }

    pub fn train_indices(&self, fold: usize) -> Vec<usize> {
        self.indices_where(|f| f != fold)
    }

    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &fold in &self.assignment {
            sizes[fold] += 1;
        }
        sizes
    }

    fn indices_where(&self, keep: impl Fn(usize) -> bool) -> Vec<usize> {
        self.assignment
            .iter()
            .enumerate()
            .filter(|&(_, &fold)| keep(fold))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Panics unless every index sits in exactly one non-empty bucket and the
    /// bucket sizes differ by at most one.
    fn assert_partition(&self) {
        let sizes = self.sizes();
        assert_eq!(sizes.len(), self.k, "fold count mismatch");
        assert_eq!(sizes.iter().sum::<usize>(), self.assignment.len(), "folds do not cover every rating");

        let (min, max) = (sizes.iter().min(), sizes.iter().max());
        if let (Some(&min), Some(&max)) = (min, max) {
            assert!(min > 0, "empty fold in {sizes:?}");
            assert!(max - min <= 1, "unbalanced folds {sizes:?}");
        }
    }
}

fn check_fold_count(n: usize, k: usize) -> Result<(), EvalError> {
    if k < 2 {
        return Err(EvalError::insufficient(format!(
            "cross-validation needs at least 2 folds, got {k}"
        )));
    }
    if k > n {
        return Err(EvalError::insufficient(format!(
            "cannot split {n} rating(s) into {k} non-empty folds"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_index_lands_in_exactly_one_fold() {
        let folds = Folds::shuffled(23, 5, 42).unwrap();

        let mut seen: Vec<usize> = (0..5).flat_map(|f| folds.test_indices(f)).collect();
        seen.sort_unstable();

        assert_eq!(seen, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn test_first_buckets_take_the_remainder() {
        let folds = Folds::shuffled(23, 5, 42).unwrap();
        assert_eq!(folds.sizes(), vec![5, 5, 5, 4, 4]);
    }

    #[test]
    fn test_train_and_test_are_complementary() {
        let folds = Folds::shuffled(10, 3, 1).unwrap();

        for fold in 0..3 {
            let test = folds.test_indices(fold);
            let train = folds.train_indices(fold);
            assert_eq!(test.len() + train.len(), 10);
            assert!(test.iter().all(|idx| !train.contains(idx)));
        }
    }

    #[test]
    fn test_same_seed_same_assignment() {
        assert_eq!(Folds::shuffled(50, 5, 7).unwrap(), Folds::shuffled(50, 5, 7).unwrap());
        assert_ne!(Folds::shuffled(50, 5, 7).unwrap(), Folds::shuffled(50, 5, 8).unwrap());
    }

    #[test]
    fn test_too_few_folds_is_rejected() {
        let err = Folds::shuffled(10, 1, 42).unwrap_err();
        assert_eq!(err.kind(), "InsufficientDataError");
    }

    #[test]
    fn test_more_folds_than_ratings_is_rejected() {
        let err = Folds::shuffled(3, 5, 42).unwrap_err();
        assert_eq!(err.kind(), "InsufficientDataError");
    }

    #[test]
    fn test_explicit_assignment_with_empty_bucket() {
        let err = Folds::from_assignment(3, vec![0, 0, 2]).unwrap_err();
        assert!(err.to_string().contains("fold 2"));
    }
}
