use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::folds::Folds;
use super::metrics::{Metric, Scored};
use crate::algorithms::{Algorithm, Fallback, FittedModel};
use crate::config::EvaluationSettings;
use crate::dataset::{RatingStore, TrainSet};
use crate::errors::EvalError;

/// What to do with a held-out rating whose user or item never appears in
/// the training folds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColdStartPolicy {
    /// Predict the training global mean
    #[default]
    GlobalMean,
    /// Fail the run
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldResult {
    /// One-based fold number.
    pub fold: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub scores: BTreeMap<Metric, f64>,
    pub fit_seconds: f64,
    pub test_seconds: f64,
    /// Held-out ratings predicted by the global-mean fallback.
    pub fallbacks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrossValidationReport {
    pub algorithm: String,
    pub dataset: Option<String>,
    pub n_ratings: usize,
    pub n_users: usize,
    pub n_items: usize,
    pub k: usize,
    pub seed: u64,
    pub cold_start: ColdStartPolicy,
    /// Requested metrics, in display order.
    pub metrics: Vec<Metric>,
    pub folds: Vec<FoldResult>,
    pub mean: BTreeMap<Metric, f64>,
    /// Population standard deviation across folds.
    pub std: BTreeMap<Metric, f64>,
    pub evaluated_at: DateTime<Utc>,
}

impl CrossValidationReport {
    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }
}

/// K-fold cross-validation of one algorithm over one rating store.
///
/// Every fold trains a fresh model on the other `k - 1` folds and scores it
/// on its own ratings.
#[derive(Debug, Clone)]
pub struct CrossValidator {
    settings: EvaluationSettings,
}

impl CrossValidator {
    pub fn new(mut settings: EvaluationSettings) -> Self {
        let mut seen = Vec::with_capacity(settings.metrics.len());
        settings.metrics.retain(|metric| {
            let first = !seen.contains(metric);
            seen.push(*metric);
            first
        });
        Self { settings }
    }

    pub fn settings(&self) -> &EvaluationSettings {
        &self.settings
    }

    /// Seeded k-fold split of `store`, then [`CrossValidator::run_with_folds`].
    pub fn run(&self, store: &RatingStore, algorithm: &dyn Algorithm) -> Result<CrossValidationReport, EvalError> {
        let folds = Folds::shuffled(store.len(), self.settings.folds, self.settings.seed)?;
        self.run_with_folds(store, algorithm, &folds)
    }

    pub fn run_with_folds(
        &self,
        store: &RatingStore,
        algorithm: &dyn Algorithm,
        folds: &Folds,
    ) -> Result<CrossValidationReport, EvalError> {
        assert_eq!(folds.len(), store.len(), "fold assignment does not match the rating store");
        if self.settings.metrics.is_empty() {
            return Err(EvalError::insufficient("no metrics requested"));
        }

        info!(
            "  → Cross-validating {} on {} ratings with {} folds (seed {})",
            algorithm.name(),
            store.len(),
            folds.k(),
            self.settings.seed
        );

        let results = self.evaluate_folds(store, algorithm, folds)?;
        let (mean, std) = aggregate(&self.settings.metrics, &results);

        Ok(CrossValidationReport {
            algorithm: algorithm.name().to_string(),
            dataset: None,
            n_ratings: store.len(),
            n_users: store.num_users(),
            n_items: store.num_items(),
            k: folds.k(),
            seed: self.settings.seed,
            cold_start: self.settings.cold_start,
            metrics: self.settings.metrics.clone(),
            folds: results,
            mean,
            std,
            evaluated_at: Utc::now(),
        })
    }

    fn evaluate_folds(
        &self,
        store: &RatingStore,
        algorithm: &dyn Algorithm,
        folds: &Folds,
    ) -> Result<Vec<FoldResult>, EvalError> {
        let jobs = self.settings.jobs.min(folds.k());
        if jobs > 1 {
            match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => {
                    debug!("running {} folds on {} threads", folds.k(), jobs);
                    return pool.install(|| {
                        (0..folds.k())
                            .into_par_iter()
                            .map(|fold| self.evaluate_fold(store, algorithm, folds, fold))
                            .collect()
                    });
                }
                Err(e) => warn!("could not start {jobs} worker threads ({e}), running folds sequentially"),
            }
        }

        (0..folds.k())
            .map(|fold| self.evaluate_fold(store, algorithm, folds, fold))
            .collect()
    }

    fn evaluate_fold(
        &self,
        store: &RatingStore,
        algorithm: &dyn Algorithm,
        folds: &Folds,
        fold: usize,
    ) -> Result<FoldResult, EvalError> {
        let train = folds.train_indices(fold);
        let test = folds.test_indices(fold);

        let fit_start = Instant::now();
        let trainset = TrainSet::from_indices(store, &train)
            .map_err(|e| EvalError::insufficient_in_fold(fold, e.to_string()))?;
        let model = FittedModel::fit(algorithm, &trainset);
        let fit_seconds = fit_start.elapsed().as_secs_f64();

        let test_start = Instant::now();
        let mut scored = Vec::with_capacity(test.len());
        let mut fallbacks = 0;
        for &idx in &test {
            let rating = store.get(idx);
            let prediction = model.predict_detailed(&rating.user_id, &rating.item_id);

            if self.settings.cold_start == ColdStartPolicy::Reject {
                match prediction.fallback {
                    Some(Fallback::UnknownUser) => {
                        return Err(EvalError::insufficient_in_fold(
                            fold,
                            format!("user {:?} has no training ratings", rating.user_id),
                        ));
                    }
                    Some(Fallback::UnknownItem) => {
                        return Err(EvalError::insufficient_in_fold(
                            fold,
                            format!("item {:?} has no training ratings", rating.item_id),
                        ));
                    }
                    _ => {}
                }
            }
            if prediction.fallback.is_some() {
                fallbacks += 1;
            }

            scored.push(Scored {
                user: &rating.user_id,
                actual: rating.score,
                estimate: prediction.estimate,
            });
        }

        let scores = self
            .settings
            .metrics
            .iter()
            .map(|&metric| {
                metric.compute(&scored).map(|value| (metric, value)).ok_or_else(|| {
                    EvalError::insufficient_in_fold(
                        fold,
                        format!("{} is undefined on {} held-out rating(s)", metric.name(), scored.len()),
                    )
                })
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        let test_seconds = test_start.elapsed().as_secs_f64();

        debug!(
            "fold {}: train {} / test {}, {} fallback(s), {:?}",
            fold + 1,
            train.len(),
            test.len(),
            fallbacks,
            scores
        );

        Ok(FoldResult {
            fold: fold + 1,
            train_size: train.len(),
            test_size: test.len(),
            scores,
            fit_seconds,
            test_seconds,
            fallbacks,
        })
    }
}

/// Mean and population standard deviation of each metric across folds.
fn aggregate(metrics: &[Metric], results: &[FoldResult]) -> (BTreeMap<Metric, f64>, BTreeMap<Metric, f64>) {
    let n = results.len() as f64;
    let mut mean = BTreeMap::new();
    let mut std = BTreeMap::new();

    for &metric in metrics {
        let values: Vec<f64> = results.iter().filter_map(|r| r.scores.get(&metric).copied()).collect();
        let m = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
        mean.insert(metric, m);
        std.insert(metric, variance.sqrt());
    }
    (mean, std)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::baseline::{BaselineOnly, BaselineOnlyParams};
    use crate::algorithms::svd::{Svd, SvdParams};
    use crate::dataset::Rating;

    fn global_mean_only() -> BaselineOnly {
        BaselineOnly::new(BaselineOnlyParams {
            biases: false,
            ..BaselineOnlyParams::default()
        })
    }

    fn settings(folds: usize) -> EvaluationSettings {
        EvaluationSettings {
            folds,
            ..EvaluationSettings::default()
        }
    }

    fn store(ratings: Vec<Rating>) -> RatingStore {
        RatingStore::new(ratings, "test").unwrap()
    }

    fn dense_store() -> RatingStore {
        let mut ratings = Vec::new();
        for u in 0..8 {
            for i in 0..6 {
                let score = 1.0 + ((u * 3 + i * 5) % 5) as f64;
                ratings.push(Rating::new(format!("u{u}"), format!("i{i}"), score));
            }
        }
        store(ratings)
    }

    #[test]
    fn test_four_rating_explicit_partition() {
        let store = store(vec![
            Rating::new("u1", "i1", 5.0),
            Rating::new("u2", "i2", 2.0),
            Rating::new("u1", "i2", 3.0),
            Rating::new("u2", "i1", 4.0),
        ]);
        let folds = Folds::from_assignment(2, vec![0, 0, 1, 1]).unwrap();
        let validator = CrossValidator::new(settings(2));

        let report = validator.run_with_folds(&store, &global_mean_only(), &folds).unwrap();

        assert_eq!(report.folds[0].scores[&Metric::Rmse], 1.5);
        assert_eq!(report.folds[0].scores[&Metric::Mae], 1.5);
        assert_eq!(report.folds[1].scores[&Metric::Rmse], 0.5);
        assert_eq!(report.folds[1].scores[&Metric::Mae], 0.5);
        assert_eq!(report.mean[&Metric::Rmse], 1.0);
        assert_eq!(report.mean[&Metric::Mae], 1.0);
        assert_eq!(report.std[&Metric::Rmse], 0.5);
    }

    #[test]
    fn test_identical_ratings_give_zero_error() {
        let ratings = (0..10)
            .map(|n| Rating::new(format!("u{}", n % 3), format!("i{}", n % 4), 4.0))
            .collect();
        let report = CrossValidator::new(settings(5)).run(&store(ratings), &global_mean_only()).unwrap();

        assert_eq!(report.mean[&Metric::Rmse], 0.0);
        assert_eq!(report.mean[&Metric::Mae], 0.0);
    }

    #[test]
    fn test_every_rating_is_held_out_once() {
        let store = dense_store();
        let report = CrossValidator::new(settings(5)).run(&store, &global_mean_only()).unwrap();

        let held_out: usize = report.folds.iter().map(|f| f.test_size).sum();
        assert_eq!(held_out, store.len());
        for fold in &report.folds {
            assert_eq!(fold.train_size + fold.test_size, store.len());
        }
    }

    #[test]
    fn test_same_seed_reproduces_metrics() {
        let store = dense_store();
        let validator = CrossValidator::new(settings(4));
        let algorithm = Svd::new(SvdParams::with_seed(3));

        let first = validator.run(&store, &algorithm).unwrap();
        let second = validator.run(&store, &algorithm).unwrap();

        let scores = |r: &CrossValidationReport| r.folds.iter().map(|f| f.scores.clone()).collect::<Vec<_>>();
        assert_eq!(scores(&first), scores(&second));
    }

    #[test]
    fn test_parallel_folds_match_sequential() {
        let store = dense_store();
        let algorithm = Svd::new(SvdParams::with_seed(3));
        let sequential = CrossValidator::new(settings(4)).run(&store, &algorithm).unwrap();
        let parallel = CrossValidator::new(EvaluationSettings {
            jobs: 3,
            ..settings(4)
        })
        .run(&store, &algorithm)
        .unwrap();

        for (a, b) in sequential.folds.iter().zip(&parallel.folds) {
            assert_eq!(a.fold, b.fold);
            assert_eq!(a.scores, b.scores);
        }
    }

    #[test]
    fn test_cold_start_counts_fallbacks() {
        let store = store(vec![
            Rating::new("u1", "i1", 5.0),
            Rating::new("u2", "i2", 2.0),
            Rating::new("u3", "i1", 3.0),
            Rating::new("u1", "i2", 4.0),
        ]);
        let folds = Folds::from_assignment(2, vec![0, 0, 1, 0]).unwrap();

        let report = CrossValidator::new(settings(2))
            .run_with_folds(&store, &global_mean_only(), &folds)
            .unwrap();

        // fold 2 holds out only u3, who is absent from fold 1
        assert_eq!(report.folds[1].fallbacks, 1);
        assert_eq!(report.folds[1].scores[&Metric::Mae], (5.0 + 2.0 + 4.0) / 3.0 - 3.0);
    }

    #[test]
    fn test_reject_policy_names_the_fold() {
        let store = store(vec![
            Rating::new("u1", "i1", 5.0),
            Rating::new("u1", "i2", 3.0),
            Rating::new("u9", "i1", 4.0),
            Rating::new("u1", "i3", 2.0),
        ]);
        let folds = Folds::from_assignment(2, vec![0, 1, 1, 0]).unwrap();
        let validator = CrossValidator::new(EvaluationSettings {
            cold_start: ColdStartPolicy::Reject,
            ..settings(2)
        });

        let err = validator.run_with_folds(&store, &global_mean_only(), &folds).unwrap_err();

        assert_eq!(err.kind(), "InsufficientDataError");
        match err {
            EvalError::InsufficientData { fold, detail } => {
                assert_eq!(fold, Some(0));
                assert!(detail.contains("item \"i3\""), "{detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_more_folds_than_ratings() {
        let store = store(vec![Rating::new("u1", "i1", 5.0), Rating::new("u2", "i1", 3.0)]);
        let err = CrossValidator::new(settings(5)).run(&store, &global_mean_only()).unwrap_err();

        assert_eq!(err.kind(), "InsufficientDataError");
    }

    #[test]
    fn test_undefined_metric_is_an_error() {
        let store = store(vec![
            Rating::new("u1", "i1", 5.0),
            Rating::new("u2", "i1", 3.0),
            Rating::new("u3", "i1", 4.0),
            Rating::new("u4", "i1", 2.0),
        ]);
        let validator = CrossValidator::new(EvaluationSettings {
            metrics: vec![Metric::Fcp],
            ..settings(2)
        });

        let err = validator.run(&store, &global_mean_only()).unwrap_err();

        assert_eq!(err.kind(), "InsufficientDataError");
        assert!(err.to_string().contains("FCP"));
    }

    #[test]
    fn test_duplicate_metrics_are_collapsed() {
        let validator = CrossValidator::new(EvaluationSettings {
            metrics: vec![Metric::Mae, Metric::Rmse, Metric::Mae],
            ..EvaluationSettings::default()
        });

        assert_eq!(validator.settings().metrics, vec![Metric::Mae, Metric::Rmse]);
    }
}
