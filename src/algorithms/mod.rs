//! Rating prediction algorithms and the registry that names them.
//!
//! An [`Algorithm`] is a factory: [`Algorithm::fit`] builds a fresh
//! [`Estimator`] from a [`TrainSet`] and shares no state between calls.
//! [`FittedModel`] wraps an estimator with the id maps of its training set
//! and applies the cold-start policy and rating-scale clipping uniformly.

pub mod baseline;
pub mod knn;
pub mod nmf;
pub mod normal;
pub mod registry;
pub mod similarity;
pub mod slope_one;
pub mod svd;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dataset::{InnerId, RatingScale, TrainSet};

pub use registry::{AlgorithmKind, REGISTRY, Registration};

pub trait Algorithm: Send + Sync {
    /// Canonical registry name.
    fn name(&self) -> &'static str;

    /// Learn parameters from `trainset`.
    fn fit(&self, trainset: &TrainSet) -> Box<dyn Estimator>;
}

/// Fitted parameters of one algorithm run.
pub trait Estimator: Send + Sync {
    /// Raw estimate for a user and item both seen in training, or `None`
    /// when the model has nothing to base a prediction on.
    fn estimate(&self, user: InnerId, item: InnerId) -> Option<f64>;
}

/// Why a prediction is the training global mean rather than a model estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    UnknownUser,
    UnknownItem,
    Undetermined,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub estimate: f64,
    pub fallback: Option<Fallback>,
}

pub struct FittedModel {
    estimator: Box<dyn Estimator>,
    users: HashMap<String, InnerId>,
    items: HashMap<String, InnerId>,
    global_mean: f64,
    scale: RatingScale,
}

impl FittedModel {
    pub fn fit(algorithm: &dyn Algorithm, trainset: &TrainSet) -> Self {
        let estimator = algorithm.fit(trainset);
        let (users, items) = trainset.id_maps();

        Self {
            estimator,
            users,
            items,
            global_mean: trainset.global_mean(),
            scale: trainset.scale(),
        }
    }

    /// Predicted score for `user_id` and `item_id`.
    pub fn predict(&self, user_id: &str, item_id: &str) -> f64 {
        self.predict_detailed(user_id, item_id).estimate
    }

    /// Predicted score plus the reason it fell back to the global mean, if it did.
    ///
    /// Unseen users or items always get exactly the training global mean.
    pub fn predict_detailed(&self, user_id: &str, item_id: &str) -> Prediction {
        let user = self.users.get(user_id).copied();
        let item = self.items.get(item_id).copied();

        match (user, item) {
            (None, _) => self.fallback(Fallback::UnknownUser),
            (_, None) => self.fallback(Fallback::UnknownItem),
            (Some(u), Some(i)) => match self.estimator.estimate(u, i) {
                Some(estimate) if estimate.is_finite() => Prediction {
                    estimate: self.scale.clip(estimate),
                    fallback: None,
                },
                _ => self.fallback(Fallback::Undetermined),
            },
        }
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    fn fallback(&self, reason: Fallback) -> Prediction {
        Prediction {
            estimate: self.global_mean,
            fallback: Some(reason),
        }
    }
}

impl std::fmt::Debug for FittedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FittedModel")
            .field("users", &self.users.len())
            .field("items", &self.items.len())
            .field("global_mean", &self.global_mean)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Rating;

    struct Constant(Option<f64>);

    impl Estimator for Constant {
        fn estimate(&self, _user: InnerId, _item: InnerId) -> Option<f64> {
            self.0
        }
    }

    struct Fixed(Option<f64>);

    impl Algorithm for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn fit(&self, _trainset: &TrainSet) -> Box<dyn Estimator> {
            Box::new(Constant(self.0))
        }
    }

    fn trainset() -> TrainSet {
        TrainSet::from_ratings(&[
            Rating::new("u1", "i1", 1.0),
            Rating::new("u2", "i2", 4.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_cold_start_returns_global_mean() {
        let model = FittedModel::fit(&Fixed(Some(3.9)), &trainset());

        let unknown_user = model.predict_detailed("u9", "i1");
        let unknown_item = model.predict_detailed("u1", "i9");

        assert_eq!(unknown_user.estimate, 2.5);
        assert_eq!(unknown_user.fallback, Some(Fallback::UnknownUser));
        assert_eq!(unknown_item.estimate, 2.5);
        assert_eq!(unknown_item.fallback, Some(Fallback::UnknownItem));
    }

    #[test]
    fn test_estimates_are_clipped_to_scale() {
        let model = FittedModel::fit(&Fixed(Some(9.0)), &trainset());

        assert_eq!(model.predict("u1", "i2"), 4.0);
    }

    #[test]
    fn test_undetermined_estimate_falls_back() {
        let model = FittedModel::fit(&Fixed(None), &trainset());
        let prediction = model.predict_detailed("u1", "i2");

        assert_eq!(prediction.estimate, 2.5);
        assert_eq!(prediction.fallback, Some(Fallback::Undetermined));
    }
}
