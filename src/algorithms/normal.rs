use std::hash::Hasher;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use siphasher::sip::SipHasher;

use super::{Algorithm, Estimator};
use crate::config::ParamReader;
use crate::dataset::{InnerId, TrainSet};
use crate::errors::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub struct NormalParams {
    pub random_state: u64,
}

impl NormalParams {
    pub fn read(reader: &mut ParamReader<'_>, seed: u64) -> Result<Self, EvalError> {
        Ok(Self {
            random_state: reader.u64(&["random_state"], seed)?,
        })
    }
}

/// Draws each prediction from a normal distribution fitted to the training
/// ratings.
///
/// The draw for a `(user, item)` pair is seeded from the pair itself, so a
/// fitted model answers the same request the same way every time.
#[derive(Debug, Clone)]
pub struct NormalPredictor {
    params: NormalParams,
}

impl NormalPredictor {
    pub fn new(params: NormalParams) -> Self {
        Self { params }
    }
}

struct NormalModel {
    mean: f64,
    distribution: Option<Normal<f64>>,
    random_state: u64,
}

impl Algorithm for NormalPredictor {
    fn name(&self) -> &'static str {
        "normal_predictor"
    }

    fn fit(&self, trainset: &TrainSet) -> Box<dyn Estimator> {
        let mean = trainset.global_mean();
        let variance = trainset
            .all_ratings()
            .iter()
            .map(|&(_, _, r)| (r - mean).powi(2))
            .sum::<f64>()
            / trainset.num_ratings() as f64;

        Box::new(NormalModel {
            mean,
            distribution: Normal::new(mean, variance.sqrt()).ok(),
            random_state: self.params.random_state,
        })
    }
}

impl NormalModel {
    fn pair_seed(&self, user: InnerId, item: InnerId) -> u64 {
        let mut hasher = SipHasher::new_with_keys(self.random_state, 0x5eed);
        hasher.write_usize(user);
        hasher.write_usize(item);
        hasher.finish()
    }
}

impl Estimator for NormalModel {
    fn estimate(&self, user: InnerId, item: InnerId) -> Option<f64> {
        let mut rng = StdRng::seed_from_u64(self.pair_seed(user, item));
        Some(match &self.distribution {
            Some(normal) => normal.sample(&mut rng),
            None => self.mean,
        })
    }
}
