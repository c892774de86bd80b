use log::debug;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use super::{Algorithm, Estimator};
use crate::config::ParamReader;
use crate::dataset::{InnerId, TrainSet};
use crate::errors::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub struct SvdParams {
    pub n_factors: usize,
    pub n_epochs: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    pub biased: bool,
    pub init_mean: f64,
    pub init_std_dev: f64,
    pub random_state: u64,
}

impl SvdParams {
    pub fn with_seed(random_state: u64) -> Self {
        Self {
            n_factors: 20,
            n_epochs: 20,
            learning_rate: 0.005,
            regularization: 0.02,
            biased: true,
            init_mean: 0.0,
            init_std_dev: 0.1,
            random_state,
        }
    }

    pub fn read(reader: &mut ParamReader<'_>, seed: u64) -> Result<Self, EvalError> {
        let d = Self::with_seed(seed);
        Ok(Self {
            n_factors: reader.usize(&["n_factors"], d.n_factors, |v| v > 0)?,
            n_epochs: reader.usize(&["n_epochs"], d.n_epochs, |v| v > 0)?,
            learning_rate: reader.f64(&["learning_rate", "lr_all"], d.learning_rate, |v| v > 0.0)?,
            regularization: reader.f64(&["regularization", "reg_all"], d.regularization, |v| {
                v >= 0.0
            })?,
            biased: reader.bool(&["biased"], d.biased)?,
            init_mean: reader.f64(&["init_mean"], d.init_mean, |_| true)?,
            init_std_dev: reader.f64(&["init_std_dev"], d.init_std_dev, |v| v >= 0.0)?,
            random_state: reader.u64(&["random_state"], d.random_state)?,
        })
    }
}

/// Matrix factorization trained by stochastic gradient descent.
///
/// The estimate is `μ + b_u + b_i + p_u·q_i`, or just `p_u·q_i` when
/// `biased` is off.
#[derive(Debug, Clone)]
pub struct Svd {
    params: SvdParams,
}

impl Svd {
    pub fn new(params: SvdParams) -> Self {
        Self { params }
    }
}

#[derive(Debug, Clone)]
struct SvdModel {
    biased: bool,
    global_mean: f64,
    user_bias: Array1<f64>,
    item_bias: Array1<f64>,
    user_factors: Array2<f64>,
    item_factors: Array2<f64>,
}

impl Algorithm for Svd {
    fn name(&self) -> &'static str {
        "svd"
    }

    fn fit(&self, trainset: &TrainSet) -> Box<dyn Estimator> {
        let p = &self.params;
        let mut rng = StdRng::seed_from_u64(p.random_state);

        let mut model = SvdModel {
            biased: p.biased,
            global_mean: trainset.global_mean(),
            user_bias: Array1::zeros(trainset.num_users()),
            item_bias: Array1::zeros(trainset.num_items()),
            user_factors: init_factors(trainset.num_users(), p.n_factors, p.init_mean, p.init_std_dev, &mut rng),
            item_factors: init_factors(trainset.num_items(), p.n_factors, p.init_mean, p.init_std_dev, &mut rng),
        };

        for epoch in 0..p.n_epochs {
            let sq_err = model.sgd_epoch(trainset, p.learning_rate, p.regularization);
            debug!(
                "SVD epoch {}/{}: train RMSE {:.4}",
                epoch + 1,
                p.n_epochs,
                (sq_err / trainset.num_ratings() as f64).sqrt()
            );
        }

        Box::new(model)
    }
}

impl SvdModel {
    /// One pass over the training ratings in order; returns the summed
    /// squared error seen during the pass.
    fn sgd_epoch(&mut self, trainset: &TrainSet, lr: f64, reg: f64) -> f64 {
        let mut sq_err = 0.0;

        for &(u, i, r) in trainset.all_ratings() {
            let err = r - self.raw_estimate(u, i);
            sq_err += err * err;

            if self.biased {
                self.user_bias[u] += lr * (err - reg * self.user_bias[u]);
                self.item_bias[i] += lr * (err - reg * self.item_bias[i]);
            }

            for f in 0..self.user_factors.ncols() {
                let puf = self.user_factors[[u, f]];
                let qif = self.item_factors[[i, f]];
                self.user_factors[[u, f]] += lr * (err * qif - reg * puf);
                self.item_factors[[i, f]] += lr * (err * puf - reg * qif);
            }
        }

        sq_err
    }

    fn raw_estimate(&self, u: InnerId, i: InnerId) -> f64 {
        let dot = self.user_factors.row(u).dot(&self.item_factors.row(i));
        if self.biased {
            self.global_mean + self.user_bias[u] + self.item_bias[i] + dot
        } else {
            dot
        }
    }
}

impl Estimator for SvdModel {
    fn estimate(&self, user: InnerId, item: InnerId) -> Option<f64> {
        Some(self.raw_estimate(user, item))
    }
}

/// `rows × cols` matrix drawn from N(mean, std_dev).
pub(crate) fn init_factors(
    rows: usize,
    cols: usize,
    mean: f64,
    std_dev: f64,
    rng: &mut StdRng,
) -> Array2<f64> {
    let normal = Normal::new(mean, std_dev).ok();
    Array2::from_shape_simple_fn((rows, cols), || match &normal {
        Some(dist) => dist.sample(&mut *rng),
        None => mean,
    })
}
