use log::debug;
use ndarray::Array1;

use super::{Algorithm, Estimator};
use crate::config::ParamReader;
use crate::dataset::{InnerId, TrainSet};
use crate::errors::EvalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineMethod {
    Als,
    Sgd,
}

impl BaselineMethod {
    fn from_name(name: &str) -> Self {
        match name {
            "sgd" => BaselineMethod::Sgd,
            _ => BaselineMethod::Als,
        }
    }

    fn default_epochs(self) -> usize {
        match self {
            BaselineMethod::Als => 10,
            BaselineMethod::Sgd => 20,
        }
    }
}

/// Options for estimating user and item biases.
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineOptions {
    pub method: BaselineMethod,
    pub n_epochs: usize,
    pub reg_u: f64,
    pub reg_i: f64,
    pub learning_rate: f64,
    pub reg: f64,
    pub tolerance: f64,
}

impl Default for BaselineOptions {
    fn default() -> Self {
        Self {
            method: BaselineMethod::Als,
            n_epochs: BaselineMethod::Als.default_epochs(),
            reg_u: 15.0,
            reg_i: 10.0,
            learning_rate: 0.005,
            reg: 0.02,
            tolerance: 1e-4,
        }
    }
}

impl BaselineOptions {
    /// Read options from the top level of `reader`, then let a nested
    /// `bsl_options` object override them.
    pub fn read(reader: &mut ParamReader<'_>) -> Result<Self, EvalError> {
        let top = Self::read_level(reader, &Self::default())?;
        let mut section = reader.section("bsl_options")?;
        let options = Self::read_level(&mut section, &top)?;
        section.finish();
        Ok(options)
    }

    fn read_level(reader: &mut ParamReader<'_>, defaults: &Self) -> Result<Self, EvalError> {
        let default_method = match defaults.method {
            BaselineMethod::Als => "als",
            BaselineMethod::Sgd => "sgd",
        };
        let method = BaselineMethod::from_name(reader.choice(
            &["method"],
            default_method,
            &["als", "sgd"],
        )?);
        let default_epochs = if method == defaults.method {
            defaults.n_epochs
        } else {
            method.default_epochs()
        };

        Ok(Self {
            method,
            n_epochs: reader.usize(&["n_epochs"], default_epochs, |v| v > 0)?,
            reg_u: reader.f64(&["reg_u"], defaults.reg_u, |v| v >= 0.0)?,
            reg_i: reader.f64(&["reg_i"], defaults.reg_i, |v| v >= 0.0)?,
            learning_rate: reader.f64(&["learning_rate"], defaults.learning_rate, |v| v > 0.0)?,
            reg: reader.f64(&["reg"], defaults.reg, |v| v >= 0.0)?,
            tolerance: reader.f64(&["tolerance"], defaults.tolerance, |v| v >= 0.0)?,
        })
    }
}

/// Fitted user and item biases around the training global mean.
#[derive(Debug, Clone)]
pub struct Baselines {
    pub global_mean: f64,
    pub user_bias: Array1<f64>,
    pub item_bias: Array1<f64>,
}

impl Baselines {
    pub fn compute(trainset: &TrainSet, options: &BaselineOptions) -> Self {
        match options.method {
            BaselineMethod::Als => als(trainset, options),
            BaselineMethod::Sgd => sgd(trainset, options),
        }
    }

    /// `μ + b_u + b_i` for inner ids.
    pub fn baseline(&self, user: InnerId, item: InnerId) -> f64 {
        self.global_mean + self.user_bias[user] + self.item_bias[item]
    }
}

/// Alternating least squares over the two bias vectors.
///
/// Stops after `n_epochs` sweeps or once no bias moves by more than
/// `tolerance` in a sweep.
fn als(trainset: &TrainSet, options: &BaselineOptions) -> Baselines {
    let mu = trainset.global_mean();
    let mut bu = Array1::<f64>::zeros(trainset.num_users());
    let mut bi = Array1::<f64>::zeros(trainset.num_items());

    for epoch in 0..options.n_epochs {
        let new_bi = Array1::from_shape_fn(trainset.num_items(), |i| {
            let ratings = trainset.item_ratings(i);
            let dev: f64 = ratings.iter().map(|&(u, r)| r - mu - bu[u]).sum();
            dev / (options.reg_i + ratings.len() as f64)
        });
        let new_bu = Array1::from_shape_fn(trainset.num_users(), |u| {
            let ratings = trainset.user_ratings(u);
            let dev: f64 = ratings.iter().map(|&(i, r)| r - mu - new_bi[i]).sum();
            dev / (options.reg_u + ratings.len() as f64)
        });

        let max_diff = max_abs_diff(&new_bu, &bu).max(max_abs_diff(&new_bi, &bi));
        bu = new_bu;
        bi = new_bi;

        if max_diff < options.tolerance {
            debug!("Baseline ALS converged in {} sweeps", epoch + 1);
            break;
        }
    }

    Baselines {
        global_mean: mu,
        user_bias: bu,
        item_bias: bi,
    }
}

fn sgd(trainset: &TrainSet, options: &BaselineOptions) -> Baselines {
    let mu = trainset.global_mean();
    let mut bu = Array1::<f64>::zeros(trainset.num_users());
    let mut bi = Array1::<f64>::zeros(trainset.num_items());
    let (lr, reg) = (options.learning_rate, options.reg);

    for _ in 0..options.n_epochs {
        for &(u, i, r) in trainset.all_ratings() {
            let err = r - (mu + bu[u] + bi[i]);
            bu[u] += lr * (err - reg * bu[u]);
            bi[i] += lr * (err - reg * bi[i]);
        }
    }

    Baselines {
        global_mean: mu,
        user_bias: bu,
        item_bias: bi,
    }
}

fn max_abs_diff(new: &Array1<f64>, old: &Array1<f64>) -> f64 {
    (new - old).mapv(|x| x.abs()).fold(0.0_f64, |a, &b| a.max(b))
}

#[derive(Debug, Clone)]
pub struct BaselineOnlyParams {
    pub biases: bool,
    pub options: BaselineOptions,
}

impl Default for BaselineOnlyParams {
    fn default() -> Self {
        Self {
            biases: true,
            options: BaselineOptions::default(),
        }
    }
}

impl BaselineOnlyParams {
    pub fn read(reader: &mut ParamReader<'_>) -> Result<Self, EvalError> {
        Ok(Self {
            biases: reader.bool(&["biases"], true)?,
            options: BaselineOptions::read(reader)?,
        })
    }
}

/// Global mean, optionally corrected by user and item biases.
#[derive(Debug, Clone)]
pub struct BaselineOnly {
    params: BaselineOnlyParams,
}

impl BaselineOnly {
    pub fn new(params: BaselineOnlyParams) -> Self {
        Self { params }
    }
}

impl Algorithm for BaselineOnly {
    fn name(&self) -> &'static str {
        "baseline_only"
    }

    fn fit(&self, trainset: &TrainSet) -> Box<dyn Estimator> {
        if self.params.biases {
            Box::new(Baselines::compute(trainset, &self.params.options))
        } else {
            Box::new(GlobalMean(trainset.global_mean()))
        }
    }
}

impl Estimator for Baselines {
    fn estimate(&self, user: InnerId, item: InnerId) -> Option<f64> {
        Some(self.baseline(user, item))
    }
}

struct GlobalMean(f64);

impl Estimator for GlobalMean {
    fn estimate(&self, _user: InnerId, _item: InnerId) -> Option<f64> {
        Some(self.0)
    }
}
