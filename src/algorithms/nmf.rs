use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Algorithm, Estimator};
use crate::config::ParamReader;
use crate::dataset::{InnerId, TrainSet};
use crate::errors::EvalError;

#[derive(Debug, Clone, PartialEq)]
pub struct NmfParams {
    pub n_factors: usize,
    pub n_epochs: usize,
    pub reg_pu: f64,
    pub reg_qi: f64,
    pub init_low: f64,
    pub init_high: f64,
    pub random_state: u64,
}

impl NmfParams {
    pub fn with_seed(random_state: u64) -> Self {
        Self {
            n_factors: 15,
            n_epochs: 50,
            reg_pu: 0.06,
            reg_qi: 0.06,
            init_low: 0.0,
            init_high: 1.0,
            random_state,
        }
    }

    pub fn read(reader: &mut ParamReader<'_>, seed: u64) -> Result<Self, EvalError> {
        let d = Self::with_seed(seed);
        let init_low = reader.f64(&["init_low"], d.init_low, |v| v >= 0.0)?;
        Ok(Self {
            n_factors: reader.usize(&["n_factors"], d.n_factors, |v| v > 0)?,
            n_epochs: reader.usize(&["n_epochs"], d.n_epochs, |v| v > 0)?,
            reg_pu: reader.f64(&["reg_pu"], d.reg_pu, |v| v >= 0.0)?,
            reg_qi: reader.f64(&["reg_qi"], d.reg_qi, |v| v >= 0.0)?,
            init_low,
            init_high: reader.f64(&["init_high"], init_low.max(d.init_high), |v| v >= init_low)?,
            random_state: reader.u64(&["random_state"], d.random_state)?,
        })
    }
}

/// Non-negative matrix factorization with multiplicative updates.
#[derive(Debug, Clone)]
pub struct Nmf {
    params: NmfParams,
}

impl Nmf {
    pub fn new(params: NmfParams) -> Self {
        Self { params }
    }
}

struct NmfModel {
    user_factors: Array2<f64>,
    item_factors: Array2<f64>,
}

impl Algorithm for Nmf {
    fn name(&self) -> &'static str {
        "nmf"
    }

    fn fit(&self, trainset: &TrainSet) -> Box<dyn Estimator> {
        let p = &self.params;
        let mut rng = StdRng::seed_from_u64(p.random_state);
        let mut model = NmfModel {
            user_factors: uniform(trainset.num_users(), p.n_factors, p.init_low, p.init_high, &mut rng),
            item_factors: uniform(trainset.num_items(), p.n_factors, p.init_low, p.init_high, &mut rng),
        };

        for _ in 0..p.n_epochs {
            model.update(trainset, p.reg_pu, p.reg_qi);
        }

        Box::new(model)
    }
}

impl NmfModel {
    fn update(&mut self, trainset: &TrainSet, reg_pu: f64, reg_qi: f64) {
        let shape_u = self.user_factors.raw_dim();
        let shape_i = self.item_factors.raw_dim();
        let (mut user_num, mut user_denom) = (Array2::<f64>::zeros(shape_u), Array2::<f64>::zeros(shape_u));
        let (mut item_num, mut item_denom) = (Array2::<f64>::zeros(shape_i), Array2::<f64>::zeros(shape_i));

        for &(u, i, r) in trainset.all_ratings() {
            let est = self.dot(u, i);
            for f in 0..self.user_factors.ncols() {
                user_num[[u, f]] += self.item_factors[[i, f]] * r;
                user_denom[[u, f]] += self.item_factors[[i, f]] * est;
                item_num[[i, f]] += self.user_factors[[u, f]] * r;
                item_denom[[i, f]] += self.user_factors[[u, f]] * est;
            }
        }

        for u in 0..trainset.num_users() {
            let n = trainset.user_ratings(u).len() as f64;
            for f in 0..self.user_factors.ncols() {
                let denom = user_denom[[u, f]] + n * reg_pu * self.user_factors[[u, f]];
                if denom > 0.0 {
                    self.user_factors[[u, f]] *= user_num[[u, f]] / denom;
                }
            }
        }

        for i in 0..trainset.num_items() {
            let n = trainset.item_ratings(i).len() as f64;
            for f in 0..self.item_factors.ncols() {
                let denom = item_denom[[i, f]] + n * reg_qi * self.item_factors[[i, f]];
                if denom > 0.0 {
                    self.item_factors[[i, f]] *= item_num[[i, f]] / denom;
                }
            }
        }
    }

    fn dot(&self, u: InnerId, i: InnerId) -> f64 {
        self.user_factors.row(u).dot(&self.item_factors.row(i))
    }
}

impl Estimator for NmfModel {
    fn estimate(&self, user: InnerId, item: InnerId) -> Option<f64> {
        Some(self.dot(user, item))
    }
}

fn uniform(rows: usize, cols: usize, low: f64, high: f64, rng: &mut StdRng) -> Array2<f64> {
    Array2::from_shape_simple_fn((rows, cols), || {
        if high > low { rng.gen_range(low..high) } else { low }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::FittedModel;
    use crate::dataset::Rating;

    fn trainset() -> TrainSet {
        let mut ratings = Vec::new();
        for u in 0..4 {
            for i in 0..4 {
                let score = if (u + i) % 2 == 0 { 5.0 } else { 1.0 };
                ratings.push(Rating::new(format!("u{u}"), format!("i{i}"), score));
            }
        }
        TrainSet::from_ratings(&ratings).unwrap()
    }

    #[test]
    fn test_factors_stay_non_negative() {
        let trainset = trainset();
        let algorithm = Nmf::new(NmfParams::with_seed(5));
        let estimator = algorithm.fit(&trainset);

        for &(u, i, _) in trainset.all_ratings() {
            assert!(estimator.estimate(u, i).unwrap() >= 0.0);
        }
    }

    #[test]
    fn test_fits_checkerboard_pattern() {
        let params = NmfParams {
            n_factors: 4,
            n_epochs: 200,
            reg_pu: 0.0,
            reg_qi: 0.0,
            ..NmfParams::with_seed(11)
        };
        let model = FittedModel::fit(&Nmf::new(params), &trainset());

        assert!(model.predict("u0", "i0") > model.predict("u0", "i1"));
        assert!(model.predict("u1", "i1") > model.predict("u1", "i0"));
    }
}
