use ndarray::{Array1, Array2};

use super::{Algorithm, Estimator};
use crate::dataset::{InnerId, TrainSet};

/// Slope One: a user's mean shifted by the plain average of item-to-item
/// rating differences over the items the user rated.
#[derive(Debug, Clone, Default)]
pub struct SlopeOne;

struct SlopeOneModel {
    freq: Array2<f64>,
    dev: Array2<f64>,
    user_means: Array1<f64>,
    user_items: Vec<Vec<InnerId>>,
}

impl Algorithm for SlopeOne {
    fn name(&self) -> &'static str {
        "slope_one"
    }

    fn fit(&self, trainset: &TrainSet) -> Box<dyn Estimator> {
        let n_items = trainset.num_items();
        let mut freq = Array2::<f64>::zeros((n_items, n_items));
        let mut dev = Array2::<f64>::zeros((n_items, n_items));

        for u in 0..trainset.num_users() {
            let ratings = trainset.user_ratings(u);
            for &(i, ri) in ratings {
                for &(j, rj) in ratings {
                    freq[[i, j]] += 1.0;
                    dev[[i, j]] += ri - rj;
                }
            }
        }

        dev.zip_mut_with(&freq, |d, &f| {
            if f > 0.0 {
                *d /= f;
            }
        });

        let user_means = Array1::from_shape_fn(trainset.num_users(), |u| {
            let ratings = trainset.user_ratings(u);
            ratings.iter().map(|&(_, r)| r).sum::<f64>() / ratings.len() as f64
        });
        let user_items = (0..trainset.num_users())
            .map(|u| trainset.user_ratings(u).iter().map(|&(i, _)| i).collect())
            .collect();

        Box::new(SlopeOneModel {
            freq,
            dev,
            user_means,
            user_items,
        })
    }
}

impl Estimator for SlopeOneModel {
    fn estimate(&self, user: InnerId, item: InnerId) -> Option<f64> {
        let relevant: Vec<InnerId> = self.user_items[user]
            .iter()
            .copied()
            .filter(|&j| self.freq[[item, j]] > 0.0)
            .collect();

        let mut estimate = self.user_means[user];
        if !relevant.is_empty() {
            let total: f64 = relevant.iter().map(|&j| self.dev[[item, j]]).sum();
            estimate += total / relevant.len() as f64;
        }
        Some(estimate)
    }
}
