use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One held-out rating and the prediction made for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scored<'a> {
    pub user: &'a str,
    pub actual: f64,
    pub estimate: f64,
}

impl Scored<'_> {
    pub fn error(&self) -> f64 {
        self.estimate - self.actual
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Root mean squared error
    Rmse,
    /// Mean absolute error
    Mae,
    /// Mean squared error
    Mse,
    /// Fraction of concordant pairs
    Fcp,
}

impl Metric {
    pub fn name(self) -> &'static str {
        match self {
            Metric::Rmse => "RMSE",
            Metric::Mae => "MAE",
            Metric::Mse => "MSE",
            Metric::Fcp => "FCP",
        }
    }

    /// Value of the metric over `predictions`, or `None` when it is undefined
    /// (no predictions, or no comparable pairs for FCP).
    pub fn compute(self, predictions: &[Scored<'_>]) -> Option<f64> {
        if predictions.is_empty() {
            return None;
        }
        let n = predictions.len() as f64;

        match self {
            Metric::Mse => Some(predictions.iter().map(|p| p.error().powi(2)).sum::<f64>() / n),
            Metric::Rmse => Metric::Mse.compute(predictions).map(f64::sqrt),
            Metric::Mae => Some(predictions.iter().map(|p| p.error().abs()).sum::<f64>() / n),
            Metric::Fcp => fcp(predictions),
        }
    }
}

/// Per-user concordant and discordant pair counts, averaged over users.
fn fcp(predictions: &[Scored<'_>]) -> Option<f64> {
    let mut by_user: BTreeMap<&str, Vec<(f64, f64)>> = BTreeMap::new();
    for p in predictions {
        by_user.entry(p.user).or_default().push((p.actual, p.estimate));
    }

    let mut concordant = 0.0;
    let mut discordant = 0.0;
    for ratings in by_user.values() {
        for &(actual_i, est_i) in ratings {
            for &(actual_j, est_j) in ratings {
                if actual_i > actual_j {
                    if est_i > est_j {
                        concordant += 1.0;
                    } else {
                        discordant += 1.0;
                    }
                }
            }
        }
    }

    let users = by_user.len() as f64;
    let (concordant, discordant) = (concordant / users, discordant / users);
    let total = concordant + discordant;
    (total > 0.0).then(|| concordant / total)
}
