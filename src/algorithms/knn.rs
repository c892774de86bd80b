use log::debug;
use ndarray::{Array1, Array2};

use super::baseline::{BaselineOptions, Baselines};
use super::similarity::{self, Measure, Orientation, SimOptions};
use super::{Algorithm, Estimator};
use crate::config::ParamReader;
use crate::dataset::{InnerId, TrainSet};
use crate::errors::EvalError;

/// How neighbour ratings are combined into an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnnVariant {
    /// Similarity-weighted average of raw ratings.
    Basic,
    /// Weighted average of deviations from each neighbour's mean.
    WithMeans,
    /// Weighted average of z-scores, rescaled to the subject's spread.
    WithZScore,
    /// Weighted average of deviations from baseline estimates.
    Baseline,
}

impl KnnVariant {
    pub fn name(self) -> &'static str {
        match self {
            KnnVariant::Basic => "knn_basic",
            KnnVariant::WithMeans => "knn_with_means",
            KnnVariant::WithZScore => "knn_with_zscore",
            KnnVariant::Baseline => "knn_baseline",
        }
    }

    fn default_measure(self) -> Measure {
        match self {
            KnnVariant::Baseline => Measure::PearsonBaseline,
            _ => Measure::Msd,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KnnParams {
    pub k: usize,
    pub min_k: usize,
    pub sim: SimOptions,
    pub baseline: BaselineOptions,
}

impl KnnParams {
    pub fn for_variant(variant: KnnVariant) -> Self {
        Self {
            k: 40,
            min_k: 1,
            sim: SimOptions::with_measure(variant.default_measure()),
            baseline: BaselineOptions::default(),
        }
    }

    pub fn read(reader: &mut ParamReader<'_>, variant: KnnVariant) -> Result<Self, EvalError> {
        let d = Self::for_variant(variant);
        let k = reader.usize(&["k"], d.k, |v| v > 0)?;
        let min_k = reader.usize(&["min_k"], d.min_k, |v| v <= k)?;
        let sim = SimOptions::read(reader, variant.default_measure())?;

        // Baseline options only matter when something consumes baselines.
        let baseline = if needs_baselines(variant, &sim) {
            BaselineOptions::read(reader)?
        } else {
            d.baseline
        };

        Ok(Self { k, min_k, sim, baseline })
    }
}

fn needs_baselines(variant: KnnVariant, sim: &SimOptions) -> bool {
    variant == KnnVariant::Baseline || sim.measure == Measure::PearsonBaseline
}

/// Neighbourhood collaborative filtering.
#[derive(Debug, Clone)]
pub struct Knn {
    variant: KnnVariant,
    params: KnnParams,
}

impl Knn {
    pub fn new(variant: KnnVariant, params: KnnParams) -> Self {
        Self { variant, params }
    }
}

struct KnnModel {
    variant: KnnVariant,
    orientation: Orientation,
    k: usize,
    min_k: usize,
    similarities: Array2<f64>,
    /// Ratings of each y entity as `(x, score)`.
    y_ratings: Vec<Vec<(InnerId, f64)>>,
    means: Array1<f64>,
    sigmas: Array1<f64>,
    baselines: Option<Baselines>,
}

impl Algorithm for Knn {
    fn name(&self) -> &'static str {
        self.variant.name()
    }

    fn fit(&self, trainset: &TrainSet) -> Box<dyn Estimator> {
        let orientation = self.params.sim.orientation();
        let baselines = needs_baselines(self.variant, &self.params.sim)
            .then(|| Baselines::compute(trainset, &self.params.baseline));

        let similarities = similarity::compute(trainset, &self.params.sim, baselines.as_ref());
        debug!(
            "{}: computed {}x{} {} similarities",
            self.name(),
            similarities.nrows(),
            similarities.ncols(),
            self.params.sim.measure.name()
        );

        let (means, sigmas) = moments(trainset, orientation);
        let y_ratings = (0..orientation.n_y(trainset))
            .map(|y| orientation.yr(trainset, y).to_vec())
            .collect();

        Box::new(KnnModel {
            variant: self.variant,
            orientation,
            k: self.params.k,
            min_k: self.params.min_k,
            similarities,
            y_ratings,
            means,
            sigmas,
            baselines,
        })
    }
}

/// Mean and population standard deviation of each x entity's ratings.
fn moments(trainset: &TrainSet, orientation: Orientation) -> (Array1<f64>, Array1<f64>) {
    let n_x = orientation.n_x(trainset);
    let means = Array1::from_shape_fn(n_x, |x| {
        let ratings = orientation.xr(trainset, x);
        ratings.iter().map(|&(_, r)| r).sum::<f64>() / ratings.len() as f64
    });
    let sigmas = Array1::from_shape_fn(n_x, |x| {
        let ratings = orientation.xr(trainset, x);
        let variance = ratings.iter().map(|&(_, r)| (r - means[x]).powi(2)).sum::<f64>()
            / ratings.len() as f64;
        variance.sqrt()
    });
    (means, sigmas)
}

impl KnnModel {
    /// The `k` most similar x entities that rated `y`, most similar first.
    fn neighbours(&self, x: InnerId, y: InnerId) -> Vec<(InnerId, f64, f64)> {
        let mut candidates: Vec<(InnerId, f64, f64)> = self.y_ratings[y]
            .iter()
            .map(|&(nb, r)| (nb, self.similarities[[x, nb]], r))
            .collect();

        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates.truncate(self.k);
        candidates
    }

    /// Deviation of a neighbour's rating from its reference point.
    fn deviation(&self, nb: InnerId, y: InnerId, r: f64) -> Option<f64> {
        match self.variant {
            KnnVariant::Basic => Some(r),
            KnnVariant::WithMeans => Some(r - self.means[nb]),
            KnnVariant::WithZScore => {
                let sigma = self.sigmas[nb];
                (sigma != 0.0).then(|| (r - self.means[nb]) / sigma)
            }
            KnnVariant::Baseline => {
                let baselines = self.baselines.as_ref()?;
                Some(r - self.orientation.baseline(baselines, nb, y))
            }
        }
    }

    fn offset(&self, x: InnerId, y: InnerId) -> f64 {
        match self.variant {
            KnnVariant::Basic => 0.0,
            KnnVariant::WithMeans | KnnVariant::WithZScore => self.means[x],
            KnnVariant::Baseline => self
                .baselines
                .as_ref()
                .map(|b| self.orientation.baseline(b, x, y))
                .unwrap_or(self.means[x]),
        }
    }
}

impl Estimator for KnnModel {
    fn estimate(&self, user: InnerId, item: InnerId) -> Option<f64> {
        let (x, y) = self.orientation.split(user, item);

        let mut sum_sim = 0.0;
        let mut sum_dev = 0.0;
        let mut actual_k = 0;
        for (nb, sim, r) in self.neighbours(x, y) {
            if sim <= 0.0 {
                continue;
            }
            if let Some(dev) = self.deviation(nb, y, r) {
                sum_sim += sim;
                sum_dev += sim * dev;
                actual_k += 1;
            }
        }

        let enough = actual_k >= self.min_k && sum_sim > 0.0;
        match self.variant {
            // nothing to fall back on but the global mean
            KnnVariant::Basic => enough.then(|| sum_dev / sum_sim),
            KnnVariant::WithZScore if enough => Some(self.offset(x, y) + self.sigmas[x] * sum_dev / sum_sim),
            _ if enough => Some(self.offset(x, y) + sum_dev / sum_sim),
            _ => Some(self.offset(x, y)),
        }
    }
}
