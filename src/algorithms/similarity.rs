use ndarray::Array2;

use super::baseline::Baselines;
use crate::config::ParamReader;
use crate::dataset::{InnerId, TrainSet};
use crate::errors::EvalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Msd,
    Cosine,
    Pearson,
    PearsonBaseline,
}

impl Measure {
    const NAMES: [&'static str; 4] = ["msd", "cosine", "pearson", "pearson_baseline"];

    pub fn name(self) -> &'static str {
        match self {
            Measure::Msd => "msd",
            Measure::Cosine => "cosine",
            Measure::Pearson => "pearson",
            Measure::PearsonBaseline => "pearson_baseline",
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "cosine" => Measure::Cosine,
            "pearson" => Measure::Pearson,
            "pearson_baseline" => Measure::PearsonBaseline,
            _ => Measure::Msd,
        }
    }
}

/// The `sim_options` of the neighbourhood algorithms.
#[derive(Debug, Clone, PartialEq)]
pub struct SimOptions {
    pub measure: Measure,
    pub user_based: bool,
    pub min_support: usize,
    pub shrinkage: f64,
}

impl SimOptions {
    pub fn with_measure(measure: Measure) -> Self {
        Self {
            measure,
            user_based: true,
            min_support: 1,
            shrinkage: 100.0,
        }
    }

    pub fn read(reader: &mut ParamReader<'_>, default_measure: Measure) -> Result<Self, EvalError> {
        let d = Self::with_measure(default_measure);
        let mut section = reader.section("sim_options")?;
        let options = Self {
            measure: Measure::from_name(section.choice(&["name"], d.measure.name(), &Measure::NAMES)?),
            user_based: section.bool(&["user_based"], d.user_based)?,
            min_support: section.usize(&["min_support"], d.min_support, |_| true)?,
            shrinkage: section.f64(&["shrinkage"], d.shrinkage, |v| v >= 0.0)?,
        };
        section.finish();
        Ok(options)
    }

    pub fn orientation(&self) -> Orientation {
        Orientation {
            user_based: self.user_based,
        }
    }
}

/// Which side of the rating matrix plays "x" (the entities compared) and
/// which plays "y" (the entities they are compared over).
#[derive(Debug, Clone, Copy)]
pub struct Orientation {
    pub user_based: bool,
}

impl Orientation {
    pub fn n_x(self, trainset: &TrainSet) -> usize {
        if self.user_based { trainset.num_users() } else { trainset.num_items() }
    }

    pub fn n_y(self, trainset: &TrainSet) -> usize {
        if self.user_based { trainset.num_items() } else { trainset.num_users() }
    }

    /// Ratings of `x` as `(y, score)`.
    pub fn xr(self, trainset: &TrainSet, x: InnerId) -> &[(InnerId, f64)] {
        if self.user_based { trainset.user_ratings(x) } else { trainset.item_ratings(x) }
    }

    /// Ratings given to/by `y` as `(x, score)`.
    pub fn yr(self, trainset: &TrainSet, y: InnerId) -> &[(InnerId, f64)] {
        if self.user_based { trainset.item_ratings(y) } else { trainset.user_ratings(y) }
    }

    /// `(x, y)` for a `(user, item)` request.
    pub fn split(self, user: InnerId, item: InnerId) -> (InnerId, InnerId) {
        if self.user_based { (user, item) } else { (item, user) }
    }

    pub fn baseline(self, baselines: &Baselines, x: InnerId, y: InnerId) -> f64 {
        let (user, item) = self.split(x, y);
        baselines.baseline(user, item)
    }
}

/// Co-rating statistics for every ordered pair `(a, b)` of x entities.
struct PairStats {
    freq: Array2<f64>,
    prods: Array2<f64>,
    sq_a: Array2<f64>,
    sq_b: Array2<f64>,
    sum_a: Array2<f64>,
    sum_b: Array2<f64>,
    sq_diff: Array2<f64>,
}

impl PairStats {
    fn new(n: usize) -> Self {
        Self {
            freq: Array2::zeros((n, n)),
            prods: Array2::zeros((n, n)),
            sq_a: Array2::zeros((n, n)),
            sq_b: Array2::zeros((n, n)),
            sum_a: Array2::zeros((n, n)),
            sum_b: Array2::zeros((n, n)),
            sq_diff: Array2::zeros((n, n)),
        }
    }

    fn add(&mut self, a: InnerId, ra: f64, b: InnerId, rb: f64) {
        self.freq[[a, b]] += 1.0;
        self.prods[[a, b]] += ra * rb;
        self.sq_a[[a, b]] += ra * ra;
        self.sq_b[[a, b]] += rb * rb;
        self.sum_a[[a, b]] += ra;
        self.sum_b[[a, b]] += rb;
        self.sq_diff[[a, b]] += (ra - rb) * (ra - rb);
    }
}

/// Symmetric `n_x × n_x` similarity matrix with ones on the diagonal.
///
/// Pairs sharing fewer than `min_support` co-rated entities get zero.
/// `baselines` is required for [`Measure::PearsonBaseline`].
pub fn compute(trainset: &TrainSet, options: &SimOptions, baselines: Option<&Baselines>) -> Array2<f64> {
    let orientation = options.orientation();
    let n_x = orientation.n_x(trainset);
    let mut stats = PairStats::new(n_x);

    let value = |x: InnerId, y: InnerId, r: f64| match (options.measure, baselines) {
        (Measure::PearsonBaseline, Some(b)) => r - orientation.baseline(b, x, y),
        _ => r,
    };

    for y in 0..orientation.n_y(trainset) {
        let ratings = orientation.yr(trainset, y);
        for &(a, ra) in ratings {
            for &(b, rb) in ratings {
                if a != b {
                    stats.add(a, value(a, y, ra), b, value(b, y, rb));
                }
            }
        }
    }

    let min_support = options.min_support as f64;
    Array2::from_shape_fn((n_x, n_x), |(a, b)| {
        if a == b {
            return 1.0;
        }
        let freq = stats.freq[[a, b]];
        if freq < min_support.max(1.0) {
            return 0.0;
        }
        pair_similarity(options, &stats, a, b, freq)
    })
}

fn pair_similarity(options: &SimOptions, stats: &PairStats, a: InnerId, b: InnerId, freq: f64) -> f64 {
    let idx = [a, b];
    match options.measure {
        Measure::Msd => 1.0 / (stats.sq_diff[idx] / freq + 1.0),
        Measure::Cosine => ratio(stats.prods[idx], (stats.sq_a[idx] * stats.sq_b[idx]).sqrt()),
        Measure::Pearson => {
            let num = freq * stats.prods[idx] - stats.sum_a[idx] * stats.sum_b[idx];
            let var_a = freq * stats.sq_a[idx] - stats.sum_a[idx].powi(2);
            let var_b = freq * stats.sq_b[idx] - stats.sum_b[idx].powi(2);
            ratio(num, (var_a * var_b).max(0.0).sqrt())
        }
        Measure::PearsonBaseline => {
            let sim = ratio(stats.prods[idx], (stats.sq_a[idx] * stats.sq_b[idx]).sqrt());
            sim * (freq - 1.0) / (freq - 1.0 + options.shrinkage)
        }
    }
}

fn ratio(num: f64, denom: f64) -> f64 {
    if denom > 0.0 { num / denom } else { 0.0 }
}
