pub mod cross_validation;
pub mod folds;
pub mod metrics;

pub use cross_validation::{ColdStartPolicy, CrossValidationReport, CrossValidator, FoldResult};
pub use folds::Folds;
pub use metrics::{Metric, Scored};
