pub mod hyperparams;
pub mod settings;

pub use hyperparams::{Hyperparameters, ParamReader};
pub use settings::{AppConfig, ColumnMapping, DatasetSettings, EvaluationSettings};
