use crate::evaluation::{ColdStartPolicy, Metric};
use crate::reporting::OutputFormat;

/// Shuffle seed used for fold assignment when none is given.
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_FOLDS: usize = 5;

#[derive(Debug, Clone)]
pub struct EvaluationSettings {
    pub folds: usize,
    pub seed: u64,
    pub jobs: usize,
    pub metrics: Vec<Metric>,
    pub cold_start: ColdStartPolicy,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            folds: DEFAULT_FOLDS,
            seed: DEFAULT_SEED,
            jobs: 1,
            metrics: vec![Metric::Rmse, Metric::Mae],
            cold_start: ColdStartPolicy::GlobalMean,
        }
    }
}

/// Names of the dataset columns holding the rating triple.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub user: String,
    pub item: String,
    pub score: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            user: "user_id".to_string(),
            item: "item_id".to_string(),
            score: "score".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatasetSettings {
    pub columns: ColumnMapping,
    pub delimiter: u8,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            columns: ColumnMapping::default(),
            delimiter: b',',
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub evaluation: EvaluationSettings,
    pub dataset: DatasetSettings,
    pub format: OutputFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            evaluation: EvaluationSettings::default(),
            dataset: DatasetSettings::default(),
            format: OutputFormat::Text,
        }
    }
}
