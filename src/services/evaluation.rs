use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::algorithms::AlgorithmKind;
use crate::config::Hyperparameters;
use crate::config::settings::AppConfig;
use crate::dataset;
use crate::evaluation::{CrossValidationReport, CrossValidator};
use crate::reporting;

/// Load → build → cross-validate → report, for one dataset and algorithm.
pub struct EvaluationService {
    config: AppConfig,
}

impl EvaluationService {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Run the evaluation and print the rendered report to stdout.
    pub fn run(&self, dataset_path: &Path, algorithm: &str, config_path: Option<&Path>) -> Result<()> {
        let report = self.evaluate(dataset_path, algorithm, config_path)?;
        let rendered = reporting::render(&report, self.config.format)?;
        reporting::print_report(&rendered, self.config.format);
        Ok(())
    }

    pub fn evaluate(
        &self,
        dataset_path: &Path,
        algorithm: &str,
        config_path: Option<&Path>,
    ) -> Result<CrossValidationReport> {
        info!("=== Evaluating {} on {} ===", algorithm, dataset_path.display());

        let kind = AlgorithmKind::from_name(algorithm)?;

        let params = match config_path {
            Some(path) => {
                let params = Hyperparameters::from_path(path)?;
                info!("  → Loaded hyperparameters from {}", path.display());
                params
            }
            None => Hyperparameters::empty(),
        };

        let store = dataset::load_path(dataset_path, &self.config.dataset)?;

        let seed = self.config.evaluation.seed;
        let instance = kind
            .build(&params, seed)
            .with_context(|| format!("Failed to configure {}", kind.name()))?;

        let validator = CrossValidator::new(self.config.evaluation.clone());
        let report = validator
            .run(&store, instance.as_ref())?
            .with_dataset(dataset_path.display().to_string());

        info!("=== Evaluation Complete ===");
        Ok(report)
    }
}
