use thiserror::Error;

/// Errors surfaced by the evaluation pipeline.
///
/// Every variant carries the offending value so the caller can report it
/// without re-deriving context.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("{origin}: {detail}")]
    DataFormat { origin: String, detail: String },

    #[error("{origin}, line {line}: cannot read {value:?} in column '{column}' as {expected}")]
    Parse {
        origin: String,
        line: u64,
        column: String,
        value: String,
        expected: &'static str,
    },

    #[error("{origin} contains no ratings")]
    EmptyDataset { origin: String },

    #[error("failed to read dataset {origin}")]
    DatasetRead {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("unknown algorithm {name:?}")]
    UnknownAlgorithm { name: String },

    #[error("failed to read hyperparameters from {path}: {detail}")]
    ConfigRead { path: String, detail: String },

    #[error("{detail}")]
    InsufficientData { fold: Option<usize>, detail: String },
}

impl EvalError {
    /// Stable name of the error kind, used in CLI diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::DataFormat { .. } => "DataFormatError",
            EvalError::Parse { .. } => "ParseError",
            EvalError::EmptyDataset { .. } => "EmptyDatasetError",
            EvalError::DatasetRead { .. } => "DatasetReadError",
            EvalError::UnknownAlgorithm { .. } => "UnknownAlgorithmError",
            EvalError::ConfigRead { .. } => "ConfigReadError",
            EvalError::InsufficientData { .. } => "InsufficientDataError",
        }
    }

    pub fn data_format(origin: &str, detail: impl Into<String>) -> Self {
        EvalError::DataFormat {
            origin: origin.to_string(),
            detail: detail.into(),
        }
    }

    pub fn config_read(path: &str, detail: impl Into<String>) -> Self {
        EvalError::ConfigRead {
            path: path.to_string(),
            detail: detail.into(),
        }
    }

    pub fn insufficient(detail: impl Into<String>) -> Self {
        EvalError::InsufficientData {
            fold: None,
            detail: detail.into(),
        }
    }

    pub fn insufficient_in_fold(fold: usize, detail: impl Into<String>) -> Self {
        EvalError::InsufficientData {
            fold: Some(fold),
            detail: format!("fold {}: {}", fold + 1, detail.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_algorithm_names_offender() {
        let err = EvalError::UnknownAlgorithm {
            name: "svdzzz".to_string(),
        };

        assert_eq!(err.kind(), "UnknownAlgorithmError");
        assert!(err.to_string().contains("\"svdzzz\""));
    }

    #[test]
    fn test_fold_errors_are_one_based_in_messages() {
        let err = EvalError::insufficient_in_fold(2, "user 'u9' has no training ratings");

        match &err {
            EvalError::InsufficientData { fold, detail } => {
                assert_eq!(*fold, Some(2));
                assert!(detail.starts_with("fold 3:"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
