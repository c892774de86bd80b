use super::Algorithm;
use super::baseline::{BaselineOnly, BaselineOnlyParams};
use super::knn::{Knn, KnnParams, KnnVariant};
use super::nmf::{Nmf, NmfParams};
use super::normal::{NormalParams, NormalPredictor};
use super::slope_one::SlopeOne;
use super::svd::{Svd, SvdParams};
use crate::config::{Hyperparameters, ParamReader};
use crate::errors::EvalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmKind {
    NormalPredictor,
    BaselineOnly,
    Svd,
    Nmf,
    KnnBasic,
    KnnWithMeans,
    KnnWithZScore,
    KnnBaseline,
    SlopeOne,
}

/// One entry of [`REGISTRY`].
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub name: &'static str,
    pub kind: AlgorithmKind,
    pub summary: &'static str,
    /// `(option, default)` pairs accepted in the hyperparameter file.
    pub options: &'static [(&'static str, &'static str)],
}

const KNN_OPTIONS: &[(&str, &str)] = &[
    ("k", "40"),
    ("min_k", "1"),
    ("sim_options.name", "msd"),
    ("sim_options.user_based", "true"),
    ("sim_options.min_support", "1"),
    ("sim_options.shrinkage", "100"),
];

pub const REGISTRY: &[Registration] = &[
    Registration {
        name: "normal_predictor",
        kind: AlgorithmKind::NormalPredictor,
        summary: "random draw from a normal fitted to the training ratings",
        options: &[("random_state", "evaluation seed")],
    },
    Registration {
        name: "baseline_only",
        kind: AlgorithmKind::BaselineOnly,
        summary: "global mean plus user and item biases",
        options: &[
            ("biases", "true"),
            ("method", "als"),
            ("n_epochs", "10 (als) / 20 (sgd)"),
            ("reg_u", "15"),
            ("reg_i", "10"),
            ("learning_rate", "0.005"),
            ("reg", "0.02"),
            ("tolerance", "0.0001"),
        ],
    },
    Registration {
        name: "svd",
        kind: AlgorithmKind::Svd,
        summary: "biased matrix factorization trained by SGD",
        options: &[
            ("n_factors", "20"),
            ("n_epochs", "20"),
            ("learning_rate | lr_all", "0.005"),
            ("regularization | reg_all", "0.02"),
            ("biased", "true"),
            ("init_mean", "0"),
            ("init_std_dev", "0.1"),
            ("random_state", "evaluation seed"),
        ],
    },
    Registration {
        name: "nmf",
        kind: AlgorithmKind::Nmf,
        summary: "non-negative matrix factorization",
        options: &[
            ("n_factors", "15"),
            ("n_epochs", "50"),
            ("reg_pu", "0.06"),
            ("reg_qi", "0.06"),
            ("init_low", "0"),
            ("init_high", "1"),
            ("random_state", "evaluation seed"),
        ],
    },
    Registration {
        name: "knn_basic",
        kind: AlgorithmKind::KnnBasic,
        summary: "k nearest neighbours, weighted average of ratings",
        options: KNN_OPTIONS,
    },
    Registration {
        name: "knn_with_means",
        kind: AlgorithmKind::KnnWithMeans,
        summary: "k nearest neighbours on mean-centred ratings",
        options: KNN_OPTIONS,
    },
    Registration {
        name: "knn_with_zscore",
        kind: AlgorithmKind::KnnWithZScore,
        summary: "k nearest neighbours on z-scored ratings",
        options: KNN_OPTIONS,
    },
    Registration {
        name: "knn_baseline",
        kind: AlgorithmKind::KnnBaseline,
        summary: "k nearest neighbours on baseline residuals",
        options: &[
            ("k", "40"),
            ("min_k", "1"),
            ("sim_options.name", "pearson_baseline"),
            ("sim_options.user_based", "true"),
            ("sim_options.min_support", "1"),
            ("sim_options.shrinkage", "100"),
            ("bsl_options", "as baseline_only"),
        ],
    },
    Registration {
        name: "slope_one",
        kind: AlgorithmKind::SlopeOne,
        summary: "slope one over average item rating differences",
        options: &[],
    },
];

impl AlgorithmKind {
    /// Look up a registered algorithm, ignoring case and surrounding whitespace.
    pub fn from_name(name: &str) -> Result<Self, EvalError> {
        let normalized = name.trim().to_lowercase();
        REGISTRY
            .iter()
            .find(|registration| registration.name == normalized)
            .map(|registration| registration.kind)
            .ok_or_else(|| EvalError::UnknownAlgorithm {
                name: name.to_string(),
            })
    }

    pub fn registration(self) -> &'static Registration {
        REGISTRY
            .iter()
            .find(|registration| registration.kind == self)
            .unwrap_or_else(|| unreachable!("{self:?} is missing from the registry"))
    }

    pub fn name(self) -> &'static str {
        self.registration().name
    }

    /// Construct the algorithm from the hyperparameter document.
    ///
    /// `seed` is the default `random_state` of the stochastic algorithms.
    pub fn build(self, params: &Hyperparameters, seed: u64) -> Result<Box<dyn Algorithm>, EvalError> {
        let mut reader = params.reader(self.name());

        let algorithm: Box<dyn Algorithm> = match self {
            AlgorithmKind::NormalPredictor => {
                Box::new(NormalPredictor::new(NormalParams::read(&mut reader, seed)?))
            }
            AlgorithmKind::BaselineOnly => {
                Box::new(BaselineOnly::new(BaselineOnlyParams::read(&mut reader)?))
            }
            AlgorithmKind::Svd => Box::new(Svd::new(SvdParams::read(&mut reader, seed)?)),
            AlgorithmKind::Nmf => Box::new(Nmf::new(NmfParams::read(&mut reader, seed)?)),
            AlgorithmKind::KnnBasic => knn(&mut reader, KnnVariant::Basic)?,
            AlgorithmKind::KnnWithMeans => knn(&mut reader, KnnVariant::WithMeans)?,
            AlgorithmKind::KnnWithZScore => knn(&mut reader, KnnVariant::WithZScore)?,
            AlgorithmKind::KnnBaseline => knn(&mut reader, KnnVariant::Baseline)?,
            AlgorithmKind::SlopeOne => Box::new(SlopeOne),
        };

        reader.finish();
        Ok(algorithm)
    }
}

fn knn(
    reader: &mut ParamReader<'_>,
    variant: KnnVariant,
) -> Result<Box<dyn Algorithm>, EvalError> {
    Ok(Box::new(Knn::new(variant, KnnParams::read(reader, variant)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_registered_name_resolves() {
        for registration in REGISTRY {
            let kind = AlgorithmKind::from_name(registration.name).unwrap();
            assert_eq!(kind, registration.kind);
            assert_eq!(kind.name(), registration.name);
        }
    }

    #[test]
    fn test_lookup_ignores_case_and_whitespace() {
        assert_eq!(AlgorithmKind::from_name("  SVD ").unwrap(), AlgorithmKind::Svd);
        assert_eq!(
            AlgorithmKind::from_name("KNN_Baseline").unwrap(),
            AlgorithmKind::KnnBaseline
        );
    }

    #[test]
    fn test_unknown_name_is_reported() {
        let err = AlgorithmKind::from_name("svdzzz").unwrap_err();

        assert_eq!(err.kind(), "UnknownAlgorithmError");
        match err {
            EvalError::UnknownAlgorithm { name } => assert_eq!(name, "svdzzz"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unimplemented_names_are_unknown() {
        for name in ["svdpp", "co_clustering"] {
            assert!(AlgorithmKind::from_name(name).is_err());
        }
    }

    #[test]
    fn test_built_algorithm_reports_its_name() {
        let params = Hyperparameters::empty();
        for registration in REGISTRY {
            let algorithm = registration.kind.build(&params, 42).unwrap();
            assert_eq!(algorithm.name(), registration.name);
        }
    }

    #[test]
    fn test_build_rejects_mistyped_option() {
        let params = Hyperparameters::from_json(r#"{"n_epochs": "ten"}"#, "p.json").unwrap();

        let err = AlgorithmKind::Svd.build(&params, 42).err().unwrap();

        assert_eq!(err.kind(), "ConfigReadError");
    }

    #[test]
    fn test_build_defaults_negative_integer_option() {
        let params = Hyperparameters::from_json(r#"{"n_factors": -1, "n_epochs": 20.0}"#, "p.json").unwrap();
        let mut reader = params.reader("svd");

        let svd = SvdParams::read(&mut reader, 42).unwrap();

        assert_eq!(svd.n_factors, 20);
        assert_eq!(svd.n_epochs, 20);
        assert!(AlgorithmKind::Svd.build(&params, 42).is_ok());
    }

    #[test]
    fn test_build_ignores_unknown_option() {
        let params = Hyperparameters::from_json(r#"{"verbose": true}"#, "p.json").unwrap();
        assert!(AlgorithmKind::SlopeOne.build(&params, 42).is_ok());
    }
}
