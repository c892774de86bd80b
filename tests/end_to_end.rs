use std::fs;
use std::path::{Path, PathBuf};

use recsys_eval::EvalError;
use recsys_eval::algorithms::REGISTRY;
use recsys_eval::config::settings::AppConfig;
use recsys_eval::evaluation::{ColdStartPolicy, Metric};
use recsys_eval::reporting::{self, OutputFormat};
use recsys_eval::services::EvaluationService;
use tempfile::tempdir;

fn write_ratings(dir: &Path) -> PathBuf {
    let mut csv = String::from("user_id,item_id,score,timestamp\n");
    for u in 0..12 {
        for i in 0..8 {
            if (u + i) % 3 != 0 {
                let score = 1 + (u * 7 + i * 3) % 5;
                csv.push_str(&format!("user{u},item{i},{score},0\n"));
            }
        }
    }
    let path = dir.join("ratings.csv");
    fs::write(&path, csv).unwrap();
    path
}

fn eval_error(err: &anyhow::Error) -> &EvalError {
    err.downcast_ref::<EvalError>().expect("typed evaluation error")
}

#[test]
fn every_registered_algorithm_completes() {
    let dir = tempdir().unwrap();
    let dataset = write_ratings(dir.path());
    let service = EvaluationService::new(AppConfig::new());

    for registration in REGISTRY {
        let report = service.evaluate(&dataset, registration.name, None).unwrap();

        assert_eq!(report.algorithm, registration.name);
        assert_eq!(report.folds.len(), 5);
        let rmse = report.mean[&Metric::Rmse];
        let mae = report.mean[&Metric::Mae];
        assert!(rmse.is_finite() && rmse + 1e-9 >= mae, "{}: rmse {rmse} mae {mae}", registration.name);
        assert!(rmse <= 4.0, "{}: rmse {rmse}", registration.name);
    }
}

#[test]
fn hyperparameter_file_is_applied() {
    let dir = tempdir().unwrap();
    let dataset = write_ratings(dir.path());
    let params = dir.path().join("params.json");
    fs::write(&params, r#"{"biases": false, "unused": 3}"#).unwrap();

    let service = EvaluationService::new(AppConfig::new());
    let report = service.evaluate(&dataset, "baseline_only", Some(&params)).unwrap();
    let rendered = reporting::render(&report, OutputFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

    assert_eq!(value["algorithm"], "baseline_only");
    assert_eq!(value["folds"].as_array().unwrap().len(), 5);
}

#[test]
fn same_seed_gives_same_report() {
    let dir = tempdir().unwrap();
    let dataset = write_ratings(dir.path());
    let service = EvaluationService::new(AppConfig::new());

    let first = service.evaluate(&dataset, "svd", None).unwrap();
    let second = service.evaluate(&dataset, "svd", None).unwrap();

    assert_eq!(first.mean, second.mean);
    assert_eq!(first.folds.len(), second.folds.len());
    for (a, b) in first.folds.iter().zip(&second.folds) {
        assert_eq!(a.scores, b.scores);
        assert_eq!(a.test_size, b.test_size);
    }
}

#[test]
fn unknown_algorithm_is_typed() {
    let dir = tempdir().unwrap();
    let dataset = write_ratings(dir.path());
    let service = EvaluationService::new(AppConfig::new());

    let err = service.evaluate(&dataset, "svdzzz", None).unwrap_err();

    assert_eq!(eval_error(&err).kind(), "UnknownAlgorithmError");
    assert!(err.to_string().contains("svdzzz"));
}

#[test]
fn missing_dataset_is_typed() {
    let dir = tempdir().unwrap();
    let service = EvaluationService::new(AppConfig::new());

    let err = service.evaluate(&dir.path().join("absent.csv"), "svd", None).unwrap_err();

    assert_eq!(eval_error(&err).kind(), "DatasetReadError");
}

#[test]
fn mistyped_hyperparameter_is_typed() {
    let dir = tempdir().unwrap();
    let dataset = write_ratings(dir.path());
    let params = dir.path().join("params.json");
    fs::write(&params, r#"{"n_factors": "twenty"}"#).unwrap();

    let service = EvaluationService::new(AppConfig::new());
    let err = service.evaluate(&dataset, "svd", Some(&params)).unwrap_err();

    assert_eq!(eval_error(&err).kind(), "ConfigReadError");
}

#[test]
fn reject_policy_fails_on_cold_start() {
    let dir = tempdir().unwrap();
    let dataset = dir.path().join("ratings.csv");
    fs::write(
        &dataset,
        "user_id,item_id,score\na,x,4\na,y,3\nb,x,5\nb,y,2\nc,z,1\n",
    )
    .unwrap();

    let mut config = AppConfig::new();
    config.evaluation.folds = 2;
    config.evaluation.cold_start = ColdStartPolicy::Reject;
    let err = EvaluationService::new(config)
        .evaluate(&dataset, "baseline_only", None)
        .unwrap_err();

    assert_eq!(eval_error(&err).kind(), "InsufficientDataError");
    assert!(err.to_string().contains("fold"));
}

#[test]
fn custom_columns_and_delimiter() {
    let dir = tempdir().unwrap();
    let dataset = dir.path().join("ratings.tsv");
    let mut tsv = String::from("who\twhat\tstars\n");
    for u in 0..6 {
        for i in 0..4 {
            tsv.push_str(&format!("u{u}\ti{i}\t{}\n", 1 + (u + i) % 5));
        }
    }
    fs::write(&dataset, tsv).unwrap();

    let mut config = AppConfig::new();
    config.dataset.delimiter = b'\t';
    config.dataset.columns.user = "who".to_string();
    config.dataset.columns.item = "what".to_string();
    config.dataset.columns.score = "stars".to_string();
    config.evaluation.folds = 3;

    let report = EvaluationService::new(config)
        .evaluate(&dataset, "slope_one", None)
        .unwrap();

    assert_eq!(report.n_ratings, 24);
    assert_eq!(report.k, 3);
}
