//! Report rendering.
//!
//! [`render`] is pure formatting of a finished [`CrossValidationReport`];
//! terminal colour is only applied by [`print_report`].

use std::fmt::Write;

use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::errors::EvalError;
use crate::evaluation::{CrossValidationReport, FoldResult, Metric};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Per-fold table with mean and standard deviation
    #[default]
    Text,
    /// Pretty-printed JSON document
    Json,
}

pub fn render(report: &CrossValidationReport, format: OutputFormat) -> Result<String, EvalError> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| EvalError::data_format(&report.algorithm, format!("cannot serialize report: {e}"))),
    }
}

const LABEL_WIDTH: usize = 8;
const METRIC_WIDTH: usize = 9;

fn render_text(report: &CrossValidationReport) -> String {
    let metric_names: Vec<&str> = report.metrics.iter().map(|m| m.name()).collect();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Evaluating {} of algorithm {} on {} split(s).",
        metric_names.join(", "),
        report.algorithm,
        report.k
    );
    let _ = writeln!(
        out,
        "{}{} ratings, {} users, {} items, seed {}",
        report.dataset.as_deref().map(|d| format!("{d}: ")).unwrap_or_default(),
        report.n_ratings,
        report.n_users,
        report.n_items,
        report.seed
    );
    out.push('\n');

    let _ = write!(out, "{:<LABEL_WIDTH$}", "");
    for name in &metric_names {
        let _ = write!(out, "{name:>METRIC_WIDTH$}");
    }
    let _ = writeln!(out, "{:>8}{:>8}{:>10}{:>10}{:>11}", "train", "test", "fit (s)", "test (s)", "fallbacks");

    for fold in &report.folds {
        render_fold(&mut out, report, fold);
    }

    render_summary(&mut out, "Mean", report, |m| report.mean.get(&m).copied());
    render_summary(&mut out, "Std", report, |m| report.std.get(&m).copied());
    out
}

fn render_fold(out: &mut String, report: &CrossValidationReport, fold: &FoldResult) {
    let _ = write!(out, "{:<LABEL_WIDTH$}", format!("Fold {}", fold.fold));
    for metric in &report.metrics {
        let _ = write!(out, "{}", metric_cell(fold.scores.get(metric).copied()));
    }
    let _ = writeln!(
        out,
        "{:>8}{:>8}{:>10.3}{:>10.3}{:>11}",
        fold.train_size, fold.test_size, fold.fit_seconds, fold.test_seconds, fold.fallbacks
    );
}

fn render_summary(
    out: &mut String,
    label: &str,
    report: &CrossValidationReport,
    value: impl Fn(Metric) -> Option<f64>,
) {
    let _ = write!(out, "{label:<LABEL_WIDTH$}");
    for &metric in &report.metrics {
        let _ = write!(out, "{}", metric_cell(value(metric)));
    }
    out.push('\n');
}

fn metric_cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:>METRIC_WIDTH$.4}"),
        None => format!("{:>METRIC_WIDTH$}", "-"),
    }
}

/// Write a rendered report to stdout, highlighting the summary rows of the
/// text format.
pub fn print_report(rendered: &str, format: OutputFormat) {
    if format == OutputFormat::Json {
        println!("{rendered}");
        return;
    }

    for (n, line) in rendered.lines().enumerate() {
        if n == 0 {
            println!("{}", line.bold());
        } else if line.starts_with("Mean") {
            println!("{}", line.green().bold());
        } else if line.starts_with("Std") {
            println!("{}", line.dimmed());
        } else {
            println!("{line}");
        }
    }
}
