use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::info;

use super::store::RatingStore;
use super::types::Rating;
use crate::config::settings::{ColumnMapping, DatasetSettings};
use crate::errors::EvalError;

/// Load a delimited ratings file into a [`RatingStore`].
pub fn load_path<P: AsRef<Path>>(
    path: P,
    settings: &DatasetSettings,
) -> Result<RatingStore, EvalError> {
    let path = path.as_ref();
    let origin = path.display().to_string();
    let file = File::open(path).map_err(|e| EvalError::DatasetRead {
        origin: origin.clone(),
        source: csv::Error::from(e),
    })?;
    load_reader(file, settings, &origin)
}

/// Load ratings from any reader; `origin` names the source in errors.
pub fn load_reader<R: Read>(
    reader: R,
    settings: &DatasetSettings,
    origin: &str,
) -> Result<RatingStore, EvalError> {
    let mut csv_reader = ReaderBuilder::new()
        .delimiter(settings.delimiter)
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| read_error(origin, None, e))?
        .clone();
    let columns = ColumnPositions::locate(&headers, &settings.columns, origin)?;

    let mut ratings = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|e| read_error(origin, Some(&headers), e))?;
        ratings.push(columns.parse(&record, origin)?);
    }

    let store = RatingStore::new(ratings, origin)?;
    log_summary(origin, &store);
    Ok(store)
}

struct ColumnPositions<'a> {
    mapping: &'a ColumnMapping,
    user: usize,
    item: usize,
    score: usize,
}

impl<'a> ColumnPositions<'a> {
    fn locate(
        headers: &StringRecord,
        mapping: &'a ColumnMapping,
        origin: &str,
    ) -> Result<Self, EvalError> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let required = [&mapping.user, &mapping.item, &mapping.score];
        let missing: Vec<&str> = required
            .iter()
            .filter(|name| position(name).is_none())
            .map(|name| name.as_str())
            .collect();

        match (position(&mapping.user), position(&mapping.item), position(&mapping.score)) {
            (Some(user), Some(item), Some(score)) => Ok(Self {
                mapping,
                user,
                item,
                score,
            }),
            _ => {
                let found: Vec<&str> = headers.iter().collect();
                Err(EvalError::data_format(
                    origin,
                    format!("missing required column(s) {:?}; found {:?}", missing, found),
                ))
            }
        }
    }

    fn parse(&self, record: &StringRecord, origin: &str) -> Result<Rating, EvalError> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let user_id = self.identifier(record, self.user, &self.mapping.user, line, origin)?;
        let item_id = self.identifier(record, self.item, &self.mapping.item, line, origin)?;
        let score = self.score(record, line, origin)?;

        Ok(Rating::new(user_id, item_id, score))
    }

    fn identifier(
        &self,
        record: &StringRecord,
        position: usize,
        column: &str,
        line: u64,
        origin: &str,
    ) -> Result<String, EvalError> {
        let value = record.get(position).unwrap_or("");
        if value.is_empty() {
            return Err(parse_error(origin, line, column, value, "a non-empty identifier"));
        }
        Ok(value.to_string())
    }

    fn score(&self, record: &StringRecord, line: u64, origin: &str) -> Result<f64, EvalError> {
        let value = record.get(self.score).unwrap_or("");
        value
            .parse::<f64>()
            .ok()
            .filter(|score| score.is_finite())
            .ok_or_else(|| parse_error(origin, line, &self.mapping.score, value, "a finite number"))
    }
}

fn parse_error(origin: &str, line: u64, column: &str, value: &str, expected: &'static str) -> EvalError {
    EvalError::Parse {
        origin: origin.to_string(),
        line,
        column: column.to_string(),
        value: value.to_string(),
        expected,
    }
}

/// Structural CSV problems are format errors, undecodable cells are parse
/// errors, anything else is a read failure.
fn read_error(origin: &str, headers: Option<&StringRecord>, err: csv::Error) -> EvalError {
    match err.kind() {
        csv::ErrorKind::UnequalLengths { pos, expected_len, len } => {
            let line = pos.as_ref().map(|p| p.line()).unwrap_or(0);
            EvalError::data_format(
                origin,
                format!("line {line} has {len} field(s), expected {expected_len}"),
            )
        }
        csv::ErrorKind::Utf8 { pos, err: utf8 } => {
            let line = pos.as_ref().map(|p| p.line()).unwrap_or(1);
            let column = headers
                .and_then(|h| h.get(utf8.field()))
                .map(str::to_string)
                .unwrap_or_else(|| format!("field {}", utf8.field() + 1));
            parse_error(origin, line, &column, "<invalid UTF-8>", "UTF-8 text")
        }
        _ => EvalError::DatasetRead {
            origin: origin.to_string(),
            source: err,
        },
    }
}

fn log_summary(origin: &str, store: &RatingStore) {
    let scale = store.scale();
    info!("Loaded {} ratings from {}", store.len(), origin);
    info!(
        "  → {} users, {} items, rating scale [{}, {}]",
        store.num_users(),
        store.num_items(),
        scale.min,
        scale.max
    );
}
