use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::warn;
use serde_json::{Map, Value};

use crate::errors::EvalError;

/// Hyperparameter document read from a JSON object file.
///
/// Keys are interpreted per algorithm through a [`ParamReader`]. Unknown keys
/// and out-of-range values are logged and ignored; a value of the wrong JSON
/// type is an error.
#[derive(Debug, Clone)]
pub struct Hyperparameters {
    source: String,
    values: Map<String, Value>,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self::empty()
    }
}

impl Hyperparameters {
    pub fn empty() -> Self {
        Self {
            source: "<defaults>".to_string(),
            values: Map::new(),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, EvalError> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let json = fs::read_to_string(path)
            .map_err(|e| EvalError::config_read(&source, e.to_string()))?;
        Self::from_json(&json, &source)
    }

    pub fn from_json(json: &str, source: &str) -> Result<Self, EvalError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| EvalError::config_read(source, e.to_string()))?;

        match value {
            Value::Object(values) => Ok(Self {
                source: source.to_string(),
                values,
            }),
            other => Err(EvalError::config_read(
                source,
                format!("expected a JSON object, found {}", json_type(&other)),
            )),
        }
    }

    /// Start reading options for `scope` (usually the algorithm name).
    pub fn reader(&self, scope: &str) -> ParamReader<'_> {
        ParamReader {
            source: &self.source,
            scope: scope.to_string(),
            values: Some(&self.values),
            recognized: BTreeSet::new(),
        }
    }
}

/// Typed, validating view over one level of a hyperparameter document.
pub struct ParamReader<'a> {
    source: &'a str,
    scope: String,
    values: Option<&'a Map<String, Value>>,
    recognized: BTreeSet<&'static str>,
}

impl<'a> ParamReader<'a> {
    pub fn usize(
        &mut self,
        keys: &[&'static str],
        default: usize,
        valid: impl Fn(usize) -> bool,
    ) -> Result<usize, EvalError> {
        let Some((key, value)) = self.lookup(keys) else {
            return Ok(default);
        };
        let parsed = match self.integer(key, value)? {
            Some(parsed) => usize::try_from(parsed).unwrap_or(usize::MAX),
            None => return Ok(self.out_of_range(key, value, default)),
        };
        Ok(self.in_range(key, parsed, default, valid(parsed)))
    }

    pub fn u64(&mut self, keys: &[&'static str], default: u64) -> Result<u64, EvalError> {
        let Some((key, value)) = self.lookup(keys) else {
            return Ok(default);
        };
        Ok(match self.integer(key, value)? {
            Some(parsed) => parsed,
            None => self.out_of_range(key, value, default),
        })
    }

    pub fn f64(
        &mut self,
        keys: &[&'static str],
        default: f64,
        valid: impl Fn(f64) -> bool,
    ) -> Result<f64, EvalError> {
        let Some((key, value)) = self.lookup(keys) else {
            return Ok(default);
        };
        let parsed = value
            .as_f64()
            .ok_or_else(|| self.type_error(key, "a number", value))?;

        Ok(self.in_range(key, parsed, default, parsed.is_finite() && valid(parsed)))
    }

    pub fn bool(&mut self, keys: &[&'static str], default: bool) -> Result<bool, EvalError> {
        let Some((key, value)) = self.lookup(keys) else {
            return Ok(default);
        };
        value
            .as_bool()
            .ok_or_else(|| self.type_error(key, "a boolean", value))
    }

    /// Read a string option restricted to `choices`.
    pub fn choice(
        &mut self,
        keys: &[&'static str],
        default: &'static str,
        choices: &[&'static str],
    ) -> Result<&'static str, EvalError> {
        let Some((key, value)) = self.lookup(keys) else {
            return Ok(default);
        };
        let text = value
            .as_str()
            .ok_or_else(|| self.type_error(key, "a string", value))?;

        let normalized = text.trim().to_lowercase();
        match choices.iter().find(|choice| **choice == normalized) {
            Some(choice) => Ok(*choice),
            None => {
                warn!(
                    "{}: {} option '{}' = {:?} is not one of {:?}, using {:?}",
                    self.source, self.scope, key, text, choices, default
                );
                Ok(default)
            }
        }
    }

    /// Nested option object such as `bsl_options` or `sim_options`.
    ///
    /// A missing section reads as empty.
    pub fn section(&mut self, key: &'static str) -> Result<ParamReader<'a>, EvalError> {
        let scope = format!("{}.{}", self.scope, key);
        let values = match self.lookup(&[key]) {
            None => None,
            Some((_, Value::Object(map))) => Some(map),
            Some((_, other)) => return Err(self.type_error(key, "an object", other)),
        };

        Ok(ParamReader {
            source: self.source,
            scope,
            values,
            recognized: BTreeSet::new(),
        })
    }

    /// Warn about every key that was never asked for and return them.
    pub fn finish(self) -> Vec<String> {
        let Some(values) = self.values else {
            return Vec::new();
        };

        let ignored: Vec<String> = values
            .keys()
            .filter(|key| !self.recognized.contains(key.as_str()))
            .cloned()
            .collect();

        for key in &ignored {
            warn!(
                "{}: ignoring unrecognized option '{}' for {}",
                self.source, key, self.scope
            );
        }
        ignored
    }

    fn lookup(&mut self, keys: &[&'static str]) -> Option<(&'static str, &'a Value)> {
        self.recognized.extend(keys.iter().copied());
        let values = self.values?;
        keys.iter()
            .find_map(|&key| values.get(key).map(|value| (key, value)))
    }

    /// Non-negative integer value of a JSON number, `None` for negative or
    /// fractional numbers. Anything but a number is a type error.
    fn integer(&self, key: &str, value: &Value) -> Result<Option<u64>, EvalError> {
        let Value::Number(number) = value else {
            return Err(self.type_error(key, "a non-negative integer", value));
        };
        if let Some(parsed) = number.as_u64() {
            return Ok(Some(parsed));
        }
        Ok(number
            .as_f64()
            .filter(|v| *v >= 0.0 && v.fract() == 0.0 && *v <= u64::MAX as f64)
            .map(|v| v as u64))
    }

    fn out_of_range<T: std::fmt::Debug>(&self, key: &str, value: &Value, default: T) -> T {
        warn!(
            "{}: {} option '{}' = {} is out of range, using default {:?}",
            self.source, self.scope, key, value, default
        );
        default
    }

    fn in_range<T: std::fmt::Debug>(&self, key: &str, value: T, default: T, valid: bool) -> T {
        if valid {
            value
        } else {
            warn!(
                "{}: {} option '{}' = {:?} is out of range, using default {:?}",
                self.source, self.scope, key, value, default
            );
            default
        }
    }

    fn type_error(&self, key: &str, expected: &str, found: &Value) -> EvalError {
        EvalError::config_read(
            self.source,
            format!(
                "{} option '{}' must be {}, found {}",
                self.scope,
                key,
                expected,
                json_type(found)
            ),
        )
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(json: &str) -> Hyperparameters {
        Hyperparameters::from_json(json, "params.json").unwrap()
    }

    #[test]
    fn test_defaults_when_key_absent() {
        let doc = params("{}");
        let mut reader = doc.reader("svd");

        assert_eq!(reader.usize(&["n_factors"], 20, |v| v > 0).unwrap(), 20);
        assert_eq!(reader.f64(&["learning_rate"], 0.005, |v| v > 0.0).unwrap(), 0.005);
        assert!(reader.finish().is_empty());
    }

    #[test]
    fn test_alias_is_accepted() {
        let doc = params(r#"{"lr_all": 0.01}"#);
        let mut reader = doc.reader("svd");

        let lr = reader.f64(&["learning_rate", "lr_all"], 0.005, |v| v > 0.0).unwrap();

        assert_eq!(lr, 0.01);
        assert!(reader.finish().is_empty());
    }

    #[test]
    fn test_unknown_keys_are_reported_not_rejected() {
        let doc = params(r#"{"n_factors": 8, "verbose": true}"#);
        let mut reader = doc.reader("svd");

        assert_eq!(reader.usize(&["n_factors"], 20, |v| v > 0).unwrap(), 8);
        assert_eq!(reader.finish(), vec!["verbose".to_string()]);
    }

    #[test]
    fn test_out_of_range_falls_back_to_default() {
        let doc = params(r#"{"n_factors": 0, "learning_rate": -1.0}"#);
        let mut reader = doc.reader("svd");

        assert_eq!(reader.usize(&["n_factors"], 20, |v| v > 0).unwrap(), 20);
        assert_eq!(reader.f64(&["learning_rate"], 0.005, |v| v > 0.0).unwrap(), 0.005);
    }

    #[test]
    fn test_negative_and_fractional_integers_fall_back_to_default() {
        let doc = params(r#"{"n_factors": -1, "n_epochs": 2.5, "random_state": -7}"#);
        let mut reader = doc.reader("svd");

        assert_eq!(reader.usize(&["n_factors"], 20, |v| v > 0).unwrap(), 20);
        assert_eq!(reader.usize(&["n_epochs"], 20, |v| v > 0).unwrap(), 20);
        assert_eq!(reader.u64(&["random_state"], 42).unwrap(), 42);
    }

    #[test]
    fn test_integral_float_is_accepted_as_integer() {
        let doc = params(r#"{"n_epochs": 30.0}"#);
        let mut reader = doc.reader("svd");

        assert_eq!(reader.usize(&["n_epochs"], 20, |v| v > 0).unwrap(), 30);
    }

    #[test]
    fn test_wrong_type_is_config_error() {
        let doc = params(r#"{"n_factors": "many"}"#);
        let mut reader = doc.reader("svd");

        let err = reader.usize(&["n_factors"], 20, |v| v > 0).unwrap_err();

        assert_eq!(err.kind(), "ConfigReadError");
        assert!(err.to_string().contains("n_factors"));
    }

    #[test]
    fn test_nested_section() {
        let doc = params(r#"{"sim_options": {"name": "Cosine", "user_based": false, "extra": 1}}"#);
        let mut reader = doc.reader("knn_basic");
        let mut sim = reader.section("sim_options").unwrap();

        assert_eq!(sim.choice(&["name"], "msd", &["msd", "cosine"]).unwrap(), "cosine");
        assert!(!sim.bool(&["user_based"], true).unwrap());
        assert_eq!(sim.finish(), vec!["extra".to_string()]);
        assert!(reader.finish().is_empty());
    }

    #[test]
    fn test_non_object_document_is_rejected() {
        let err = Hyperparameters::from_json("[1, 2]", "params.json").unwrap_err();
        assert_eq!(err.kind(), "ConfigReadError");
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let err = Hyperparameters::from_json("{n_factors: 3", "params.json").unwrap_err();
        assert_eq!(err.kind(), "ConfigReadError");
    }
}
