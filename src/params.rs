//! Element parameter maps
//!
//! The configuration layer hands every element a `(kind, name, params)`
//! triple. Values are scalars, period-aligned sequences, flags or names.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::network::{NetworkError, Result};
use crate::periods::broadcast;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Scalar(f64),
    Series(Vec<f64>),
    Text(String),
    Null,
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(value: Vec<f64>) -> Self {
        ParamValue::Series(value)
    }
}

impl From<&[f64]> for ParamValue {
    fn from(value: &[f64]) -> Self {
        ParamValue::Series(value.to_vec())
    }
}

impl<const N: usize> From<[f64; N]> for ParamValue {
    fn from(value: [f64; N]) -> Self {
        ParamValue::Series(value.to_vec())
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParamValue::Null, Into::into)
    }
}

/// Named parameter values for one element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key).filter(|value| **value != ParamValue::Null)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fail on the first key that is not in `allowed`
    pub fn ensure_only(&self, element: &str, allowed: &[&str]) -> Result<()> {
        match self.keys().find(|key| !allowed.contains(key)) {
            Some(key) => Err(NetworkError::unsupported(element, key)),
            None => Ok(()),
        }
    }

    /// Period-aligned sequence of exactly `len` values
    ///
    /// Scalars are broadcast; sequences must already have `len` entries.
    pub fn series(&self, element: &str, key: &str, len: usize) -> Result<Option<Vec<f64>>> {
        let values = match self.get(key) {
            None => return Ok(None),
            Some(ParamValue::Scalar(value)) => vec![*value],
            Some(ParamValue::Series(values)) if values.len() == len || values.len() == 1 => {
                values.clone()
            }
            Some(ParamValue::Series(values)) => {
                return Err(NetworkError::LengthMismatch {
                    element: element.to_string(),
                    parameter: key.to_string(),
                    expected: len,
                    actual: values.len(),
                })
            }
            Some(_) => return Err(NetworkError::invalid(element, key, "expected a number or a sequence")),
        };
        if let Some(bad) = values.iter().find(|value| value.is_nan()) {
            return Err(NetworkError::invalid(element, key, format!("value {bad} is not a number")));
        }
        Ok(Some(broadcast(&values, len)))
    }

    pub fn require_series(&self, element: &str, key: &str, len: usize) -> Result<Vec<f64>> {
        self.series(element, key, len)?
            .ok_or_else(|| NetworkError::missing(element, key))
    }

    pub fn scalar(&self, element: &str, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(ParamValue::Scalar(value)) if value.is_finite() => Ok(Some(*value)),
            Some(ParamValue::Series(values)) if values.len() == 1 && values[0].is_finite() => {
                Ok(Some(values[0]))
            }
            Some(_) => Err(NetworkError::invalid(element, key, "expected a finite number")),
        }
    }

    pub fn require_scalar(&self, element: &str, key: &str) -> Result<f64> {
        self.scalar(element, key)?
            .ok_or_else(|| NetworkError::missing(element, key))
    }

    pub fn flag(&self, element: &str, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(ParamValue::Bool(value)) => Ok(Some(*value)),
            Some(_) => Err(NetworkError::invalid(element, key, "expected true or false")),
        }
    }

    pub fn text(&self, element: &str, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(ParamValue::Text(value)) if !value.is_empty() => Ok(Some(value.clone())),
            Some(_) => Err(NetworkError::invalid(element, key, "expected a non-empty name")),
        }
    }

    pub fn require_text(&self, element: &str, key: &str) -> Result<String> {
        self.text(element, key)?
            .ok_or_else(|| NetworkError::missing(element, key))
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
