//! Parameter normalization.
//!
//! Every entry point accepts anything implementing [`IntoParameters`]: an explicit
//! list of [`Parameter`]s, positional [`RowValues`], a property bag (any
//! `serde::Serialize` value that serializes to an object, wrapped in [`Bag`]), or
//! nothing at all (`()`).
//!
//! ```rust
//! use sql_helper::prelude::*;
//! use serde_json::json;
//!
//! let params = Bag(json!({ "x": 5, "id": 1 })).into_parameters()?;
//! assert_eq!(params[0].name, "x");
//! assert_eq!(params[1].value, RowValues::Int(1));
//! # Ok::<(), SqlHelperError>(())
//! ```

use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::SqlHelperError;
use crate::types::RowValues;

/// Characters accepted in front of a parameter name and stripped during normalization.
pub(crate) const NAME_MARKERS: &[char] = &['@', ':', '$', '?'];

/// Direction of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
}

/// One named value bound to a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: RowValues,
    pub direction: ParameterDirection,
}

impl Parameter {
    /// Input parameter. A leading `@`, `:` or `$` on `name` is dropped.
    pub fn new(name: impl Into<String>, value: impl Into<RowValues>) -> Self {
        Self {
            name: normalize_name(&name.into()),
            value: value.into(),
            direction: ParameterDirection::Input,
        }
    }

    #[must_use]
    pub fn with_direction(mut self, direction: ParameterDirection) -> Self {
        self.direction = direction;
        self
    }
}

/// Wrapper marking a serializable value as a property bag.
///
/// Each top-level field becomes one parameter named after the field, in
/// declaration order.
#[derive(Debug, Clone)]
pub struct Bag<T>(pub T);

/// Conversion into the canonical ordered parameter list.
pub trait IntoParameters {
    /// # Errors
    /// Returns `SqlHelperError::UnsupportedParameterType` when a bag field is not a scalar.
    fn into_parameters(self) -> Result<Vec<Parameter>, SqlHelperError>;
}

impl IntoParameters for () {
    fn into_parameters(self) -> Result<Vec<Parameter>, SqlHelperError> {
        Ok(Vec::new())
    }
}

impl IntoParameters for Vec<Parameter> {
    fn into_parameters(self) -> Result<Vec<Parameter>, SqlHelperError> {
        Ok(self
            .into_iter()
            .enumerate()
            .map(|(idx, mut p)| {
                p.name = if p.name.is_empty() {
                    positional_name(idx)
                } else {
                    normalize_name(&p.name)
                };
                p
            })
            .collect())
    }
}

impl IntoParameters for &[Parameter] {
    fn into_parameters(self) -> Result<Vec<Parameter>, SqlHelperError> {
        self.to_vec().into_parameters()
    }
}

impl<const N: usize> IntoParameters for [Parameter; N] {
    fn into_parameters(self) -> Result<Vec<Parameter>, SqlHelperError> {
        Vec::from(self).into_parameters()
    }
}

impl IntoParameters for Vec<RowValues> {
    fn into_parameters(self) -> Result<Vec<Parameter>, SqlHelperError> {
        Ok(self
            .into_iter()
            .enumerate()
            .map(|(idx, value)| Parameter {
                name: positional_name(idx),
                value,
                direction: ParameterDirection::Input,
            })
            .collect())
    }
}

impl IntoParameters for &[RowValues] {
    fn into_parameters(self) -> Result<Vec<Parameter>, SqlHelperError> {
        self.to_vec().into_parameters()
    }
}

impl<const N: usize> IntoParameters for [RowValues; N] {
    fn into_parameters(self) -> Result<Vec<Parameter>, SqlHelperError> {
        Vec::from(self).into_parameters()
    }
}

impl<T: IntoParameters> IntoParameters for Option<T> {
    fn into_parameters(self) -> Result<Vec<Parameter>, SqlHelperError> {
        self.map_or_else(|| Ok(Vec::new()), IntoParameters::into_parameters)
    }
}

impl<T: Serialize> IntoParameters for Bag<T> {
    fn into_parameters(self) -> Result<Vec<Parameter>, SqlHelperError> {
        let value = serde_json::to_value(&self.0).map_err(|e| {
            SqlHelperError::ParameterError(format!("cannot serialize parameter bag: {e}"))
        })?;
        bag_to_parameters(value)
    }
}

/// Normalize anything accepted by the entry points.
///
/// # Errors
/// Propagates the conversion error of the input.
pub fn normalize(raw: impl IntoParameters) -> Result<Vec<Parameter>, SqlHelperError> {
    raw.into_parameters()
}

fn bag_to_parameters(value: JsonValue) -> Result<Vec<Parameter>, SqlHelperError> {
    let map = match value {
        JsonValue::Null => return Ok(Vec::new()),
        JsonValue::Object(map) => map,
        other => {
            return Err(SqlHelperError::UnsupportedParameterType {
                name: "<root>".to_string(),
                kind: json_kind(&other).to_string(),
            });
        }
    };

    let mut params = Vec::with_capacity(map.len());
    for (name, field) in map {
        let value = json_scalar(&name, field)?;
        params.push(Parameter {
            name: normalize_name(&name),
            value,
            direction: ParameterDirection::Input,
        });
    }
    Ok(params)
}

fn json_scalar(name: &str, value: JsonValue) -> Result<RowValues, SqlHelperError> {
    match value {
        JsonValue::Null => Ok(RowValues::Null),
        JsonValue::Bool(b) => Ok(RowValues::Bool(b)),
        JsonValue::String(s) => Ok(RowValues::Text(s)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(RowValues::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(RowValues::Float(f))
            } else {
                Err(SqlHelperError::UnsupportedParameterType {
                    name: name.to_string(),
                    kind: format!("number out of range ({n})"),
                })
            }
        }
        other @ (JsonValue::Array(_) | JsonValue::Object(_)) => {
            Err(SqlHelperError::UnsupportedParameterType {
                name: name.to_string(),
                kind: json_kind(&other).to_string(),
            })
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

pub(crate) fn positional_name(idx: usize) -> String {
    format!("p{idx}")
}

pub(crate) fn normalize_name(name: &str) -> String {
    name.trim_start_matches(NAME_MARKERS).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Filter {
        zeta: i64,
        alpha: Option<String>,
        ratio: f64,
    }

    #[test]
    fn bag_preserves_field_order() {
        let params = normalize(Bag(Filter {
            zeta: 1,
            alpha: None,
            ratio: 0.5,
        }))
        .unwrap();
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "ratio"]);
        assert_eq!(params[1].value, RowValues::Null);
        assert_eq!(params[2].value, RowValues::Float(0.5));
    }

    #[test]
    fn json_bag_keeps_insertion_order() {
        let params = normalize(Bag(json!({ "x": 5, "id": 1, "name": "a" }))).unwrap();
        let names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["x", "id", "name"]);
    }

    #[test]
    fn nested_values_are_rejected() {
        let err = normalize(Bag(json!({ "ok": 1, "tags": ["a", "b"] }))).unwrap_err();
        match err {
            SqlHelperError::UnsupportedParameterType { name, kind } => {
                assert_eq!(name, "tags");
                assert_eq!(kind, "array");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = normalize(Bag(json!({ "inner": { "a": 1 } }))).unwrap_err();
        assert!(matches!(err, SqlHelperError::UnsupportedParameterType { .. }));

        let err = normalize(Bag(42)).unwrap_err();
        assert!(matches!(
            err,
            SqlHelperError::UnsupportedParameterType { ref name, .. } if name == "<root>"
        ));
    }

    #[test]
    fn positional_values_get_generated_names() {
        let params = normalize(vec![RowValues::Int(1), RowValues::Text("b".into())]).unwrap();
        assert_eq!(params[0].name, "p0");
        assert_eq!(params[1].name, "p1");
    }

    #[test]
    fn explicit_list_strips_markers_and_fills_blanks() {
        let params = normalize(vec![
            Parameter::new("@id", 3),
            Parameter::new("", "x"),
            Parameter::new(":name", "y").with_direction(ParameterDirection::Output),
        ])
        .unwrap();
        assert_eq!(params[0].name, "id");
        assert_eq!(params[1].name, "p1");
        assert_eq!(params[2].name, "name");
        assert_eq!(params[2].direction, ParameterDirection::Output);
    }

    #[test]
    fn empty_inputs_yield_empty_lists() {
        assert!(normalize(()).unwrap().is_empty());
        assert!(normalize(None::<Vec<Parameter>>).unwrap().is_empty());
        assert!(normalize(Bag(json!({}))).unwrap().is_empty());
        assert!(normalize(Bag(JsonValue::Null)).unwrap().is_empty());
    }
}
