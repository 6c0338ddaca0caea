//! Declarative parameter models.
//!
//! Each action declares its parameter schema explicitly — no reflection.
//! Validation turns the raw JSON map from an extractor or API caller into
//! a `ValidatedParams`, collecting per-field messages instead of failing
//! on the first problem.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use oag_core::{SemanticType, ValidationError};

/// Schema for one parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub description: String,
    /// Closed value set for string parameters, when declared.
    #[serde(default)]
    pub valid_values: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            required: false,
            nullable: true,
            description: String::new(),
            valid_values: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.nullable = false;
        self
    }

    pub fn with_valid_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.valid_values = Some(values.into_iter().map(Into::into).collect());
        self
    }
}

/// The typed parameter schema attached to one action.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamsModel {
    pub params: Vec<ParamSpec>,
}

impl ParamsModel {
    pub fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    /// Model that accepts anything — for actions whose handler does its own
    /// interpretation (queries over free-form filters).
    pub fn open() -> Self {
        Self::default()
    }

    pub fn spec(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Validate a raw JSON object against the model.
    ///
    /// Declared parameters are type-checked (with string→number/boolean
    /// coercion, since extractor output is stringly typed); undeclared
    /// fields pass through untouched for the handler to interpret.
    pub fn validate(&self, raw: &Value) -> Result<ValidatedParams, ValidationError> {
        let raw_map = match raw {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            _ => {
                return Err(ValidationError::single(
                    "_root",
                    "parameters must be a JSON object",
                ))
            }
        };

        let mut errors = ValidationError::default();
        let mut validated = raw_map.clone();

        for spec in &self.params {
            match raw_map.get(&spec.name) {
                None | Some(Value::Null) if spec.required => {
                    errors.push(&spec.name, "required parameter is missing");
                }
                None => {}
                Some(Value::Null) => {
                    if !spec.nullable {
                        errors.push(&spec.name, "parameter may not be null");
                    }
                }
                Some(value) => match coerce(value, spec.semantic_type) {
                    Ok(coerced) => {
                        if let Some(valid) = &spec.valid_values {
                            if let Value::String(s) = &coerced {
                                if !valid.iter().any(|v| v == s) {
                                    errors.push(
                                        &spec.name,
                                        format!("'{s}' is not one of {valid:?}"),
                                    );
                                }
                            }
                        }
                        validated.insert(spec.name.clone(), coerced);
                    }
                    Err(message) => errors.push(&spec.name, message),
                },
            }
        }

        if errors.is_empty() {
            Ok(ValidatedParams(validated))
        } else {
            Err(errors)
        }
    }
}

fn coerce(value: &Value, semantic_type: SemanticType) -> Result<Value, String> {
    match semantic_type {
        SemanticType::String => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            _ => Err("expected a string".into()),
        },
        SemanticType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::Number(_) => Err("expected an integer, got a fraction".into()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| format!("'{s}' is not an integer")),
            _ => Err("expected an integer".into()),
        },
        SemanticType::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| format!("'{s}' is not a number")),
            _ => Err("expected a number".into()),
        },
        SemanticType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.as_str() {
                "true" | "True" => Ok(Value::Bool(true)),
                "false" | "False" => Ok(Value::Bool(false)),
                _ => Err(format!("'{s}' is not a boolean")),
            },
            _ => Err("expected a boolean".into()),
        },
        SemanticType::Date => match value {
            Value::String(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|_| value.clone())
                .map_err(|_| format!("'{s}' is not a YYYY-MM-DD date")),
            _ => Err("expected a date string".into()),
        },
        SemanticType::Datetime => match value {
            Value::String(s) => {
                let parsed = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                    .or_else(|_| {
                        chrono::DateTime::parse_from_rfc3339(s).map(|dt| dt.naive_utc())
                    });
                parsed
                    .map(|_| value.clone())
                    .map_err(|_| format!("'{s}' is not a datetime"))
            }
            _ => Err("expected a datetime string".into()),
        },
        SemanticType::Json => Ok(value.clone()),
    }
}

/// Parameters that passed model validation. Keys are the declared (and any
/// pass-through) parameter names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidatedParams(pub Map<String, Value>);

impl ValidatedParams {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(Value::as_bool)
    }

    /// Deserialize the whole map into a typed parameter struct.
    pub fn parse_into<T: serde::de::DeserializeOwned>(&self) -> Result<T, ValidationError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| ValidationError::single("_root", e.to_string()))
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}
