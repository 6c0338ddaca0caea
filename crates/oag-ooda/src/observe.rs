//! Observe phase — input normalization and validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub raw_input: String,
    pub normalized_input: String,
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Input check returning an error message on failure.
pub trait InputValidator: Send + Sync {
    fn validate(&self, input: &str) -> Option<String>;
}

pub struct NonEmpty;

impl InputValidator for NonEmpty {
    fn validate(&self, input: &str) -> Option<String> {
        if input.trim().is_empty() {
            Some("input is empty".into())
        } else {
            None
        }
    }
}

pub struct MaxLength(pub usize);

impl InputValidator for MaxLength {
    fn validate(&self, input: &str) -> Option<String> {
        if input.chars().count() > self.0 {
            Some(format!("input exceeds {} characters", self.0))
        } else {
            None
        }
    }
}

/// Observe phase: trims and collapses whitespace, then runs validators.
pub struct ObservePhase {
    validators: Vec<Box<dyn InputValidator>>,
}

impl Default for ObservePhase {
    fn default() -> Self {
        Self {
            validators: vec![Box::new(NonEmpty), Box::new(MaxLength(2000))],
        }
    }
}

impl ObservePhase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validator(mut self, validator: Box<dyn InputValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn observe(&self, raw_input: &str) -> Observation {
        let normalized = normalize(raw_input);
        let validation_errors: Vec<String> = self
            .validators
            .iter()
            .filter_map(|v| v.validate(&normalized))
            .collect();
        Observation {
            raw_input: raw_input.to_string(),
            normalized_input: normalized,
            is_valid: validation_errors.is_empty(),
            validation_errors,
            timestamp: Utc::now(),
        }
    }
}

fn normalize(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_collapses_whitespace() {
        let phase = ObservePhase::new();
        let obs = phase.observe("  check in   guest\tA  ");
        assert_eq!(obs.normalized_input, "check in guest A");
        assert!(obs.is_valid);
    }

    #[test]
    fn test_empty_input_invalid() {
        let phase = ObservePhase::new();
        let obs = phase.observe("   ");
        assert!(!obs.is_valid);
        assert_eq!(obs.validation_errors, vec!["input is empty"]);
    }

    #[test]
    fn test_max_length() {
        let phase = ObservePhase::new();
        let obs = phase.observe(&"x".repeat(3000));
        assert!(!obs.is_valid);
        assert!(obs.validation_errors[0].contains("2000"));
    }
}
