//! Interface definitions and implementation claims.
//!
//! Informational for schema export; the boot-time structural check verifies
//! that a claiming entity declares every required property and action.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_actions: Vec<String>,
}

impl InterfaceDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            required_properties: Vec::new(),
            required_actions: Vec::new(),
        }
    }

    pub fn with_required_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_properties = properties.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_required_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_actions = actions.into_iter().map(Into::into).collect();
        self
    }
}
