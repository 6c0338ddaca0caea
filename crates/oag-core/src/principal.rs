//! Authenticated caller identity. Authentication itself is external; the
//! core only consumes the resolved identity and role.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    pub role: String,
}

impl UserContext {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: String::new(),
            role: role.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Anonymous caller — carries an empty role, which every role check denies.
    pub fn anonymous() -> Self {
        Self {
            user_id: "anonymous".into(),
            name: String::new(),
            role: String::new(),
        }
    }
}
