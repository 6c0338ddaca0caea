//! LLM-friendly query representation.
//!
//! A `SemanticQuery` expresses joinful projections and filters as dot-paths
//! rooted at an entity (`guest.stays.room.room_number`) — no join types,
//! no join order, no relationship directions. The compiler turns it into a
//! relational plan.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Like,
    NotLike,
    Between,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Like => "like",
            Self::NotLike => "not_like",
            Self::Between => "between",
            Self::IsNull => "is_null",
            Self::IsNotNull => "is_not_null",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "in" => Some(Self::In),
            "not_in" => Some(Self::NotIn),
            "like" => Some(Self::Like),
            "not_like" => Some(Self::NotLike),
            "between" => Some(Self::Between),
            "is_null" => Some(Self::IsNull),
            "is_not_null" => Some(Self::IsNotNull),
            _ => None,
        }
    }

    /// Operators whose value must be a list.
    pub fn takes_list(&self) -> bool {
        matches!(self, Self::In | Self::NotIn | Self::Between)
    }

    /// Operators that carry no value at all.
    pub fn takes_no_value(&self) -> bool {
        matches!(self, Self::IsNull | Self::IsNotNull)
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A filter condition addressed by dot-path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticFilter {
    pub path: String,
    #[serde(default = "default_operator", alias = "op")]
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Value,
}

fn default_operator() -> FilterOperator {
    FilterOperator::Eq
}

impl SemanticFilter {
    pub fn new(path: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            path: path.into(),
            operator,
            value,
        }
    }

    pub fn eq(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, FilterOperator::Eq, value)
    }

    pub fn tokens(&self) -> Vec<&str> {
        self.path.split('.').collect()
    }

    pub fn is_simple(&self) -> bool {
        !self.path.contains('.')
    }

    pub fn hop_count(&self) -> usize {
        self.path.matches('.').count()
    }

    /// Final field name (`stays.room.room_number` → `room_number`).
    pub fn field_name(&self) -> &str {
        self.path.rsplit('.').next().unwrap_or("")
    }
}

/// A complete semantic query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticQuery {
    #[serde(alias = "entity")]
    pub root_object: String,
    /// Dot-paths to project. Empty means the root entity's default
    /// projection (all registered properties).
    #[serde(default, alias = "select")]
    pub fields: Vec<String>,
    #[serde(default)]
    pub filters: Vec<SemanticFilter>,
    #[serde(default)]
    pub order_by: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub distinct: bool,
}

fn default_limit() -> u64 {
    100
}

impl SemanticQuery {
    pub fn new(root_object: impl Into<String>) -> Self {
        Self {
            root_object: root_object.into(),
            fields: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: default_limit(),
            offset: 0,
            distinct: false,
        }
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter(mut self, filter: SemanticFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn is_simple(&self) -> bool {
        self.fields.iter().all(|f| !f.contains('.'))
            && self.filters.iter().all(SemanticFilter::is_simple)
    }

    pub fn max_hop_count(&self) -> usize {
        let field_hops = self.fields.iter().map(|f| f.matches('.').count());
        let filter_hops = self.filters.iter().map(SemanticFilter::hop_count);
        field_hops.chain(filter_hops).max().unwrap_or(0)
    }

    pub fn all_paths(&self) -> Vec<&str> {
        self.fields
            .iter()
            .map(String::as_str)
            .chain(self.filters.iter().map(|f| f.path.as_str()))
            .collect()
    }

    /// Structural validation before compilation. Returns every problem
    /// found, not just the first.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.root_object.is_empty() {
            errors.push("root_object is required".into());
        }
        for field in &self.fields {
            if field.is_empty() {
                errors.push("field path may not be empty".into());
            }
        }
        for filter in &self.filters {
            if filter.path.is_empty() {
                errors.push("filter path may not be empty".into());
            }
            if filter.operator.takes_list() && !filter.value.is_array() {
                errors.push(format!(
                    "filter '{}': operator {} requires a list value",
                    filter.path, filter.operator
                ));
            }
        }
        errors
    }
}
