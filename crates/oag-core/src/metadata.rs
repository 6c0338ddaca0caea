//! Schema value types — pure data, no I/O, no persistence derives.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Semantic type of a property as exposed to extractors and validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    String,
    Integer,
    Number,
    Boolean,
    Datetime,
    Date,
    Json,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
            Self::Date => "date",
            Self::Json => "json",
        }
    }
}

/// Security classification carried on every property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityLevel {
    Public,
    #[default]
    Internal,
    Confidential,
    Restricted,
}

/// A single property of an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default)]
    pub is_foreign_key: bool,
    #[serde(default)]
    pub foreign_key_target: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default = "default_true")]
    pub is_nullable: bool,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub security_level: SecurityLevel,
}

fn default_true() -> bool {
    true
}

impl PropertyMetadata {
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            is_primary_key: false,
            is_foreign_key: false,
            foreign_key_target: None,
            is_required: false,
            is_unique: false,
            is_nullable: true,
            display_name: String::new(),
            description: String::new(),
            security_level: SecurityLevel::default(),
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self.is_nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_unique = true;
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Relationship cardinality between two entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneToOne => "one_to_one",
            Self::OneToMany => "one_to_many",
            Self::ManyToOne => "many_to_one",
            Self::ManyToMany => "many_to_many",
        }
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named, directed edge in the entity graph.
///
/// Relationships live both on the owning entity (ordered list) and in the
/// registry's global edge map; entities reference them by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipMetadata {
    pub name: String,
    pub target_entity: String,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub foreign_key: String,
    /// Entity whose table carries the foreign key column.
    #[serde(default)]
    pub foreign_key_entity: String,
    #[serde(default)]
    pub inverse_name: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl RelationshipMetadata {
    pub fn new(
        name: impl Into<String>,
        target_entity: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            target_entity: target_entity.into(),
            cardinality,
            foreign_key: String::new(),
            foreign_key_entity: String::new(),
            inverse_name: None,
            description: String::new(),
        }
    }

    pub fn with_foreign_key(
        mut self,
        foreign_key: impl Into<String>,
        foreign_key_entity: impl Into<String>,
    ) -> Self {
        self.foreign_key = foreign_key.into();
        self.foreign_key_entity = foreign_key_entity.into();
        self
    }

    pub fn with_inverse(mut self, inverse_name: impl Into<String>) -> Self {
        self.inverse_name = Some(inverse_name.into());
        self
    }

    /// One-line rendering used by schema export and retrieval metadata.
    pub fn to_display(&self) -> String {
        match &self.inverse_name {
            Some(inverse) => format!(
                "{} -> {} ({}) [inverse: {}]",
                self.name, self.target_entity, self.cardinality, inverse
            ),
            None => format!("{} -> {} ({})", self.name, self.target_entity, self.cardinality),
        }
    }
}

/// A registered entity type.
///
/// `properties` is keyed by property name; insertion order is irrelevant and
/// the map is kept sorted so `export_schema()` is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub table_name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_aggregate_root: bool,
    /// Open key-value extensions (e.g. a `chat_access` policy).
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RelationshipMetadata>,
    /// Informational list of related entity names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_entities: Vec<String>,
}

impl EntityMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            table_name: String::new(),
            category: String::new(),
            is_aggregate_root: false,
            extensions: BTreeMap::new(),
            properties: BTreeMap::new(),
            relationships: Vec::new(),
            related_entities: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn aggregate_root(mut self) -> Self {
        self.is_aggregate_root = true;
        self
    }

    pub fn with_property(mut self, property: PropertyMetadata) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }

    pub fn add_relationship(&mut self, relationship: RelationshipMetadata) -> &mut Self {
        if !self
            .related_entities
            .contains(&relationship.target_entity)
        {
            self.related_entities
                .push(relationship.target_entity.clone());
        }
        self.relationships.push(relationship);
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyMetadata> {
        self.properties.get(name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipMetadata> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Entity-level display name, if one was registered in extensions.
    pub fn display_name(&self) -> Option<&str> {
        self.extensions
            .get("display_name")
            .and_then(|v| v.as_str())
    }
}
