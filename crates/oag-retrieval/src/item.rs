//! Retrieval index elements.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaItemType {
    Entity,
    Property,
    Action,
}

impl SchemaItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Property => "property",
            Self::Action => "action",
        }
    }
}

/// One indexable element of the ontology: an entity, a property, or an
/// action. Synonyms are supplied at registration (display names, locale
/// translations) — the index itself is domain-neutral.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaItem {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: SchemaItemType,
    /// Entity this item belongs to (itself, for entity items).
    pub entity: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
}

impl SchemaItem {
    pub fn entity_item(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            item_type: SchemaItemType::Entity,
            entity: name.clone(),
            name,
            description: description.into(),
            synonyms: Vec::new(),
        }
    }

    pub fn property_item(
        entity: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let entity = entity.into();
        let name = name.into();
        Self {
            id: format!("{entity}.{name}"),
            item_type: SchemaItemType::Property,
            entity,
            name,
            description: description.into(),
            synonyms: Vec::new(),
        }
    }

    pub fn action_item(
        entity: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            item_type: SchemaItemType::Action,
            entity: entity.into(),
            name,
            description: description.into(),
            synonyms: Vec::new(),
        }
    }

    pub fn with_synonyms<I, S>(mut self, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms = synonyms.into_iter().map(Into::into).collect();
        self
    }

    /// The text that gets embedded for this item.
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![self.name.clone()];
        if !self.description.is_empty() {
            parts.push(self.description.clone());
        }
        parts.extend(self.synonyms.iter().cloned());
        parts.join(" ")
    }
}
