//! Schema index service — enumerates the registry into indexable items.

use oag_core::OntologyRegistry;

use crate::item::SchemaItem;

/// Builds one `SchemaItem` per entity, property and action. Synonyms come
/// from registration metadata: entity `synonyms` extensions, property
/// display names, action search keywords.
pub struct SchemaIndexService;

impl SchemaIndexService {
    pub fn build_items(registry: &OntologyRegistry) -> Vec<SchemaItem> {
        let mut items = Vec::new();

        for entity in registry.get_entities() {
            let mut synonyms: Vec<String> = Vec::new();
            if let Some(display) = entity.display_name() {
                synonyms.push(display.to_string());
            }
            if let Some(extra) = entity.extensions.get("synonyms").and_then(|v| v.as_array()) {
                synonyms.extend(
                    extra
                        .iter()
                        .filter_map(|v| v.as_str())
                        .map(str::to_string),
                );
            }
            items.push(
                SchemaItem::entity_item(entity.name.clone(), entity.description.clone())
                    .with_synonyms(synonyms),
            );

            for property in entity.properties.values() {
                let mut item = SchemaItem::property_item(
                    entity.name.clone(),
                    property.name.clone(),
                    property.description.clone(),
                );
                if !property.display_name.is_empty() {
                    item = item.with_synonyms([property.display_name.clone()]);
                }
                items.push(item);
            }
        }

        for action in registry.get_actions() {
            items.push(
                SchemaItem::action_item(
                    action.entity.clone(),
                    action.name.clone(),
                    action.description.clone(),
                )
                .with_synonyms(action.search_keywords.clone()),
            );
        }

        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SchemaItemType;
    use oag_core::{
        ActionCategory, ActionSpec, EntityMetadata, PropertyMetadata, SemanticType,
    };
    use serde_json::json;

    #[test]
    fn test_index_covers_entities_properties_actions() {
        let registry = OntologyRegistry::new();
        let mut guest = EntityMetadata::new("Guest")
            .with_description("Hotel guest")
            .with_property(
                PropertyMetadata::new("name", SemanticType::String).with_display_name("Guest Name"),
            );
        guest
            .extensions
            .insert("synonyms".into(), json!(["客人", "住客"]));
        registry.register_entity(guest);
        registry
            .register_action(
                ActionSpec::new("checkin", "Guest", ActionCategory::Mutation)
                    .with_keywords(["check in", "入住"]),
            )
            .unwrap();

        let items = SchemaIndexService::build_items(&registry);

        let entity = items
            .iter()
            .find(|i| i.item_type == SchemaItemType::Entity)
            .unwrap();
        assert_eq!(entity.id, "Guest");
        assert!(entity.synonyms.contains(&"客人".to_string()));

        let property = items
            .iter()
            .find(|i| i.item_type == SchemaItemType::Property)
            .unwrap();
        assert_eq!(property.id, "Guest.name");
        assert_eq!(property.synonyms, vec!["Guest Name"]);

        let action = items
            .iter()
            .find(|i| i.item_type == SchemaItemType::Action)
            .unwrap();
        assert_eq!(action.id, "checkin");
        assert_eq!(action.entity, "Guest");
        assert!(action.synonyms.contains(&"入住".to_string()));
    }
}
