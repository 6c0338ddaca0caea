//! Name-keyed registry of executable actions.
//!
//! Registration pairs the declarative `ActionSpec` (which also lands in the
//! ontology registry) with the handler and parameter model. Lookup is by
//! unique action name.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::debug;

use oag_core::{ActionSpec, GlossaryExample, OagError, OntologyRegistry, Result};

use crate::handler::ActionHandler;
use crate::params::ParamsModel;

/// A fully registered action: schema + parameter model + handler.
#[derive(Clone)]
pub struct RegisteredAction {
    pub spec: ActionSpec,
    pub params_model: ParamsModel,
    pub handler: Arc<dyn ActionHandler>,
}

#[derive(Default)]
struct RegistryInner {
    actions: HashMap<String, RegisteredAction>,
    order: Vec<String>,
}

/// Registry of executable actions, unique by name.
#[derive(Default)]
pub struct ActionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action. The spec is mirrored into the ontology registry,
    /// which enforces that the owning entity exists and the name is unique.
    pub fn register(
        &self,
        ontology: &OntologyRegistry,
        spec: ActionSpec,
        params_model: ParamsModel,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<()> {
        {
            let inner = self.inner.read().expect("action registry lock poisoned");
            if inner.actions.contains_key(&spec.name) {
                return Err(OagError::AlreadyRegistered {
                    kind: "action",
                    name: spec.name.clone(),
                });
            }
        }
        ontology.register_action(spec.clone())?;

        let mut inner = self.inner.write().expect("action registry lock poisoned");
        debug!(action = %spec.name, entity = %spec.entity, "registered action handler");
        inner.order.push(spec.name.clone());
        inner.actions.insert(
            spec.name.clone(),
            RegisteredAction {
                spec,
                params_model,
                handler,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<RegisteredAction> {
        self.inner
            .read()
            .expect("action registry lock poisoned")
            .actions
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner
            .read()
            .expect("action registry lock poisoned")
            .order
            .clone()
    }

    pub fn specs(&self) -> Vec<ActionSpec> {
        let inner = self.inner.read().expect("action registry lock poisoned");
        inner
            .order
            .iter()
            .filter_map(|name| inner.actions.get(name).map(|a| a.spec.clone()))
            .collect()
    }

    /// Glossary keyed by semantic category, aggregated across actions.
    ///
    /// Keywords and examples come from registration metadata only — the
    /// registry itself carries no domain strings. Actions without a
    /// semantic category are excluded.
    pub fn get_domain_glossary(&self) -> BTreeMap<String, GlossaryEntry> {
        let inner = self.inner.read().expect("action registry lock poisoned");
        let mut glossary: BTreeMap<String, GlossaryEntry> = BTreeMap::new();

        for name in &inner.order {
            let Some(action) = inner.actions.get(name) else {
                continue;
            };
            let Some(category) = &action.spec.semantic_category else {
                continue;
            };
            let entry = glossary
                .entry(category.clone())
                .or_insert_with(|| GlossaryEntry {
                    meaning: category.clone(),
                    keywords: Vec::new(),
                    examples: Vec::new(),
                });
            if let Some(description) = &action.spec.category_description {
                // First non-empty description wins; the category name is
                // only the fallback.
                if entry.meaning == *category && !description.is_empty() {
                    entry.meaning = description.clone();
                }
            }
            for keyword in &action.spec.search_keywords {
                if !entry.keywords.contains(keyword) {
                    entry.keywords.push(keyword.clone());
                }
            }
            entry
                .examples
                .extend(action.spec.glossary_examples.iter().cloned());
        }

        glossary
    }

    /// Drop every registration. For tests.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("action registry lock poisoned");
        *inner = RegistryInner::default();
    }
}

/// One semantic category in the domain glossary.
#[derive(Debug, Clone, Serialize)]
pub struct GlossaryEntry {
    pub meaning: String,
    pub keywords: Vec<String>,
    pub examples: Vec<GlossaryExample>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{ActionOutcome, FnHandler};
    use oag_core::{ActionCategory, EntityMetadata};

    fn noop_handler() -> Arc<dyn ActionHandler> {
        Arc::new(FnHandler(|_: crate::params::ValidatedParams, _: &crate::context::HandlerContext| {
            Ok(ActionOutcome::ok("done"))
        }))
    }

    fn setup() -> (OntologyRegistry, ActionRegistry) {
        let ontology = OntologyRegistry::new();
        ontology.register_entity(EntityMetadata::new("Guest"));
        (ontology, ActionRegistry::new())
    }

    #[test]
    fn test_register_and_get() {
        let (ontology, actions) = setup();
        actions
            .register(
                &ontology,
                ActionSpec::new("update_guest", "Guest", ActionCategory::Mutation),
                ParamsModel::open(),
                noop_handler(),
            )
            .unwrap();

        assert!(actions.get("update_guest").is_some());
        assert!(ontology.get_action_by_name("update_guest").is_some());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (ontology, actions) = setup();
        let spec = ActionSpec::new("update_guest", "Guest", ActionCategory::Mutation);
        actions
            .register(&ontology, spec.clone(), ParamsModel::open(), noop_handler())
            .unwrap();
        let err = actions
            .register(&ontology, spec, ParamsModel::open(), noop_handler())
            .unwrap_err();
        assert!(matches!(err, OagError::AlreadyRegistered { .. }));
    }

    #[test]
    fn test_empty_glossary() {
        let (_, actions) = setup();
        assert!(actions.get_domain_glossary().is_empty());
    }

    #[test]
    fn test_glossary_aggregates_keywords_and_examples() {
        let (ontology, actions) = setup();
        actions
            .register(
                &ontology,
                ActionSpec::new("a1", "Guest", ActionCategory::Mutation)
                    .with_keywords(["kw1", "kw2"])
                    .with_semantic_category("shared_cat")
                    .with_category_description("Shared meaning"),
                ParamsModel::open(),
                noop_handler(),
            )
            .unwrap();
        actions
            .register(
                &ontology,
                ActionSpec::new("a2", "Guest", ActionCategory::Mutation)
                    .with_keywords(["kw2", "kw3"])
                    .with_semantic_category("shared_cat"),
                ParamsModel::open(),
                noop_handler(),
            )
            .unwrap();

        let glossary = actions.get_domain_glossary();
        let entry = &glossary["shared_cat"];
        assert_eq!(entry.meaning, "Shared meaning");
        assert_eq!(entry.keywords, vec!["kw1", "kw2", "kw3"]);
    }

    #[test]
    fn test_glossary_meaning_falls_back_to_category_name() {
        let (ontology, actions) = setup();
        actions
            .register(
                &ontology,
                ActionSpec::new("a1", "Guest", ActionCategory::Mutation)
                    .with_keywords(["kw"])
                    .with_semantic_category("some_category"),
                ParamsModel::open(),
                noop_handler(),
            )
            .unwrap();
        let glossary = actions.get_domain_glossary();
        assert_eq!(glossary["some_category"].meaning, "some_category");
    }

    #[test]
    fn test_actions_without_category_excluded() {
        let (ontology, actions) = setup();
        actions
            .register(
                &ontology,
                ActionSpec::new("no_cat", "Guest", ActionCategory::Mutation)
                    .with_keywords(["kw1"]),
                ParamsModel::open(),
                noop_handler(),
            )
            .unwrap();
        assert!(actions.get_domain_glossary().is_empty());
    }
}
