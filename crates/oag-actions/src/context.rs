//! Per-dispatch context handed to handlers.
//!
//! The dispatcher owns nothing between calls: every dispatch receives one
//! persistence session, the authenticated user, and a typed map of named
//! collaborators (parameter parser, LLM client handle, ...). Handlers must
//! not open sibling transactions or retain the session.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use oag_core::UserContext;

/// Opaque persistence transaction scope. The core never interprets it;
/// handlers downcast to the host's concrete session type.
pub trait PersistenceSession: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Session for handlers that touch no storage, and for tests.
#[derive(Debug, Default)]
pub struct NullSession;

impl PersistenceSession for NullSession {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Type-keyed collaborator map.
#[derive(Default, Clone)]
pub struct Extensions {
    entries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.entries.insert(TypeId::of::<T>(), value);
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.entries
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|entry| entry.downcast::<T>().ok())
    }
}

/// Everything a handler receives besides its validated parameters.
#[derive(Clone)]
pub struct HandlerContext {
    pub session: Arc<dyn PersistenceSession>,
    pub user: UserContext,
    pub extensions: Extensions,
    /// Free-form context values (conversation id, locale, ...).
    pub values: Map<String, Value>,
}

impl HandlerContext {
    pub fn new(session: Arc<dyn PersistenceSession>, user: UserContext) -> Self {
        Self {
            session,
            user,
            extensions: Extensions::new(),
            values: Map::new(),
        }
    }

    /// Context with no storage attached.
    pub fn detached(user: UserContext) -> Self {
        Self::new(Arc::new(NullSession), user)
    }

    pub fn with_extension<T: Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.extensions.insert(value);
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}
