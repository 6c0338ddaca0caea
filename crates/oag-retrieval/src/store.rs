//! Vector-store port and the in-memory reference implementation.
//!
//! The embedding model is external; the store only sees vectors. When the
//! embedder reports itself disabled (tests, offline boot) the in-memory
//! store degrades to keyword scoring over name + description + synonyms,
//! so retrieval stays functional without a model.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use oag_core::{OagError, Result};

use crate::item::SchemaItem;

/// Vector oracle: text in, vector out.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    /// A disabled service makes stores fall back to keyword scoring.
    fn enabled(&self) -> bool {
        true
    }
}

/// Deterministic character-trigram hashing embedder. No model download,
/// stable across runs; good enough for tests and offline development.
pub struct HashEmbedder {
    dimensions: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimensions: 128 }
    }
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingService for HashEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let chars: Vec<char> = lower.chars().collect();
        let mut vector = vec![0.0f32; self.dimensions];
        for window in chars.windows(3) {
            let mut hash: u64 = 1469598103934665603;
            for c in window {
                hash ^= *c as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            vector[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

/// Embedder that opts out; paired stores use keyword scoring instead.
pub struct DisabledEmbedding;

#[async_trait]
impl EmbeddingService for DisabledEmbedding {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(Vec::new())
    }

    fn enabled(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub total_items: usize,
    pub by_type: HashMap<String, usize>,
}

/// The store contract. Search is a declared suspension point.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn index_items(&self, items: Vec<SchemaItem>) -> Result<()>;
    async fn search(&self, query_text: &str, limit: usize) -> Result<Vec<SchemaItem>>;
    fn get_stats(&self) -> StoreStats;
    fn list_items(&self) -> Vec<SchemaItem>;
    fn close(&self);
}

struct IndexedItem {
    item: SchemaItem,
    vector: Option<Vec<f32>>,
}

/// In-memory cosine-similarity store.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn EmbeddingService>,
    items: RwLock<Vec<IndexedItem>>,
    /// Results below this cosine score are discarded.
    min_score: f32,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn EmbeddingService>) -> Self {
        Self {
            embedder,
            items: RwLock::new(Vec::new()),
            min_score: 0.1,
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    fn keyword_score(item: &SchemaItem, query: &str) -> f32 {
        let query_lower = query.to_lowercase();
        let tokens: Vec<&str> = query_lower.split_whitespace().collect();
        let mut score = 0.0;

        let name_lower = item.name.to_lowercase();
        let description_lower = item.description.to_lowercase();

        for token in &tokens {
            if name_lower == *token {
                score += 2.0;
            } else if name_lower.contains(token) || description_lower.contains(token) {
                score += 1.0;
            }
        }
        // Synonym containment runs both directions so languages written
        // without spaces still match.
        for synonym in &item.synonyms {
            let synonym_lower = synonym.to_lowercase();
            if query_lower.contains(&synonym_lower)
                || tokens.iter().any(|t| synonym_lower.contains(t))
            {
                score += 2.0;
            }
        }
        score
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    // Vectors are normalized at embed time; the dot product is the cosine.
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn index_items(&self, items: Vec<SchemaItem>) -> Result<()> {
        let mut indexed = Vec::with_capacity(items.len());
        for item in items {
            let vector = if self.embedder.enabled() {
                Some(
                    self.embedder
                        .embed(&item.embedding_text())
                        .await
                        .map_err(|e| OagError::Internal(format!("embedding failed: {e}")))?,
                )
            } else {
                None
            };
            indexed.push(IndexedItem { item, vector });
        }
        let mut store = self.items.write().expect("store lock poisoned");
        store.extend(indexed);
        debug!(total = store.len(), "indexed schema items");
        Ok(())
    }

    async fn search(&self, query_text: &str, limit: usize) -> Result<Vec<SchemaItem>> {
        let query_vector = if self.embedder.enabled() {
            Some(
                self.embedder
                    .embed(query_text)
                    .await
                    .map_err(|e| OagError::Internal(format!("embedding failed: {e}")))?,
            )
        } else {
            None
        };

        let store = self.items.read().expect("store lock poisoned");
        let mut scored: Vec<(f32, SchemaItem)> = store
            .iter()
            .map(|indexed| {
                let score = match (&query_vector, &indexed.vector) {
                    (Some(q), Some(v)) => cosine(q, v),
                    _ => Self::keyword_score(&indexed.item, query_text),
                };
                (score, indexed.item.clone())
            })
            .filter(|(score, _)| *score >= self.min_score)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, item)| item).collect())
    }

    fn get_stats(&self) -> StoreStats {
        let store = self.items.read().expect("store lock poisoned");
        let mut by_type: HashMap<String, usize> = HashMap::new();
        for indexed in store.iter() {
            *by_type
                .entry(indexed.item.item_type.as_str().to_string())
                .or_default() += 1;
        }
        StoreStats {
            total_items: store.len(),
            by_type,
        }
    }

    fn list_items(&self) -> Vec<SchemaItem> {
        self.items
            .read()
            .expect("store lock poisoned")
            .iter()
            .map(|indexed| indexed.item.clone())
            .collect()
    }

    fn close(&self) {
        self.items.write().expect("store lock poisoned").clear();
    }
}
