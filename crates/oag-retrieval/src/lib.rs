//! Schema retrieval: index the ontology into a vector store, then answer
//! "what minimal slice of the schema is relevant to this text?" with
//! one-hop relationship expansion.

pub mod index;
pub mod item;
pub mod retriever;
pub mod store;

pub use index::SchemaIndexService;
pub use item::{SchemaItem, SchemaItemType};
pub use retriever::{RetrievalResult, SchemaRetriever, SearchMetadata};
pub use store::{
    DisabledEmbedding, EmbeddingService, HashEmbedder, InMemoryVectorStore, StoreStats,
    VectorStore,
};
