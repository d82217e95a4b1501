//! Retrieval client: query embedding + top-k retrieval with cosine
//! scoring and threshold filtering, over a managed or manual backend.

pub mod chunk;
pub mod client;

pub use chunk::{cosine_similarity, DocumentChunk};
pub use client::{
    Backend, ChunkStore, EmbeddingService, ManagedRetrievalBackend, RetrievalClient, RetrievalConfig,
};
