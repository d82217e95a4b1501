//! Retrieval client: query embedding + top-k retrieval with cosine scoring
//! and threshold filtering. Two back-ends, selected by configuration: a
//! managed service that returns scored passages directly, and a manual
//! path that embeds the query, lists chunk ids from the blob store, loads
//! each, and scores locally.

use async_trait::async_trait;

use super::chunk::{cosine_similarity, DocumentChunk};
use crate::error::RetrievalError;

/// The out-of-scope embedding endpoint: text in, dense vector out.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;
}

/// The out-of-scope blob store, addressed by a chunk-id prefix.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn list_ids(&self, prefix: &str) -> Result<Vec<String>, RetrievalError>;
    /// Tolerates missing/malformed chunks by returning `Ok(None)` rather
    /// than erroring — the manual path skips them.
    async fn load(&self, id: &str) -> Result<Option<DocumentChunk>, RetrievalError>;
}

/// A managed retrieval service: one call returns scored passages directly
/// (the scoring happens upstream, not locally).
#[async_trait]
pub trait ManagedRetrievalBackend: Send + Sync {
    async fn search(&self, query_text: &str, limit: usize) -> Result<Vec<DocumentChunk>, RetrievalError>;
}

pub enum Backend {
    Managed(std::sync::Arc<dyn ManagedRetrievalBackend>),
    Manual {
        embedding: std::sync::Arc<dyn EmbeddingService>,
        chunks: std::sync::Arc<dyn ChunkStore>,
        chunk_prefix: String,
    },
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Resolves Open Question "mock-result affordance": when no backend is
    /// configured, `search` normally would return deterministic mock
    /// chunks. Production deployments MUST disable this (default `false`).
    pub allow_mock: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { allow_mock: false }
    }
}

pub struct RetrievalClient {
    backend: Option<Backend>,
    config: RetrievalConfig,
}

impl RetrievalClient {
    pub fn new(backend: Option<Backend>, config: RetrievalConfig) -> Self {
        Self { backend, config }
    }

    pub async fn search(
        &self,
        query_text: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<DocumentChunk>, RetrievalError> {
        match &self.backend {
            Some(Backend::Managed(backend)) => {
                let mut chunks = backend.search(query_text, limit).await?;
                chunks.retain(|c| c.score >= threshold);
                chunks.truncate(limit);
                Ok(chunks)
            }
            Some(Backend::Manual {
                embedding,
                chunks,
                chunk_prefix,
            }) => {
                let query_vec = embedding.embed(query_text).await?;
                let ids = chunks.list_ids(chunk_prefix).await?;
                let mut scored = Vec::new();
                for id in ids {
                    match chunks.load(&id).await {
                        Ok(Some(mut chunk)) => {
                            chunk.score = cosine_similarity(&query_vec, &chunk.embedding);
                            if chunk.score >= threshold {
                                scored.push(chunk);
                            }
                        }
                        // Missing or malformed chunk: skip it.
                        Ok(None) | Err(_) => continue,
                    }
                }
                scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
                scored.truncate(limit);
                Ok(scored)
            }
            None => {
                if !self.config.allow_mock {
                    return Err(RetrievalError::BackendUnconfigured);
                }
                Ok(mock_results(query_text, limit))
            }
        }
    }
}

/// Deterministic, explicitly-flagged development affordance: never used in
/// production (`RetrievalConfig::allow_mock` gates it off by default).
fn mock_results(query_text: &str, limit: usize) -> Vec<DocumentChunk> {
    let hash = query_text.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    (0..limit.min(3))
        .map(|i| DocumentChunk {
            id: format!("mock-{}-{}", hash, i),
            content: format!("[mock result {i} for query hash {hash}]"),
            source: "mock://development-only".to_string(),
            embedding: vec![],
            score: 0.5,
        })
        .collect()
}
