//! RAG pipeline: retrieve relevant chunks, fold them into a capped context
//! block, and generate a cited reply. Grounded in `chatbot_engine.py`'s
//! document-aware reply path and the retrieval client's threshold/limit
//! semantics.

use std::sync::Arc;

use crate::model::{Message, ModelClient};
use crate::parser::parse_structured_reply;
use crate::prompts::compose;
use crate::retrieval::{DocumentChunk, RetrievalClient};

use super::envelope::{classification, Envelope, SourceRef};
use super::general::GeneralPipeline;
use super::history::enhance_conversation_context;

/// Context blocks are capped in characters, not chunks, since chunk sizes
/// vary with the source document.
const CONTEXT_CHAR_CAP: usize = 8000;

#[derive(Debug, Clone)]
pub struct RagConfig {
    pub limit: usize,
    pub min_relevance_score: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            min_relevance_score: 0.7,
        }
    }
}

pub struct RagPipeline {
    model: Arc<ModelClient>,
    retrieval: Arc<RetrievalClient>,
    general: Arc<GeneralPipeline>,
    config: RagConfig,
}

impl RagPipeline {
    pub fn new(model: Arc<ModelClient>, retrieval: Arc<RetrievalClient>, config: RagConfig) -> Self {
        let general = Arc::new(GeneralPipeline::new(Arc::clone(&model)));
        Self {
            model,
            retrieval,
            general,
            config,
        }
    }

    pub async fn run(&self, session_id: &str, history: &[Message], user_text: &str) -> Envelope {
        let started = std::time::Instant::now();
        let chunks = self
            .retrieval
            .search(user_text, self.config.limit, self.config.min_relevance_score)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(error = %err, "retrieval failed, answering without citations");
                Vec::new()
            });

        // §4.7.2: an empty result set delegates to the General executor
        // rather than answering "as RAG" with no context to cite.
        if chunks.is_empty() {
            return self
                .general
                .run_with_note(
                    session_id,
                    history,
                    user_text,
                    Some(
                        "No indexed documents matched this question closely enough to cite. \
                         Say so plainly and answer from general knowledge only if you are \
                         confident; otherwise say you don't have the information.",
                    ),
                )
                .await;
        }

        let context_block = build_context_block(&chunks);
        let instructions = format!(
            "Answer using ONLY the following retrieved context where it is relevant. Cite \
             the source name inline when you use it. If the context doesn't answer the \
             question, say so rather than guessing.\n\n--- RETRIEVED CONTEXT ---\n{context_block}"
        );
        let system_prompt = compose(&instructions);

        let mut messages = enhance_conversation_context(history);
        messages.push(Message::user(user_text));

        let result = self.model.generate(&messages, Some(&system_prompt), 1536, 0.5).await;
        let parsed = parse_structured_reply(&result.text);
        let sources = rank_sources(&chunks);
        let response_ms = started.elapsed().as_millis() as u64;
        Envelope::from_parsed(session_id, classification::RAG, parsed, sources, Vec::new(), result.is_fallback, response_ms)
    }
}

/// Joins chunk content, ordered by descending score, truncating once the
/// running length would exceed [`CONTEXT_CHAR_CAP`].
fn build_context_block(chunks: &[DocumentChunk]) -> String {
    let mut ordered: Vec<&DocumentChunk> = chunks.iter().collect();
    ordered.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut block = String::new();
    for chunk in ordered {
        let piece = format!("[source: {}]\n{}\n\n", chunk.source, chunk.content);
        if block.len() + piece.len() > CONTEXT_CHAR_CAP {
            break;
        }
        block.push_str(&piece);
    }
    block.trim_end().to_string()
}

/// One entry per distinct source, keeping the highest score seen, ordered
/// by that score descending.
fn rank_sources(chunks: &[DocumentChunk]) -> Vec<SourceRef> {
    let mut by_source: std::collections::HashMap<String, f32> = std::collections::HashMap::new();
    for chunk in chunks {
        by_source
            .entry(chunk.source.clone())
            .and_modify(|score| *score = score.max(chunk.score))
            .or_insert(chunk.score);
    }
    let mut sources: Vec<SourceRef> = by_source
        .into_iter()
        .map(|(source, score)| SourceRef { source, score })
        .collect();
    sources.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    sources
}
