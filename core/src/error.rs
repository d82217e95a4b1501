//! Error taxonomy for the conversational dispatch service.
//!
//! Each subsystem gets its own `thiserror` enum rather than one monolithic
//! error type, so a caller can match on exactly the failure modes relevant
//! to the boundary it sits behind. [`ConduitError`] composes them for the
//! dispatcher, which never propagates a panic — every path here terminates
//! in either a real answer or a fallback envelope.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found or expired")]
    NotFound,
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("validation error from endpoint {endpoint}: {message}")]
    Validation { endpoint: String, message: String },
    #[error("permission denied for endpoint {endpoint}: {message}")]
    Permission { endpoint: String, message: String },
    #[error("throttled by endpoint {endpoint}: {message}")]
    Throttled { endpoint: String, message: String },
    #[error("transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },
    #[error("all endpoint tiers exhausted, last error: {0}")]
    AllTiersExhausted(String),
}

impl crate::resilience::RetryableError for ModelError {
    fn is_retryable(&self) -> bool {
        matches!(self, ModelError::Throttled { .. } | ModelError::Transport { .. })
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("no retrieval backend configured and mock results are disabled")]
    BackendUnconfigured,
    #[error("embedding service error: {0}")]
    Embedding(String),
    #[error("document store error: {0}")]
    Store(String),
}

impl crate::resilience::RetryableError for RetrievalError {
    fn is_retryable(&self) -> bool {
        matches!(self, RetrievalError::Embedding(_) | RetrievalError::Store(_))
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("schema validation failed for tool {tool}: {message}")]
    SchemaValidation { tool: String, message: String },
    #[error("transport error invoking tool {tool}: {message}")]
    Transport { tool: String, message: String },
    #[error("tool {tool} returned an execution error: {message}")]
    Execution { tool: String, message: String },
}

impl crate::resilience::RetryableError for ToolError {
    fn is_retryable(&self) -> bool {
        matches!(self, ToolError::Transport { .. })
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow not found: {0}")]
    NotFound(String),
    #[error("workflow precondition violated: {0}")]
    PreconditionViolation(String),
    #[error("ticket number allocation failed after retries")]
    TicketAllocationFailed,
    #[error("blob upload failed: {0}")]
    BlobUpload(String),
    #[error("ticket store error: {0}")]
    TicketStore(String),
    #[error("workflow event sink error: {0}")]
    EventSink(String),
}

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("conversation write failed: {0}")]
    ConversationWrite(String),
}

/// Top-level error the dispatcher can always degrade from.
#[derive(Debug, Error)]
pub enum ConduitError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Workflow(#[from] WorkflowError),
    #[error(transparent)]
    Writer(#[from] WriterError),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("pipeline deadline exceeded")]
    DeadlineExceeded,
}
