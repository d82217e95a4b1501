//! OpenTelemetry-compatible `tracing` span and field name constants.
//!
//! Every external call and pipeline stage is wrapped in a span built from
//! these constants so the dispatcher's structured logs stay consistent
//! across the session, router, pipeline, model, retrieval, tool, and
//! workflow subsystems. Field names follow OpenTelemetry's dot-notation
//! convention so they export cleanly if a collector is ever attached.
//!
//! # Span hierarchy
//!
//! ```text
//! conduit.connection            (root — one per websocket connection)
//!   └─ conduit.message           (one per inbound frame)
//!       ├─ conduit.session.bind
//!       ├─ conduit.route
//!       ├─ conduit.pipeline      (general | rag | tool | workflow)
//!       │   ├─ conduit.model.generate
//!       │   ├─ conduit.retrieval.search
//!       │   └─ conduit.tool.invoke
//!       └─ conduit.write         (conversation + analytics)
//! conduit.sweep                  (periodic session reaper)
//! ```

pub const SPAN_CONNECTION: &str = "conduit.connection";
pub const SPAN_MESSAGE: &str = "conduit.message";
pub const SPAN_SESSION_BIND: &str = "conduit.session.bind";
pub const SPAN_ROUTE: &str = "conduit.route";
pub const SPAN_PIPELINE: &str = "conduit.pipeline";
pub const SPAN_MODEL_GENERATE: &str = "conduit.model.generate";
pub const SPAN_RETRIEVAL_SEARCH: &str = "conduit.retrieval.search";
pub const SPAN_TOOL_INVOKE: &str = "conduit.tool.invoke";
pub const SPAN_WRITE: &str = "conduit.write";
pub const SPAN_WORKFLOW_STEP: &str = "conduit.workflow.step";
pub const SPAN_SWEEP: &str = "conduit.sweep";

pub const FIELD_SESSION_ID: &str = "session.id";
pub const FIELD_MESSAGE_ID: &str = "message.id";
pub const FIELD_INTENT: &str = "conduit.intent";
pub const FIELD_PIPELINE_KIND: &str = "conduit.pipeline.kind";
pub const FIELD_SERVICE: &str = "conduit.service";
pub const FIELD_ENDPOINT_TIER: &str = "conduit.model.endpoint_tier";
pub const FIELD_IS_FALLBACK: &str = "conduit.is_fallback";
pub const FIELD_DURATION_MS: &str = "conduit.duration_ms";
pub const FIELD_SUCCESS: &str = "conduit.success";
pub const FIELD_TOOL_NAME: &str = "conduit.tool.name";
pub const FIELD_CIRCUIT_STATE: &str = "conduit.circuit.state";
pub const FIELD_SOURCES_COUNT: &str = "conduit.sources.count";
pub const FIELD_SWEPT_COUNT: &str = "conduit.sweep.count";
