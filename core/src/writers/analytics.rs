//! Analytics writer: best-effort, isolated from the conversation path.
//! Grounded in `chatbot_engine.py`'s `_log_analytics_isolated` — every
//! failure is logged and swallowed so an analytics outage never degrades
//! a user-facing reply, backed by the analytics service's more tolerant
//! circuit breaker (see [`crate::resilience::service::ANALYTICS`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decimal::{convert, AnalyticsValue};
use crate::error::WriterError;
use crate::resilience::{service, CircuitRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEventKind {
    Query,
    ToolUsage,
    SessionCreated,
    SessionClosed,
    ErrorOccurred,
    ResponseGenerated,
}

/// Session lifecycle transitions `record_session` can report. Kept as an
/// enum rather than a bare `&str` event name so a typo can't silently drop
/// an event into the wrong kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Created,
    Closed,
}

impl SessionEvent {
    fn kind(self) -> AnalyticsEventKind {
        match self {
            SessionEvent::Created => AnalyticsEventKind::SessionCreated,
            SessionEvent::Closed => AnalyticsEventKind::SessionClosed,
        }
    }

    fn label(self) -> &'static str {
        match self {
            SessionEvent::Created => "created",
            SessionEvent::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyticsRecord {
    pub kind: AnalyticsEventKind,
    pub session_id: String,
    pub payload: AnalyticsValue,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn put_record(&self, record: AnalyticsRecord) -> Result<(), WriterError>;
}

pub struct AnalyticsWriter {
    store: std::sync::Arc<dyn AnalyticsStore>,
    circuits: std::sync::Arc<CircuitRegistry>,
}

impl AnalyticsWriter {
    pub fn new(store: std::sync::Arc<dyn AnalyticsStore>, circuits: std::sync::Arc<CircuitRegistry>) -> Self {
        Self { store, circuits }
    }

    pub async fn record_query(
        &self,
        session_id: &str,
        intent: &str,
        latency_ms: u64,
        is_fallback: bool,
        sentiment_confidence: f32,
        now: DateTime<Utc>,
    ) {
        self.write(
            AnalyticsEventKind::Query,
            session_id,
            serde_json::json!({
                "intent": intent,
                "latency_ms": latency_ms,
                "is_fallback": is_fallback,
                "sentiment_confidence": sentiment_confidence,
            }),
            now,
        )
        .await;
    }

    pub async fn record_tool(&self, session_id: &str, tool_name: &str, latency_ms: u64, succeeded: bool, now: DateTime<Utc>) {
        self.write(
            AnalyticsEventKind::ToolUsage,
            session_id,
            serde_json::json!({"tool_name": tool_name, "latency_ms": latency_ms, "succeeded": succeeded}),
            now,
        )
        .await;
    }

    pub async fn record_session(&self, session_id: &str, event: SessionEvent, now: DateTime<Utc>) {
        self.write(
            event.kind(),
            session_id,
            serde_json::json!({"event": event.label()}),
            now,
        )
        .await;
    }

    /// §4.10: recorded when every endpoint tier in the model's fallback
    /// ladder is exhausted and the dispatcher hands back a synthesized
    /// apology envelope instead of a model reply.
    pub async fn record_error(&self, session_id: &str, stage: &str, message: &str, now: DateTime<Utc>) {
        self.write(
            AnalyticsEventKind::ErrorOccurred,
            session_id,
            serde_json::json!({"stage": stage, "message": message}),
            now,
        )
        .await;
    }

    /// §4.10: recorded on every non-fallback reply, alongside `record_query`.
    pub async fn record_response_generated(&self, session_id: &str, classification: &str, latency_ms: u64, now: DateTime<Utc>) {
        self.write(
            AnalyticsEventKind::ResponseGenerated,
            session_id,
            serde_json::json!({"classification": classification, "latency_ms": latency_ms}),
            now,
        )
        .await;
    }

    async fn write(
        &self,
        kind: AnalyticsEventKind,
        session_id: &str,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) {
        if !self.circuits.is_available(service::ANALYTICS) {
            tracing::debug!(session_id, ?kind, "analytics circuit open, skipping write");
            return;
        }

        let record = AnalyticsRecord {
            kind,
            session_id: session_id.to_string(),
            payload: convert(&payload),
            timestamp: now,
        };

        match self.store.put_record(record).await {
            Ok(()) => self.circuits.record_success(service::ANALYTICS),
            Err(err) => {
                self.circuits.record_failure(service::ANALYTICS);
                tracing::warn!(session_id, error = %err, "analytics write failed, dropping (best-effort)");
            }
        }
    }
}
