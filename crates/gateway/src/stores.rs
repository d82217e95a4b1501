//! Storage-boundary implementations backing this binary's writers and
//! workflow engine. The real conversation/analytics tables, ticket-number
//! store, and image blob store are out of scope for this crate (see
//! `conduit_core`'s store traits); these are the logging/in-memory
//! placeholders a real deployment swaps for its own KV/document store.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use conduit_core::error::WriterError;
use conduit_core::workflow::engine::ImageStore;
use conduit_core::workflow::{Ticket, TicketNumberStore, TicketStore, WorkflowEvent, WorkflowEventSink};
use conduit_core::writers::{AnalyticsRecord, AnalyticsStore, ConversationStore, ConversationTurn};
use conduit_core::error::WorkflowError;

/// Blob-reference prefix §8.6 names for incident photos.
const INCIDENT_BLOB_PREFIX: &str = "incidents/";

/// Writes each turn to the structured log rather than a document store.
#[derive(Default)]
pub struct LoggingConversationStore;

#[async_trait]
impl ConversationStore for LoggingConversationStore {
    async fn put_turn(&self, turn: ConversationTurn) -> Result<(), WriterError> {
        tracing::info!(
            session_id = %turn.session_id,
            message_id = %turn.message_id,
            role = ?turn.role,
            "conversation turn"
        );
        Ok(())
    }
}

/// Writes each analytics record to the structured log.
#[derive(Default)]
pub struct LoggingAnalyticsStore;

#[async_trait]
impl AnalyticsStore for LoggingAnalyticsStore {
    async fn put_record(&self, record: AnalyticsRecord) -> Result<(), WriterError> {
        tracing::info!(session_id = %record.session_id, kind = ?record.kind, "analytics record");
        Ok(())
    }
}

/// Process-local ticket-number reservation. A real deployment backs this
/// with the conditional-put semantics of its document store so reservations
/// are unique across gateway replicas, not just within one process.
#[derive(Default)]
pub struct InMemoryTicketStore {
    reserved: Mutex<HashSet<String>>,
}

#[async_trait]
impl TicketNumberStore for InMemoryTicketStore {
    async fn reserve(&self, ticket_number: &str) -> Result<bool, WorkflowError> {
        let mut reserved = self.reserved.lock().unwrap_or_else(|e| e.into_inner());
        Ok(reserved.insert(ticket_number.to_string()))
    }
}

/// Writes the durable ticket row to the structured log instead of the
/// document store's Tickets table (§6, TTL 90 days).
#[derive(Default)]
pub struct LoggingTicketStore;

#[async_trait]
impl TicketStore for LoggingTicketStore {
    async fn put_ticket(&self, ticket: Ticket) -> Result<(), WorkflowError> {
        tracing::info!(
            ticket_number = %ticket.ticket_number,
            category = %ticket.category,
            sub_category = %ticket.sub_category,
            feedback_class = %ticket.feedback_class,
            blob_reference = ?ticket.blob_reference,
            "ticket committed"
        );
        Ok(())
    }
}

/// Appends to the structured log instead of the Events (workflow) table
/// (§6: partition key = event id, secondary index on (ticket number,
/// timestamp)).
#[derive(Default)]
pub struct LoggingWorkflowEventSink;

#[async_trait]
impl WorkflowEventSink for LoggingWorkflowEventSink {
    async fn record(&self, event: WorkflowEvent) -> Result<(), WorkflowError> {
        tracing::info!(
            workflow_id = %event.workflow_id,
            ticket_number = %event.ticket_number,
            kind = ?event.kind,
            "workflow event"
        );
        Ok(())
    }
}

/// Logs the incident photo upload instead of writing to blob storage,
/// returning the key a real blob store would have written it under.
#[derive(Default)]
pub struct LoggingImageStore;

#[async_trait]
impl ImageStore for LoggingImageStore {
    async fn upload(&self, workflow_id: &str, image_base64: &str) -> Result<String, WorkflowError> {
        let blob_reference = format!("{INCIDENT_BLOB_PREFIX}{workflow_id}");
        tracing::info!(workflow_id, bytes = image_base64.len(), blob_reference = %blob_reference, "incident photo upload (logged, not persisted)");
        Ok(blob_reference)
    }
}
