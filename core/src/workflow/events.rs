//! Workflow event log: the append-only trail distinct from the analytics
//! table (§6's "Events (workflow) table", partition key = event id,
//! secondary index on (ticket number, timestamp)).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEventKind {
    IncidentCreated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub kind: WorkflowEventKind,
    pub workflow_id: String,
    pub ticket_number: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait WorkflowEventSink: Send + Sync {
    async fn record(&self, event: WorkflowEvent) -> Result<(), WorkflowError>;
}
