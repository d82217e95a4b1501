//! Incident-ticket workflow state: the draft/staged/committed ticket a
//! session works through before it lands in the ticket store. Grounded in
//! `mbpp_workflows.py`'s `MBPPWorkflowManager`, generalized from its three
//! hard-coded workflow actions to a [`WorkflowKind`] the caller selects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three incident-ticket workflow types (§3), matching
/// `complaint_workflow`/`text_incident_workflow`/`image_incident_workflow`
/// in `mbpp_workflows.py`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// A complaint about a civic issue (road damage, broken streetlight, ...).
    Complaint,
    /// An incident reported with a free-text description only.
    TextIncident,
    /// An incident reported with an attached photo.
    ImageIncident,
}

/// Linear step progression: collect a description, then the location,
/// then a hazard confirmation, then classify and stage a draft for the
/// user to confirm (§8.6). Steps only move forward, except
/// `AwaitingConfirmation` → `CollectingDescription` when the user rejects
/// the staged draft and wants to redo it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    CollectingDescription,
    CollectingLocation,
    HazardQuestion,
    Classifying,
    AwaitingConfirmation,
    Committing,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDraft {
    pub feedback_type: String,
    pub category: String,
    pub sub_category: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommittedTicket {
    pub ticket_number: String,
    pub submitted_at: DateTime<Utc>,
    pub image_uploaded: bool,
    pub blob_reference: Option<String>,
}

/// One in-progress (or finished) incident workflow, keyed by `workflow_id`
/// and tied to the session that started it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub workflow_id: String,
    pub session_id: String,
    pub kind: WorkflowKind,
    pub step: WorkflowStep,
    pub description: Option<String>,
    /// Free-text location, collected in `CollectingLocation` (§3's
    /// accumulator field of the same name).
    pub location: Option<String>,
    /// Whether the reporter confirmed this is blocking access or causing
    /// immediate danger, collected in `HazardQuestion` (§3's "hazard flag").
    pub hazard: Option<bool>,
    /// Held only until commit — the real upload happens post-confirmation,
    /// never before (see [`super::engine::WorkflowEngine::commit`]).
    pub pending_image_base64: Option<String>,
    pub draft: Option<TicketDraft>,
    pub committed: Option<CommittedTicket>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    pub fn new(workflow_id: impl Into<String>, session_id: impl Into<String>, kind: WorkflowKind, now: DateTime<Utc>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            session_id: session_id.into(),
            kind,
            step: WorkflowStep::CollectingDescription,
            description: None,
            location: None,
            hazard: None,
            pending_image_base64: None,
            draft: None,
            committed: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.step, WorkflowStep::Completed | WorkflowStep::Cancelled)
    }
}
