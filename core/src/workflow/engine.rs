//! Incident-ticket workflow engine: deterministic step transitions plus
//! the two calls out to the model (classification) and the ticket store
//! (number reservation, image upload). Grounded in `mbpp_workflows.py`'s
//! `MBPPWorkflowManager`, whose linear step progression and
//! stage-then-commit ticket shape this mirrors.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::classifier::IncidentClassifier;
use super::events::{WorkflowEvent, WorkflowEventKind, WorkflowEventSink};
use super::state::{CommittedTicket, WorkflowKind, WorkflowState, WorkflowStep};
use super::ticket::{reserve_ticket_number, Ticket, TicketNumberStore, TicketStatus, TicketStore};
use crate::error::WorkflowError;

/// Fallback for a committed ticket whose workflow somehow reached
/// `Committing` without a recorded location (shouldn't happen — `commit`
/// requires `Committing`, which is only reachable through
/// `CollectingLocation` — but a missing value shouldn't block the write).
const UNSPECIFIED_LOCATION: &str = "not specified";

/// Storage boundary for the incident photo, uploaded only once the user
/// has confirmed the staged draft — never before, so an abandoned
/// workflow never leaves an orphaned blob behind. Returns the blob
/// reference the ticket row stores (§8.6: stored under the `incidents/`
/// prefix).
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, workflow_id: &str, image_base64: &str) -> Result<String, WorkflowError>;
}

pub struct WorkflowEngine {
    classifier: IncidentClassifier,
    ticket_number_store: Arc<dyn TicketNumberStore>,
    ticket_store: Arc<dyn TicketStore>,
    image_store: Arc<dyn ImageStore>,
    events: Arc<dyn WorkflowEventSink>,
}

impl WorkflowEngine {
    pub fn new(
        classifier: IncidentClassifier,
        ticket_number_store: Arc<dyn TicketNumberStore>,
        ticket_store: Arc<dyn TicketStore>,
        image_store: Arc<dyn ImageStore>,
        events: Arc<dyn WorkflowEventSink>,
    ) -> Self {
        Self {
            classifier,
            ticket_number_store,
            ticket_store,
            image_store,
            events,
        }
    }

    pub fn start(&self, workflow_id: impl Into<String>, session_id: impl Into<String>, kind: WorkflowKind, now: DateTime<Utc>) -> WorkflowState {
        WorkflowState::new(workflow_id, session_id, kind, now)
    }

    /// Records the free-text description and advances to `CollectingLocation`
    /// (`mbpp_workflows.py:515`'s "Where is this?" prompt follows this step).
    pub fn submit_description(&self, state: &mut WorkflowState, description: &str, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        require_step(state, WorkflowStep::CollectingDescription)?;
        state.description = Some(description.to_string());
        state.step = WorkflowStep::CollectingLocation;
        state.updated_at = now;
        Ok(())
    }

    /// Records the free-text location and advances to `HazardQuestion`.
    pub fn submit_location(&self, state: &mut WorkflowState, location: &str, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        require_step(state, WorkflowStep::CollectingLocation)?;
        state.location = Some(location.to_string());
        state.step = WorkflowStep::HazardQuestion;
        state.updated_at = now;
        Ok(())
    }

    /// Records whether the reporter confirmed a hazard (blocking access or
    /// immediate danger, `mbpp_workflows.py:549`/`:632`) and advances to
    /// `Classifying`.
    pub fn submit_hazard(&self, state: &mut WorkflowState, hazard: bool, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        require_step(state, WorkflowStep::HazardQuestion)?;
        state.hazard = Some(hazard);
        state.step = WorkflowStep::Classifying;
        state.updated_at = now;
        Ok(())
    }

    /// Attaches a photo for classification. Only valid before the draft is
    /// staged — a photo arriving after confirmation belongs to a new
    /// workflow, not a revision of this one.
    pub fn attach_image(&self, state: &mut WorkflowState, image_base64: &str, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if !matches!(
            state.step,
            WorkflowStep::CollectingDescription
                | WorkflowStep::CollectingLocation
                | WorkflowStep::HazardQuestion
                | WorkflowStep::Classifying
        ) {
            return Err(WorkflowError::PreconditionViolation(
                "images can only be attached before the draft is staged".to_string(),
            ));
        }
        state.pending_image_base64 = Some(image_base64.to_string());
        state.updated_at = now;
        Ok(())
    }

    /// Runs classification against the recorded description (and photo,
    /// if any) and stages a draft for the user to confirm.
    pub async fn classify(&self, state: &mut WorkflowState, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        require_step(state, WorkflowStep::Classifying)?;
        let description = state
            .description
            .clone()
            .ok_or_else(|| WorkflowError::PreconditionViolation("no description recorded".to_string()))?;

        let draft = self
            .classifier
            .classify(&description, state.pending_image_base64.as_deref())
            .await;

        state.draft = Some(draft);
        state.step = WorkflowStep::AwaitingConfirmation;
        state.updated_at = now;
        Ok(())
    }

    /// The user either approves the staged draft (→ `Committing`) or
    /// rejects it, which sends the workflow back to collect a fresh
    /// description rather than retrying classification on stale input.
    pub fn confirm(&self, state: &mut WorkflowState, approved: bool, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        require_step(state, WorkflowStep::AwaitingConfirmation)?;
        if approved {
            state.step = WorkflowStep::Committing;
        } else {
            state.draft = None;
            state.description = None;
            state.location = None;
            state.hazard = None;
            state.step = WorkflowStep::CollectingDescription;
        }
        state.updated_at = now;
        Ok(())
    }

    /// Cancels the workflow outright from any non-terminal step.
    pub fn cancel(&self, state: &mut WorkflowState, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if state.is_terminal() {
            return Err(WorkflowError::PreconditionViolation("workflow already finished".to_string()));
        }
        state.step = WorkflowStep::Cancelled;
        state.updated_at = now;
        Ok(())
    }

    /// Reserves a ticket number, uploads the pending photo if one was
    /// attached, writes the durable ticket row, appends an
    /// `incident_created` event, and marks the workflow complete. Nothing
    /// here is durable until this call: the staged draft only becomes a
    /// ticket on positive confirmation (§4.11).
    pub async fn commit(&self, state: &mut WorkflowState, now: DateTime<Utc>, seed_millis: u64) -> Result<(), WorkflowError> {
        require_step(state, WorkflowStep::Committing)?;
        let draft = state
            .draft
            .clone()
            .ok_or_else(|| WorkflowError::PreconditionViolation("no draft staged to commit".to_string()))?;

        let ticket_number = reserve_ticket_number(self.ticket_number_store.as_ref(), now, seed_millis).await?;

        let blob_reference = if let Some(image) = &state.pending_image_base64 {
            Some(self.image_store.upload(&state.workflow_id, image).await?)
        } else {
            None
        };

        let ticket = Ticket {
            ticket_number: ticket_number.clone(),
            subject: format!("{} / {}", draft.category, draft.sub_category),
            details: draft.description.clone(),
            location: state.location.clone().unwrap_or_else(|| UNSPECIFIED_LOCATION.to_string()),
            feedback_class: draft.feedback_type.clone(),
            category: draft.category.clone(),
            sub_category: draft.sub_category.clone(),
            created_at: now,
            status: TicketStatus::Open,
            blob_reference: blob_reference.clone(),
        };
        self.ticket_store.put_ticket(ticket).await?;

        self.events
            .record(WorkflowEvent {
                kind: WorkflowEventKind::IncidentCreated,
                workflow_id: state.workflow_id.clone(),
                ticket_number: ticket_number.clone(),
                timestamp: now,
            })
            .await?;

        state.committed = Some(CommittedTicket {
            ticket_number,
            submitted_at: now,
            image_uploaded: blob_reference.is_some(),
            blob_reference,
        });
        state.pending_image_base64 = None;
        state.step = WorkflowStep::Completed;
        state.updated_at = now;
        Ok(())
    }
}

fn require_step(state: &WorkflowState, expected: WorkflowStep) -> Result<(), WorkflowError> {
    if state.step != expected {
        return Err(WorkflowError::PreconditionViolation(format!(
            "expected step {expected:?}, workflow {} is at {:?}",
            state.workflow_id, state.step
        )));
    }
    Ok(())
}
