//! Chat-driven workflow entry: a small closed keyword set decides whether
//! a plain `user_message` should start an incident-ticket workflow instead
//! of routing through the intent router. Grounded in `mbpp_workflows.py`'s
//! `detect_workflow_type`.

use super::state::WorkflowKind;

const INCIDENT_KEYWORDS: &[&str] = &[
    "incident", "report", "emergency", "hazard", "fallen tree", "pothole", "flood", "accident", "blocking",
];
const COMPLAINT_KEYWORDS: &[&str] = &["complaint", "feedback", "service error", "system down", "website", "not working", "issue"];

/// Returns the workflow kind a fresh chat message should start, or `None`
/// if the message reads as ordinary chat traffic (§4.11's "user replies
/// drive transitions" only applies once a workflow is already active; this
/// decides whether one should become active in the first place).
pub fn detect_workflow_kind(text: &str, has_image: bool) -> Option<WorkflowKind> {
    let lowered = text.to_lowercase();
    let has_incident = INCIDENT_KEYWORDS.iter().any(|k| lowered.contains(k));
    let has_complaint = COMPLAINT_KEYWORDS.iter().any(|k| lowered.contains(k));

    if has_image && has_incident {
        Some(WorkflowKind::ImageIncident)
    } else if has_incident {
        Some(WorkflowKind::TextIncident)
    } else if has_complaint {
        Some(WorkflowKind::Complaint)
    } else {
        None
    }
}
