//! Ingress/egress websocket frame shapes. Ingress normalizes two
//! historical client shapes — `{action, message}` and `{type, content}` —
//! into one internal type, since both are still in the wild and the
//! gateway can't require clients to migrate in lockstep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `type` discriminant on an inbound `user_message`-shaped frame
/// (§6): chat traffic goes to the pipelines, `ping` is answered inline by
/// the transport loop, `system` is a small closed admin-command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressKind {
    UserMessage,
    Ping,
    System,
}

#[derive(Debug, Clone)]
pub struct IngressMessage {
    pub session_id: Option<String>,
    pub text: String,
    pub image_base64: Option<String>,
    pub message_id: Option<String>,
    pub kind: IngressKind,
}

/// Parses a raw inbound JSON payload into an [`IngressMessage`], accepting
/// either historical shape (`{action, message}` or `{type, content}`).
/// Returns `None` if neither shape yields a non-empty text field, mirroring
/// §4.12's validation that `content` must be a non-empty string.
pub fn parse_ingress(value: &Value) -> Option<IngressMessage> {
    let obj = value.as_object()?;

    let text = obj
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| obj.get("content").and_then(Value::as_str))
        .or_else(|| obj.get("text").and_then(Value::as_str));

    let kind = match obj.get("type").or_else(|| obj.get("action")).and_then(Value::as_str) {
        Some("ping") => IngressKind::Ping,
        Some("system") => IngressKind::System,
        _ => IngressKind::UserMessage,
    };

    // A `user_message` frame MUST carry non-empty text (§4.12); `ping` and
    // `system` frames carry no content requirement.
    let text = match kind {
        IngressKind::UserMessage => {
            let text = text?;
            if text.is_empty() {
                return None;
            }
            text.to_string()
        }
        IngressKind::Ping | IngressKind::System => text.unwrap_or_default().to_string(),
    };

    let session_id = obj
        .get("sessionId")
        .or_else(|| obj.get("session_id"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let image_base64 = obj
        .get("imageBase64")
        .or_else(|| obj.get("image_base64"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let message_id = obj
        .get("messageId")
        .or_else(|| obj.get("message_id"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(IngressMessage {
        session_id,
        text,
        image_base64,
        message_id,
        kind,
    })
}

/// Sent once per connection, immediately after the websocket upgrade
/// (§4.12 "connect" event), carrying the session id the client should echo
/// back on subsequent frames.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionEstablishedFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ConnectionEstablishedFrame {
    pub fn new(session_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            frame_type: "connection_established",
            session_id: session_id.into(),
            timestamp,
        }
    }
}

/// Reply to an inbound `ping` frame, echoing the message id (§4.12).
#[derive(Debug, Clone, Serialize)]
pub struct PongFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    #[serde(rename = "messageId")]
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
}

impl PongFrame {
    pub fn new(message_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            frame_type: "pong",
            message_id: message_id.into(),
            timestamp,
        }
    }
}

/// Reply to the small closed set of `system` admin commands (§4.12).
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponseFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub status: &'static str,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

impl StatusResponseFrame {
    pub fn new(session_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            frame_type: "status_response",
            status: "ok",
            session_id: session_id.into(),
            timestamp,
        }
    }
}

/// `assistant_message` egress frame, field-for-field per §6's external
/// interface (the wire names there are the camelCase/snake_case mix shown
/// in the spec, not a single convention — kept verbatim rather than
/// normalized, since clients depend on the exact names).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgressFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub content: String,
    pub query_type: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(rename = "tools_used", default)]
    pub tools_used: Vec<String>,
    pub language_data: EgressLanguageData,
    pub sentiment_data: EgressSentimentData,
    #[serde(skip_serializing_if = "is_false")]
    pub is_fallback: bool,
}

fn is_false(value: &bool) -> bool {
    !value
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgressLanguageData {
    pub detected_language: String,
    pub language_name: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EgressSentimentData {
    pub sentiment: String,
    pub confidence: f32,
    pub requires_attention: bool,
}

impl EgressFrame {
    pub fn from_outcome(outcome: crate::dispatcher::DispatchOutcome) -> Self {
        let envelope = outcome.envelope;
        Self {
            frame_type: "assistant_message",
            message_id: outcome.message_id,
            session_id: envelope.session_id,
            timestamp: outcome.timestamp,
            content: envelope.response,
            query_type: envelope.classification,
            sources: envelope.sources.into_iter().map(|s| s.source).collect(),
            tools_used: envelope.tools_invoked,
            language_data: EgressLanguageData {
                detected_language: envelope.language_data.detected_language,
                language_name: envelope.language_data.language_name,
                confidence: envelope.language_data.confidence,
            },
            sentiment_data: EgressSentimentData {
                sentiment: envelope.sentiment_data.detected_sentiment,
                confidence: envelope.sentiment_data.sentiment_confidence,
                requires_attention: envelope.sentiment_data.requires_attention,
            },
            is_fallback: envelope.is_fallback,
        }
    }
}

/// An error frame sent when a frame can't even be parsed, so the client
/// gets a structured response instead of a silently dropped connection.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    pub message: String,
}

impl ErrorFrame {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            frame_type: "error",
            message: message.into(),
        }
    }
}

/// An inbound frame that drives the incident-ticket workflow instead of
/// the chat pipelines, distinguished by `"type": "workflow_action"`.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowAction {
    Start,
    SubmitDescription { description: String },
    SubmitLocation { location: String },
    SubmitHazard { hazard: bool },
    AttachImage { image_base64: String },
    Confirm { approved: bool },
    Cancel,
}

pub fn parse_workflow_action(value: &Value) -> Option<WorkflowAction> {
    let obj = value.as_object()?;
    if obj.get("type").and_then(Value::as_str) != Some("workflow_action") {
        return None;
    }
    match obj.get("action").and_then(Value::as_str)? {
        "start" => Some(WorkflowAction::Start),
        "submit_description" => Some(WorkflowAction::SubmitDescription {
            description: obj.get("description").and_then(Value::as_str)?.to_string(),
        }),
        "submit_location" => Some(WorkflowAction::SubmitLocation {
            location: obj.get("location").and_then(Value::as_str)?.to_string(),
        }),
        "submit_hazard" => Some(WorkflowAction::SubmitHazard {
            hazard: obj.get("hazard").and_then(Value::as_bool)?,
        }),
        "attach_image" => Some(WorkflowAction::AttachImage {
            image_base64: obj.get("imageBase64").and_then(Value::as_str)?.to_string(),
        }),
        "confirm" => Some(WorkflowAction::Confirm {
            approved: obj.get("approved").and_then(Value::as_bool).unwrap_or(false),
        }),
        "cancel" => Some(WorkflowAction::Cancel),
        _ => None,
    }
}

/// Egress snapshot of a workflow's current state, sent after every
/// workflow frame so the client can render the step it's on.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowFrame {
    #[serde(rename = "type")]
    pub frame_type: &'static str,
    #[serde(rename = "workflowId")]
    pub workflow_id: String,
    pub step: conduit_core::workflow::WorkflowStep,
    pub draft: Option<conduit_core::workflow::TicketDraft>,
    pub committed: Option<conduit_core::workflow::CommittedTicket>,
}

impl From<&conduit_core::workflow::WorkflowState> for WorkflowFrame {
    fn from(state: &conduit_core::workflow::WorkflowState) -> Self {
        Self {
            frame_type: "workflow_state",
            workflow_id: state.workflow_id.clone(),
            step: state.step,
            draft: state.draft.clone(),
            committed: state.committed.clone(),
        }
    }
}
