//! Per-connection message dispatch: session binding, single-flight
//! serialization per session, a soft deadline around the pipeline call,
//! and the dual-write fan-out once a reply is ready.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use conduit_core::model::Message;
use conduit_core::pipeline::{classification, Envelope, LanguageData, Pipeline, SentimentData};
use conduit_core::router::IntentRouter;
use conduit_core::session::{ClientDescriptor, SessionManager};
use conduit_core::workflow::{detect_workflow_kind, WorkflowEngine, WorkflowKind, WorkflowState, WorkflowStep};
use conduit_core::writers::{AnalyticsWriter, ConversationWriter, SessionEvent};
use conduit_core::ConduitError;

use crate::frame::{IngressMessage, WorkflowAction};

/// Turns kept per session for pipeline context. Bounded independently of
/// the pipelines' own history cap so the cache doesn't grow unbounded
/// across a long-lived connection.
const HISTORY_CACHE_CAP: usize = 20;

/// Bounds how long a single message may occupy the pipeline before the
/// dispatcher gives up and returns the model's own fallback envelope
/// shape, synthesized locally since the pipeline never got to run.
fn timeout_envelope(session_id: &str, response_ms: u64) -> Envelope {
    Envelope {
        session_id: session_id.to_string(),
        response: "I apologize, but I'm currently experiencing technical difficulties connecting \
                   to the AI service. Please try again in a few moments. If the issue persists, \
                   please contact support."
            .to_string(),
        classification: classification::ERROR_FALLBACK.to_string(),
        language_data: LanguageData {
            detected_language: "en".to_string(),
            language_name: "English".to_string(),
            confidence: 1.0,
        },
        sentiment_data: SentimentData {
            detected_sentiment: "NEUTRAL".to_string(),
            sentiment_confidence: 0.0,
            requires_attention: false,
            response_tone: "professional".to_string(),
        },
        sources: Vec::new(),
        tools_invoked: Vec::new(),
        is_fallback: true,
        parsing_error: None,
        response_ms,
    }
}

/// Builds a plain-text envelope for a workflow prompt/confirmation
/// message — never run through the model's structured-reply contract, so
/// the language/sentiment fields are neutral defaults rather than a real
/// classification.
fn workflow_envelope(session_id: &str, response: String, response_ms: u64) -> Envelope {
    Envelope {
        session_id: session_id.to_string(),
        response,
        classification: classification::WORKFLOW.to_string(),
        language_data: LanguageData {
            detected_language: "en".to_string(),
            language_name: "English".to_string(),
            confidence: 1.0,
        },
        sentiment_data: SentimentData {
            detected_sentiment: "NEUTRAL".to_string(),
            sentiment_confidence: 1.0,
            requires_attention: false,
            response_tone: "professional".to_string(),
        },
        sources: Vec::new(),
        tools_invoked: Vec::new(),
        is_fallback: false,
        parsing_error: None,
        response_ms,
    }
}

/// Per-step reply text shown to the user as they progress a chat-driven
/// workflow one message at a time, mirroring `mbpp_workflows.py`'s prompts.
fn workflow_prompt(state: &WorkflowState) -> String {
    match state.step {
        WorkflowStep::CollectingDescription => "Please describe the issue or incident.".to_string(),
        WorkflowStep::CollectingLocation => {
            "Thanks. Where is this happening? Please share the location.".to_string()
        }
        WorkflowStep::HazardQuestion => {
            "Is this blocking access or causing immediate danger? (yes/no)".to_string()
        }
        WorkflowStep::Classifying | WorkflowStep::Committing => {
            "One moment while we process your report...".to_string()
        }
        WorkflowStep::AwaitingConfirmation => match &state.draft {
            Some(draft) => format!(
                "Please confirm these details:\n\nCategory: {} - {}\nLocation: {}\n\nIs this correct? (yes to submit / no to start over)",
                draft.category,
                draft.sub_category,
                state.location.as_deref().unwrap_or("not specified"),
            ),
            None => "Is this correct? (yes to submit / no to start over)".to_string(),
        },
        WorkflowStep::Completed => {
            let ticket_number = state.committed.as_ref().map(|c| c.ticket_number.as_str()).unwrap_or("");
            format!("Thank you for your report. Your reference number is {ticket_number}.")
        }
        WorkflowStep::Cancelled => "Your report has been cancelled.".to_string(),
    }
}

/// Treats anything but an explicit "no" as an affirmative reply, mirroring
/// `mbpp_workflows.py`'s `confirmation.lower() == "no"` check.
fn is_negative_reply(text: &str) -> bool {
    matches!(text.trim().to_lowercase().as_str(), "no" | "n" | "no." | "nope")
}

#[derive(Default)]
struct HistoryCache {
    turns: Mutex<HashMap<String, VecDeque<Message>>>,
}

impl HistoryCache {
    fn snapshot(&self, session_id: &str) -> Vec<Message> {
        let guard = self.turns.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(session_id).map(|q| q.iter().cloned().collect()).unwrap_or_default()
    }

    fn push_exchange(&self, session_id: &str, user_text: &str, assistant_text: &str) {
        let mut guard = self.turns.lock().unwrap_or_else(|e| e.into_inner());
        let queue = guard.entry(session_id.to_string()).or_default();
        queue.push_back(Message::user(user_text));
        queue.push_back(Message::assistant(assistant_text));
        while queue.len() > HISTORY_CACHE_CAP {
            queue.pop_front();
        }
    }

    fn drop_session(&self, session_id: &str) {
        self.turns.lock().unwrap_or_else(|e| e.into_inner()).remove(session_id);
    }
}

/// One lock per live session, so concurrent frames on the same session
/// serialize instead of racing the pipeline and the writers.
#[derive(Default)]
struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    fn get(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut guard = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn drop_session(&self, session_id: &str) {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).remove(session_id);
    }
}

/// One incident-ticket workflow at a time per session — a second `start`
/// while one is already in flight replaces it, matching a single active
/// conversation thread per connection.
#[derive(Default)]
struct WorkflowSessions {
    active: Mutex<HashMap<String, WorkflowState>>,
}

impl WorkflowSessions {
    fn get(&self, session_id: &str) -> Option<WorkflowState> {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).get(session_id).cloned()
    }

    fn put(&self, session_id: &str, state: WorkflowState) {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).insert(session_id.to_string(), state);
    }

    fn drop_session(&self, session_id: &str) {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).remove(session_id);
    }
}

/// What `handle_message` hands back to the transport layer: the envelope
/// plus the message id/timestamp the egress frame needs (§6) but that the
/// pipeline-internal [`Envelope`] has no business carrying.
pub struct DispatchOutcome {
    pub envelope: Envelope,
    pub message_id: String,
    pub timestamp: chrono::DateTime<Utc>,
}

pub struct Dispatcher {
    sessions: Arc<SessionManager>,
    router: Arc<IntentRouter>,
    pipeline: Arc<Pipeline>,
    workflow_engine: Arc<WorkflowEngine>,
    conversation_writer: Arc<ConversationWriter>,
    analytics_writer: Arc<AnalyticsWriter>,
    message_deadline: Duration,
    history: HistoryCache,
    locks: SessionLocks,
    workflows: WorkflowSessions,
}

impl Dispatcher {
    pub fn new(
        sessions: Arc<SessionManager>,
        router: Arc<IntentRouter>,
        pipeline: Arc<Pipeline>,
        workflow_engine: Arc<WorkflowEngine>,
        conversation_writer: Arc<ConversationWriter>,
        analytics_writer: Arc<AnalyticsWriter>,
        message_deadline: Duration,
    ) -> Self {
        Self {
            sessions,
            router,
            pipeline,
            workflow_engine,
            conversation_writer,
            analytics_writer,
            message_deadline,
            history: HistoryCache::default(),
            locks: SessionLocks::default(),
            workflows: WorkflowSessions::default(),
        }
    }

    /// Resolves the session for an inbound frame: a live, ACTIVE session
    /// named by the message wins; otherwise the connection's bound id is
    /// used if still live; otherwise a fresh session is allocated.
    pub async fn resolve_session(
        &self,
        message_session_id: Option<&str>,
        connection_bound_id: &str,
        client: ClientDescriptor,
    ) -> String {
        if let Some(requested) = message_session_id {
            if let Ok(Some(session)) = self.sessions.get(requested).await {
                return session.session_id;
            }
        }
        if let Ok(Some(session)) = self.sessions.get(connection_bound_id).await {
            return session.session_id;
        }
        match self.sessions.create(Some(client)).await {
            Ok(session_id) => {
                self.analytics_writer.record_session(&session_id, SessionEvent::Created, Utc::now()).await;
                session_id
            }
            Err(_) => connection_bound_id.to_string(),
        }
    }

    pub async fn handle_message(&self, session_id: &str, inbound: IngressMessage) -> DispatchOutcome {
        let lock = self.locks.get(session_id);
        let _guard = lock.lock().await;
        let started = std::time::Instant::now();

        let envelope = if self.sessions.touch(session_id).await.is_err() {
            timeout_envelope(session_id, started.elapsed().as_millis() as u64)
        } else {
            // `timeout` drops `run_pipeline`'s future on expiry; since
            // nothing underneath (model client, retrieval, tool registry)
            // ever detaches onto its own spawned task, that drop already
            // tears down whatever transport call was in flight rather than
            // leaving it running to completion in the background.
            let deadline = self.message_deadline;
            let session_id_owned = session_id.to_string();
            match tokio::time::timeout(deadline, self.run_turn(&session_id_owned, &inbound)).await {
                Ok(envelope) => envelope,
                Err(_) => {
                    tracing::warn!(session_id, "pipeline exceeded soft deadline");
                    timeout_envelope(session_id, started.elapsed().as_millis() as u64)
                }
            }
        };

        self.history.push_exchange(session_id, &inbound.text, &envelope.response);

        let now = Utc::now();
        let message_id = inbound.message_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        if let Err(err) = self
            .conversation_writer
            .log(session_id, &message_id, &inbound.text, &envelope.response, now)
            .await
        {
            tracing::error!(session_id, error = %err, "conversation write failed");
        }
        self.analytics_writer
            .record_query(
                session_id,
                &envelope.classification,
                envelope.response_ms,
                envelope.is_fallback,
                envelope.sentiment_data.sentiment_confidence,
                now,
            )
            .await;
        if envelope.is_fallback {
            self.analytics_writer
                .record_error(session_id, "model", "pipeline returned a fallback envelope", now)
                .await;
        } else {
            self.analytics_writer
                .record_response_generated(session_id, &envelope.classification, envelope.response_ms, now)
                .await;
        }

        DispatchOutcome {
            envelope,
            message_id,
            timestamp: now,
        }
    }

    async fn run_pipeline(&self, session_id: &str, inbound: &IngressMessage) -> Envelope {
        let history = self.history.snapshot(session_id);
        let intent = self.router.classify(&inbound.text).await;
        self.pipeline.run(intent, session_id, &history, &inbound.text).await
    }

    /// Routes a chat turn: an active, non-terminal workflow owns the
    /// session's next message; otherwise a small keyword check decides
    /// whether this message should start one (mirroring
    /// `mbpp_workflows.py`'s `detect_workflow_type`); only ordinary chat
    /// falls through to the intent router and pipelines.
    async fn run_turn(&self, session_id: &str, inbound: &IngressMessage) -> Envelope {
        if let Some(mut state) = self.workflows.get(session_id) {
            if !state.is_terminal() {
                let envelope = self.advance_workflow(session_id, &mut state, inbound).await;
                self.workflows.put(session_id, state);
                return envelope;
            }
        }

        if let Some(kind) = detect_workflow_kind(&inbound.text, inbound.image_base64.is_some()) {
            let workflow_id = Uuid::new_v4().to_string();
            let mut state = self.workflow_engine.start(workflow_id, session_id, kind, Utc::now());
            let envelope = self.advance_workflow(session_id, &mut state, inbound).await;
            self.workflows.put(session_id, state);
            return envelope;
        }

        self.run_pipeline(session_id, inbound).await
    }

    /// Feeds one chat message into whatever step the workflow is
    /// currently on, running the model classification and ticket commit
    /// inline once the user's reply carries the workflow past
    /// `Classifying`/`Committing`, and returns the reply the user sees.
    async fn advance_workflow(&self, session_id: &str, state: &mut WorkflowState, inbound: &IngressMessage) -> Envelope {
        let started = std::time::Instant::now();
        let now = Utc::now();

        if let Some(image) = &inbound.image_base64 {
            if let Err(err) = self.workflow_engine.attach_image(state, image, now) {
                tracing::warn!(session_id, error = %err, "workflow image attach rejected");
            }
        }

        let transition = match state.step {
            WorkflowStep::CollectingDescription => self.workflow_engine.submit_description(state, &inbound.text, now),
            WorkflowStep::CollectingLocation => self.workflow_engine.submit_location(state, &inbound.text, now),
            WorkflowStep::HazardQuestion => {
                self.workflow_engine.submit_hazard(state, !is_negative_reply(&inbound.text), now)
            }
            WorkflowStep::AwaitingConfirmation => self.workflow_engine.confirm(state, !is_negative_reply(&inbound.text), now),
            WorkflowStep::Classifying | WorkflowStep::Committing | WorkflowStep::Completed | WorkflowStep::Cancelled => Ok(()),
        };

        if let Err(err) = transition {
            tracing::warn!(session_id, error = %err, "workflow transition rejected");
            return workflow_envelope(session_id, workflow_prompt(state), started.elapsed().as_millis() as u64);
        }

        if state.step == WorkflowStep::Classifying {
            if let Err(err) = self.workflow_engine.classify(state, now).await {
                tracing::error!(session_id, error = %err, "workflow classification failed");
            }
        }

        if state.step == WorkflowStep::Committing {
            let seed_millis = now.timestamp_millis().unsigned_abs();
            if let Err(err) = self.workflow_engine.commit(state, now, seed_millis).await {
                tracing::error!(session_id, error = %err, "workflow commit failed");
            }
        }

        workflow_envelope(session_id, workflow_prompt(state), started.elapsed().as_millis() as u64)
    }

    pub async fn close_session(&self, session_id: &str) {
        self.sessions.close(session_id).await.ok();
        self.history.drop_session(session_id);
        self.locks.drop_session(session_id);
        self.workflows.drop_session(session_id);
        self.analytics_writer.record_session(session_id, SessionEvent::Closed, Utc::now()).await;
    }

    /// Applies one workflow action to the session's in-flight incident
    /// workflow, starting one on `Start` if none is active, and classifies
    /// automatically once the hazard question is answered (the client sees
    /// a single `submit_hazard` round-trip land on `AwaitingConfirmation`
    /// rather than needing a separate "classify now" frame).
    pub async fn handle_workflow_action(
        &self,
        session_id: &str,
        action: WorkflowAction,
    ) -> Result<WorkflowState, ConduitError> {
        let lock = self.locks.get(session_id);
        let _guard = lock.lock().await;
        let now = Utc::now();

        let mut state = match (&action, self.workflows.get(session_id)) {
            (WorkflowAction::Start, _) | (_, None) => {
                let workflow_id = Uuid::new_v4().to_string();
                self.workflow_engine.start(workflow_id, session_id, WorkflowKind::Complaint, now)
            }
            (_, Some(existing)) => existing,
        };

        match action {
            WorkflowAction::Start => {}
            WorkflowAction::SubmitDescription { description } => {
                self.workflow_engine.submit_description(&mut state, &description, now)?;
            }
            WorkflowAction::SubmitLocation { location } => {
                self.workflow_engine.submit_location(&mut state, &location, now)?;
            }
            WorkflowAction::SubmitHazard { hazard } => {
                self.workflow_engine.submit_hazard(&mut state, hazard, now)?;
                self.workflow_engine.classify(&mut state, now).await?;
            }
            WorkflowAction::AttachImage { image_base64 } => {
                self.workflow_engine.attach_image(&mut state, &image_base64, now)?;
            }
            WorkflowAction::Confirm { approved } => {
                self.workflow_engine.confirm(&mut state, approved, now)?;
                if approved {
                    let seed_millis = now.timestamp_millis().unsigned_abs();
                    self.workflow_engine.commit(&mut state, now, seed_millis).await?;
                }
            }
            WorkflowAction::Cancel => {
                self.workflow_engine.cancel(&mut state, now)?;
            }
        }

        self.workflows.put(session_id, state.clone());
        Ok(state)
    }

    /// Periodic reaper: sweeps idle/closed sessions from the store. Meant
    /// to be driven by an external interval timer (see `main.rs`).
    pub async fn sweep(&self) -> usize {
        self.sessions.sweep().await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "session sweep failed");
            0
        })
    }
}
