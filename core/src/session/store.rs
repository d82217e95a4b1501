//! Session storage trait and an in-memory implementation.
//!
//! The production store is the out-of-scope key-value document store
//! (conditional-put, TTL). This crate depends only on the [`SessionStore`]
//! trait; `InMemorySessionStore` is the test double used by unit and
//! integration tests and is not meant to back a real deployment.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// ACTIVE→CLOSED only; never resurrected once CLOSED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Active,
    Closed,
}

/// Client-side connection metadata, modeled as a typed struct rather than a
/// loose map (free-form metadata still gets its own map for genuinely
/// dynamic fields).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientDescriptor {
    pub user_agent: Option<String>,
    pub source_addr: Option<String>,
    pub connection_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub status: SessionStatus,
    pub client: Option<ClientDescriptor>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_activity) >= timeout
    }
}

/// Storage boundary for sessions. A conditional-put-like `create` and a
/// conditional `touch` are modeled explicitly since the real store enforces
/// them at the KV layer.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, session: Session) -> Result<(), SessionError>;
    async fn get_raw(&self, session_id: &str) -> Result<Option<Session>, SessionError>;
    /// Advances `last_activity` iff the row exists and is ACTIVE.
    async fn touch(&self, session_id: &str, now: DateTime<Utc>) -> Result<(), SessionError>;
    async fn close(&self, session_id: &str) -> Result<(), SessionError>;
    /// Returns sessions eligible for removal: CLOSED, or idle past `timeout`.
    async fn scan_expired(
        &self,
        now: DateTime<Utc>,
        timeout: chrono::Duration,
    ) -> Result<Vec<String>, SessionError>;
    async fn delete(&self, session_id: &str) -> Result<(), SessionError>;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    rows: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, session: Session) -> Result<(), SessionError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.insert(session.session_id.clone(), session);
        Ok(())
    }

    async fn get_raw(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows.get(session_id).cloned())
    }

    async fn touch(&self, session_id: &str, now: DateTime<Utc>) -> Result<(), SessionError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        match rows.get_mut(session_id) {
            Some(row) if row.status == SessionStatus::Active => {
                row.last_activity = row.last_activity.max(now);
                Ok(())
            }
            _ => Err(SessionError::NotFound),
        }
    }

    async fn close(&self, session_id: &str) -> Result<(), SessionError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(row) = rows.get_mut(session_id) {
            row.status = SessionStatus::Closed;
        }
        Ok(())
    }

    async fn scan_expired(
        &self,
        now: DateTime<Utc>,
        timeout: chrono::Duration,
    ) -> Result<Vec<String>, SessionError> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        Ok(rows
            .values()
            .filter(|row| row.status == SessionStatus::Closed || row.is_expired(now, timeout))
            .map(|row| row.session_id.clone())
            .collect())
    }

    async fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.remove(session_id);
        Ok(())
    }
}
