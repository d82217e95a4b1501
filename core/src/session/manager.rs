//! Session lifecycle: create, get, touch, close, sweep.
//!
//! `get` never auto-resurrects an expired session — it is the caller's job
//! (the dispatcher) to allocate a fresh one and treat the old id as gone.
//! `touch` happens before pipeline execution so a concurrent [`sweep`] never
//! expires a session with an in-flight message (§5 ordering guarantee).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::store::{ClientDescriptor, Session, SessionStatus, SessionStore};
use crate::error::SessionError;

/// Safety factor applied to the configured timeout when writing the store's
/// TTL attribute, so a slow sweep cycle doesn't race the store's own reaper.
const TTL_SAFETY_FACTOR: i64 = 2;

#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    pub timeout: Duration,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::minutes(30),
        }
    }
}

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionManagerConfig,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, config: SessionManagerConfig) -> Self {
        Self { store, config }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// TTL to attach to the stored row: timeout * safety factor.
    pub fn ttl(&self) -> Duration {
        self.config.timeout * TTL_SAFETY_FACTOR as i32
    }

    pub async fn create(
        &self,
        client: Option<ClientDescriptor>,
    ) -> Result<String, SessionError> {
        let now = Utc::now();
        let session_id = Uuid::new_v4().to_string();
        let session = Session {
            session_id: session_id.clone(),
            created_at: now,
            last_activity: now,
            status: SessionStatus::Active,
            client,
            metadata: Default::default(),
        };
        self.store.put(session).await?;
        Ok(session_id)
    }

    /// Returns `None` if absent, not ACTIVE, or idle past the timeout.
    /// Expired rows are never resurrected.
    pub async fn get(&self, session_id: &str) -> Result<Option<Session>, SessionError> {
        self.get_at(session_id, Utc::now()).await
    }

    async fn get_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, SessionError> {
        let row = self.store.get_raw(session_id).await?;
        Ok(row.filter(|s| s.status == SessionStatus::Active && !s.is_expired(now, self.config.timeout)))
    }

    pub async fn touch(&self, session_id: &str) -> Result<(), SessionError> {
        self.store.touch(session_id, Utc::now()).await
    }

    pub async fn close(&self, session_id: &str) -> Result<(), SessionError> {
        // Best-effort per spec: swallow any store error past logging.
        if let Err(err) = self.store.close(session_id).await {
            tracing::warn!(session_id, error = %err, "session close failed (best-effort)");
        }
        Ok(())
    }

    /// Scans for idle/closed rows and deletes them in batches, returning the
    /// count removed. Intended to run on an external periodic schedule.
    pub async fn sweep(&self) -> Result<usize, SessionError> {
        let now = Utc::now();
        let expired = self.store.scan_expired(now, self.config.timeout).await?;
        for session_id in &expired {
            self.store.delete(session_id).await?;
        }
        Ok(expired.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::InMemorySessionStore;

    fn manager_with_timeout(timeout: Duration) -> SessionManager {
        SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            SessionManagerConfig { timeout },
        )
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let mgr = manager_with_timeout(Duration::minutes(30));
        let id = mgr.create(None).await.unwrap();
        let session = mgr.get(&id).await.unwrap().expect("session present");
        assert_eq!(session.session_id, id);
        assert!(session.last_activity >= session.created_at);
    }

    #[tokio::test]
    async fn touch_advances_last_activity_monotonically() {
        let mgr = manager_with_timeout(Duration::minutes(30));
        let id = mgr.create(None).await.unwrap();
        mgr.touch(&id).await.unwrap();
        let after_first = mgr.get(&id).await.unwrap().unwrap().last_activity;
        mgr.touch(&id).await.unwrap();
        let after_second = mgr.get(&id).await.unwrap().unwrap().last_activity;
        assert!(after_second >= after_first);
    }

    #[tokio::test]
    async fn touch_unknown_session_fails() {
        let mgr = manager_with_timeout(Duration::minutes(30));
        let err = mgr.touch("does-not-exist").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound));
    }

    #[tokio::test]
    async fn expired_session_is_not_resurrected() {
        let mgr = manager_with_timeout(Duration::minutes(30));
        let id = mgr.create(None).await.unwrap();
        let far_future = Utc::now() + Duration::minutes(31);
        let resolved = mgr.get_at(&id, far_future).await.unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn close_transitions_to_closed_and_get_returns_none() {
        let mgr = manager_with_timeout(Duration::minutes(30));
        let id = mgr.create(None).await.unwrap();
        mgr.close(&id).await.unwrap();
        assert!(mgr.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sweep_removes_closed_and_expired_then_is_idempotent() {
        let mgr = manager_with_timeout(Duration::minutes(30));
        let closed_id = mgr.create(None).await.unwrap();
        mgr.close(&closed_id).await.unwrap();
        let live_id = mgr.create(None).await.unwrap();

        let count = mgr.sweep().await.unwrap();
        assert_eq!(count, 1);
        assert!(mgr.get(&live_id).await.unwrap().is_some());

        let second_pass = mgr.sweep().await.unwrap();
        assert_eq!(second_pass, 0);
    }
}
