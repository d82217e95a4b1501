//! Ticket numbering: a human-readable number derived from the clock, with
//! conditional-put-and-retry against collisions. Grounded in
//! `mbpp_workflows.py`'s `_generate_ticket_number`
//! (`20000 + unix_millis % 10000`, dated) and its retry-on-conflict loop
//! around the ticket store's conditional put.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

const TICKET_BASE: u64 = 20_000;
const TICKET_MODULUS: u64 = 10_000;
/// Resolves the Open Question on ticket-number contention: retry a bounded
/// number of times rather than failing the whole workflow on the first
/// collision, since collisions are expected to be rare and transient.
const MAX_RESERVE_ATTEMPTS: u32 = 5;

/// Durable row lifetime once written (§6's "Tickets table ... TTL 90 days").
pub const TICKET_TTL_DAYS: i64 = 90;

/// Storage boundary for ticket-number reservation. `reserve` must behave
/// like a conditional put: `Ok(true)` iff this call claimed the number,
/// `Ok(false)` iff it was already taken.
#[async_trait]
pub trait TicketNumberStore: Send + Sync {
    async fn reserve(&self, ticket_number: &str) -> Result<bool, WorkflowError>;
}

/// A committed incident ticket's durable status. The spec names only the
/// value a freshly committed ticket carries; later statuses (e.g. an
/// external case-management sync marking it resolved) are out of scope
/// for this engine, which only ever writes `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
}

/// The durable ticket record (§3): everything the workflow engine commits
/// to the ticket store on positive confirmation, independent of the
/// in-memory [`super::state::WorkflowState`] that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_number: String,
    pub subject: String,
    pub details: String,
    pub location: String,
    pub feedback_class: String,
    pub category: String,
    pub sub_category: String,
    pub created_at: DateTime<Utc>,
    pub status: TicketStatus,
    pub blob_reference: Option<String>,
}

/// Storage boundary for the durable ticket row, separate from
/// [`TicketNumberStore`] since number reservation is a conditional-put
/// concern that happens before the rest of the ticket's fields exist.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn put_ticket(&self, ticket: Ticket) -> Result<(), WorkflowError>;
}

/// Builds the ticket number string `{n}/{YYYY}/{MM}/{DD}` from a timestamp
/// and a millisecond value. The millisecond value is passed in rather than
/// read from the clock internally so retries can vary it deterministically.
fn format_ticket_number(now: DateTime<Utc>, millis: u64) -> String {
    let n = TICKET_BASE + (millis % TICKET_MODULUS);
    format!("{n}/{}", now.format("%Y/%m/%d"))
}

/// Attempts to reserve a ticket number, retrying with a perturbed
/// millisecond value on collision up to [`MAX_RESERVE_ATTEMPTS`] times.
pub async fn reserve_ticket_number(
    store: &dyn TicketNumberStore,
    now: DateTime<Utc>,
    seed_millis: u64,
) -> Result<String, WorkflowError> {
    for attempt in 0..MAX_RESERVE_ATTEMPTS {
        let candidate = format_ticket_number(now, seed_millis.wrapping_add(attempt as u64));
        if store.reserve(&candidate).await? {
            return Ok(candidate);
        }
        tracing::warn!(candidate, attempt, "ticket number collision, retrying");
    }
    Err(WorkflowError::TicketAllocationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn formats_expected_shape() {
        let now = DateTime::parse_from_rfc3339("2026-07-28T10:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(format_ticket_number(now, 12345), "22345/2026/07/28");
    }

    #[test]
    fn wraps_modulus_correctly() {
        let now = DateTime::parse_from_rfc3339("2026-07-28T10:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(format_ticket_number(now, 99_999), format!("{}/2026/07/28", TICKET_BASE + 9999));
    }

    struct FakeStore {
        taken: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TicketNumberStore for FakeStore {
        async fn reserve(&self, ticket_number: &str) -> Result<bool, WorkflowError> {
            let mut taken = self.taken.lock().unwrap();
            if taken.contains(&ticket_number.to_string()) {
                Ok(false)
            } else {
                taken.push(ticket_number.to_string());
                Ok(true)
            }
        }
    }

    #[tokio::test]
    async fn reserves_first_candidate_when_free() {
        let store = FakeStore { taken: Mutex::new(Vec::new()) };
        let now = Utc::now();
        let number = reserve_ticket_number(&store, now, 1).await.unwrap();
        assert_eq!(number, format_ticket_number(now, 1));
    }

    #[tokio::test]
    async fn retries_on_collision_until_free_candidate_found() {
        let now = Utc::now();
        let first = format_ticket_number(now, 1);
        let store = FakeStore { taken: Mutex::new(vec![first]) };
        let number = reserve_ticket_number(&store, now, 1).await.unwrap();
        assert_eq!(number, format_ticket_number(now, 2));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let now = Utc::now();
        let all_taken: Vec<String> = (0..MAX_RESERVE_ATTEMPTS as u64).map(|i| format_ticket_number(now, i)).collect();
        let store = FakeStore { taken: Mutex::new(all_taken) };
        let err = reserve_ticket_number(&store, now, 0).await.unwrap_err();
        assert!(matches!(err, WorkflowError::TicketAllocationFailed));
    }
}
