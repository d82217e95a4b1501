//! Session lifecycle manager: create, touch, expire, and sweep sessions.
//!
//! Backed by the [`SessionStore`] trait rather than a concrete KV client —
//! the real store (conditional-put, TTL) is out of scope for this core.

pub mod manager;
pub mod store;

pub use manager::{SessionManager, SessionManagerConfig};
pub use store::{ClientDescriptor, InMemorySessionStore, Session, SessionStatus, SessionStore};
