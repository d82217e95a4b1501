//! Dual writers: conversation (sequential, must-succeed) and analytics
//! (isolated, best-effort).

pub mod analytics;
pub mod conversation;
pub mod decimal;

pub use analytics::{AnalyticsEventKind, AnalyticsRecord, AnalyticsStore, AnalyticsWriter, SessionEvent};
pub use conversation::{ConversationStore, ConversationTurn, ConversationWriter, Role as ConversationRole};
pub use decimal::{convert, AnalyticsValue};
