//! Incident-ticket workflow: a linear, resumable state machine for
//! collecting a description (and optional photo), classifying it, staging
//! a draft ticket for confirmation, and committing it with a reserved
//! ticket number.

pub mod classifier;
pub mod detect;
pub mod engine;
pub mod events;
pub mod state;
pub mod ticket;

pub use classifier::IncidentClassifier;
pub use detect::detect_workflow_kind;
pub use engine::{ImageStore, WorkflowEngine};
pub use events::{WorkflowEvent, WorkflowEventKind, WorkflowEventSink};
pub use state::{CommittedTicket, TicketDraft, WorkflowKind, WorkflowState, WorkflowStep};
pub use ticket::{reserve_ticket_number, Ticket, TicketNumberStore, TicketStatus, TicketStore, TICKET_TTL_DAYS};
