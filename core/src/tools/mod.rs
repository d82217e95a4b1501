//! Tool registry & RPC: schema-validated invocation of out-of-process
//! tools over a request/response transport, plus model-backed tool
//! identification from free-form user text.

pub mod registry;
pub mod rpc;
pub mod schema;

pub use registry::ToolRegistry;
pub use rpc::{HttpToolTransport, InMemoryToolTransport, ToolTransport};
pub use schema::{ToolDescriptor, ToolSchemaFile};
