//! Audit trail for the Gantry gateway
//!
//! Every request outcome and policy decision becomes one structured JSON
//! event, written synchronously to a JSON-lines file (optionally mirrored to
//! stdout) and appended to a SQLite history table.

pub mod error;
pub mod event;
pub mod logger;
pub mod sink;
pub mod store;

pub use error::{AuditError, AuditResult};
pub use event::{AuditEvent, EventStatus, EventType, MAX_FIELD_LEN, TRUNCATION_MARKER};
pub use logger::AuditLogger;
pub use sink::JsonLinesSink;
pub use store::AuditStore;
