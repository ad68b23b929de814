//! Audit logging.
//!
//! Every handled message leaves one JSON-lines entry behind: who sent
//! what, how it resolved, and what happened.

mod entry;
mod logger;

pub use entry::{AuditEntry, AuditOutcome};
pub use logger::AuditLogger;
