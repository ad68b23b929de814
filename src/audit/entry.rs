//! Audit entry types.

use serde::Serialize;
use uuid::Uuid;

/// A single audit log entry for one handled message.
///
/// The TOTP code itself is never written out; the code is single-use
/// secret material even after consumption, the audit trail only needs to
/// say that one was presented.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    /// ISO 8601 timestamp when the message was handled.
    pub timestamp: String,
    /// Unique identifier for the request.
    pub request_id: Uuid,
    /// Callsign the message arrived under.
    pub sender: String,
    /// Identity the code resolved to, when resolution succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<String>,
    /// Command code the sender asked for, when the message parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_code: Option<String>,
    /// The status string returned to the sender.
    pub status: String,
    /// What happened.
    pub outcome: AuditOutcome,
    /// Handling duration in milliseconds.
    pub duration_ms: u64,
}

/// Outcome of handling a message, for audit purposes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum AuditOutcome {
    /// A command was accepted for execution.
    #[serde(rename = "accepted")]
    Accepted {
        detached: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        pid: Option<u32>,
    },
    /// The message was rejected; `reason` carries the internal error kind.
    #[serde(rename = "rejected")]
    Rejected { reason: String },
    /// The command was accepted but its execution failed or timed out.
    #[serde(rename = "execution_failed")]
    ExecutionFailed { reason: String },
}
