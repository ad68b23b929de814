//! Error taxonomy for the bastion core.
//!
//! Every failure a caller can observe falls into one of four classes:
//! store, authorization, format, or execution. The message responder
//! collapses each class to one of the fixed outbound status strings; the
//! full kind only ever reaches the log and the audit trail.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the bastion core.
#[derive(Error, Debug)]
pub enum BastionError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Credential store errors.
    #[error("Store error: {kind}")]
    Store { kind: StoreErrorKind },

    /// Authorization errors. All of these surface as "403 forbidden".
    #[error("Authorization error: {kind}")]
    Authorization { kind: AuthErrorKind },

    /// Inbound message / template format errors. Surface as "510 not extended".
    #[error("Format error: {kind}")]
    Format { kind: FormatErrorKind },

    /// Process execution errors. Logged and audited, never disclosed.
    #[error("Execution error: {kind}")]
    Exec { kind: ExecErrorKind },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Credential store error kinds.
///
/// A missing file is reported distinctly from an unreadable or malformed
/// one; callers may treat "file absent" as "not yet provisioned".
#[derive(Error, Debug)]
pub enum StoreErrorKind {
    #[error("Credential store not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Cannot read credential store {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Malformed credential store {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("Credential store {path} has no 'identities' collection")]
    MissingIdentities { path: PathBuf },

    #[error("Invalid identity entry '{callsign}': {message}")]
    InvalidEntry { callsign: String, message: String },
}

/// Authorization error kinds.
///
/// The distinction exists for the log and the audit trail only; the sender
/// always receives the same undifferentiated "403 forbidden".
#[derive(Error, Debug)]
pub enum AuthErrorKind {
    #[error("No identity verified the presented code")]
    NoMatchingIdentity,

    #[error("Resolved identity has no such command code")]
    UnknownCommandCode,

    #[error("Code already consumed (replay detected)")]
    DuplicateCode,
}

/// Format error kinds. These are correctable sender mistakes, not
/// security signals.
#[derive(Error, Debug)]
pub enum FormatErrorKind {
    #[error("Message does not match the expected grammar")]
    MalformedMessage,

    #[error("Sender callsign '{callsign}' is not a valid callsign")]
    CallsignSyntax { callsign: String },

    #[error("Command template left with unresolved placeholder {placeholder}")]
    UnresolvedPlaceholder { placeholder: String },
}

/// Process execution error kinds.
#[derive(Error, Debug)]
pub enum ExecErrorKind {
    #[error("Command string is empty after shell-word splitting")]
    EmptyCommand,

    #[error("Command string could not be parsed: {message}")]
    Parse { message: String },

    #[error("Executable not found: {program}")]
    NotFound { program: String },

    #[error("Permission denied: {program}")]
    PermissionDenied { program: String },

    #[error("Failed to launch '{program}': {message}")]
    LaunchFailed { program: String, message: String },

    #[error("Watchdog timeout after {watchdog_secs} seconds (pid {pid})")]
    TimedOut { watchdog_secs: f64, pid: u32 },

    #[error("Failed while waiting on process: {message}")]
    Wait { message: String },
}

/// Result type alias for bastion operations.
pub type BastionResult<T> = Result<T, BastionError>;
