//! Audit logger for writing audit entries to file.
//!
//! Writes structured audit entries as JSON lines (one JSON object per
//! line) for easy parsing by log analysis tools.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::BastionError;

use super::entry::AuditEntry;

/// Logger for audit entries.
///
/// Thread-safe via internal mutex; opens the file in append mode.
pub struct AuditLogger {
    file: Mutex<File>,
    path: PathBuf,
}

impl AuditLogger {
    /// Create a new audit logger that writes to the specified path.
    ///
    /// Creates the parent directory if it doesn't exist.
    pub fn new(path: &Path) -> Result<Self, BastionError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                debug!(path = %parent.display(), "Creating audit log directory");
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        debug!(path = %path.display(), "Audit logger initialized");

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    /// Serialize an entry to JSON and append it as a single line.
    pub fn log(&self, entry: &AuditEntry) -> Result<(), BastionError> {
        let json = serde_json::to_string(entry)?;

        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(file, "{}", json)?;

        if let Err(e) = file.sync_data() {
            warn!(error = %e, "Failed to sync audit log");
        }

        debug!(
            request_id = %entry.request_id,
            sender = %entry.sender,
            status = %entry.status,
            "Audit entry logged"
        );

        Ok(())
    }

    /// Get the path to the audit log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
