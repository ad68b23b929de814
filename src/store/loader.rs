//! Credential store file I/O.

use std::path::Path;
use std::time::SystemTime;

use tracing::debug;

use crate::error::{BastionError, StoreErrorKind};

use super::records::StoreSnapshot;

/// Load and validate a credential store document.
///
/// A missing file, an unreadable file, a document that does not parse,
/// and a document without the top-level `identities` collection are all
/// reported as distinct store error kinds.
pub fn load(path: &Path) -> Result<StoreSnapshot, BastionError> {
    if !path.is_file() {
        return Err(BastionError::Store {
            kind: StoreErrorKind::NotFound {
                path: path.to_path_buf(),
            },
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| BastionError::Store {
        kind: StoreErrorKind::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        },
    })?;

    let document: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| BastionError::Store {
            kind: StoreErrorKind::Malformed {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })?;

    // The 'identities' collection is the structural anchor of the document;
    // its absence is reported separately from a file that does not parse.
    let has_identities = document.is_mapping() && document.get("identities").is_some();
    if !has_identities {
        return Err(BastionError::Store {
            kind: StoreErrorKind::MissingIdentities {
                path: path.to_path_buf(),
            },
        });
    }

    let snapshot: StoreSnapshot =
        serde_yaml::from_value(document).map_err(|e| BastionError::Store {
            kind: StoreErrorKind::Malformed {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })?;

    snapshot.validate()?;

    debug!(
        path = %path.display(),
        identities = snapshot.identities.len(),
        "Credential store loaded"
    );

    Ok(snapshot)
}

/// The modification timestamp of the store file, if it exists.
pub fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
