//! Command code validation.

use crate::error::{BastionError, StoreErrorKind};

/// Validate a command code as stored in an identity's command map.
///
/// Rules:
/// - Must not be empty
/// - Must be lowercase
/// - Must not contain whitespace
///
/// # Errors
///
/// Returns a store error naming the offending identity if the code fails
/// validation.
pub fn validate_command_code(callsign: &str, code: &str) -> Result<(), BastionError> {
    let invalid = |message: String| BastionError::Store {
        kind: StoreErrorKind::InvalidEntry {
            callsign: callsign.to_string(),
            message,
        },
    };

    if code.is_empty() {
        return Err(invalid("command code cannot be empty".to_string()));
    }
    if code.chars().any(|c| c.is_whitespace()) {
        return Err(invalid(format!("command code '{}' contains whitespace", code)));
    }
    if code.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(invalid(format!("command code '{}' must be lowercase", code)));
    }

    Ok(())
}
