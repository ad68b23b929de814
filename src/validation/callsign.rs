//! Amateur-radio callsign validation.
//!
//! A callsign is 1-3 alphanumerics, a digit, 0-3 alphanumerics, and an
//! optional `-` plus 1-2 alphanumerics (the SSID). The SSID-less base form
//! is obtained by truncating at the first dash.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{BastionError, FormatErrorKind};

/// Pattern for a callsign with an optional SSID suffix.
const CALLSIGN_PATTERN: &str = r"^[A-Z0-9]{1,3}[0-9][A-Z0-9]{0,3}(-[A-Z0-9]{1,2})?$";

fn callsign_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CALLSIGN_PATTERN).expect("callsign pattern is valid"))
}

/// Validate a callsign against the amateur-radio callsign grammar.
///
/// The input is expected in canonical uppercase form; use
/// [`canonicalize_callsign`] first for raw transport input.
///
/// # Errors
///
/// Returns a format error if the callsign does not match the grammar.
pub fn validate_callsign(callsign: &str) -> Result<&str, BastionError> {
    if callsign_regex().is_match(callsign) {
        Ok(callsign)
    } else {
        Err(BastionError::Format {
            kind: FormatErrorKind::CallsignSyntax {
                callsign: callsign.to_string(),
            },
        })
    }
}

/// Canonicalize a raw callsign: trim and uppercase.
pub fn canonicalize_callsign(callsign: &str) -> String {
    callsign.trim().to_ascii_uppercase()
}

/// The SSID-less base form of a callsign.
///
/// Truncates at the first `-`; a callsign without an SSID maps to itself.
pub fn base_callsign(callsign: &str) -> &str {
    match callsign.find('-') {
        Some(pos) => &callsign[..pos],
        None => callsign,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_callsigns() {
        assert!(validate_callsign("DF1JSL").is_ok());
        assert!(validate_callsign("DF1JSL-1").is_ok());
        assert!(validate_callsign("DF1JSL-15").is_ok());
        assert!(validate_callsign("W1AW").is_ok());
        assert!(validate_callsign("K9X").is_ok());
        assert!(validate_callsign("2E0ABC-9").is_ok());
    }

    #[test]
    fn test_invalid_callsigns() {
        assert!(validate_callsign("").is_err());
        assert!(validate_callsign("df1jsl").is_err()); // not canonicalized
        assert!(validate_callsign("DF1JSL-123").is_err()); // SSID too long
        assert!(validate_callsign("DF1JSL-").is_err());
        assert!(validate_callsign("TOOLONGCALL").is_err());
        assert!(validate_callsign("ABCD1").is_err()); // 4 leading alphanumerics
        assert!(validate_callsign("DF1 JSL").is_err());
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(canonicalize_callsign(" df1jsl-1 "), "DF1JSL-1");
        assert_eq!(canonicalize_callsign("W1AW"), "W1AW");
    }

    #[test]
    fn test_base_callsign() {
        assert_eq!(base_callsign("DF1JSL-1"), "DF1JSL");
        assert_eq!(base_callsign("DF1JSL-15"), "DF1JSL");
        assert_eq!(base_callsign("DF1JSL"), "DF1JSL");
    }
}
