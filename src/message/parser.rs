//! Inbound APRS message parser.
//!
//! A valid message is a six-digit code, optional whitespace, then one to
//! ten space-separated tokens. The first token is the command code, the
//! rest are positional parameters. The whole body is lowercased before
//! matching; APRS radios routinely uppercase everything.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{BastionError, FormatErrorKind};

/// Maximum APRS message body length in bytes.
pub const MAX_MESSAGE_LEN: usize = 67;

/// Six digits at the start, optional space(s), then 1-10 words.
const MESSAGE_PATTERN: &str = r"^(?P<code>\d{6})\s*(?P<params>\S+(?: \S+){0,9})$";

fn message_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MESSAGE_PATTERN).expect("message pattern is valid"))
}

/// A dismantled inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    /// The six-digit code, exactly as sent.
    pub totp_code: String,
    /// First token after the code, lowercased.
    pub command_code: String,
    /// Remaining tokens (0..=9), lowercased.
    pub params: Vec<String>,
}

/// Parse an inbound message body.
///
/// # Errors
///
/// Returns a format error if the body is empty, too long, or does not
/// match the grammar.
pub fn parse_message(body: &str) -> Result<ParsedMessage, BastionError> {
    let malformed = || BastionError::Format {
        kind: FormatErrorKind::MalformedMessage,
    };

    if body.is_empty() || body.len() > MAX_MESSAGE_LEN {
        return Err(malformed());
    }

    let body = body.trim().to_ascii_lowercase();
    let captures = message_regex().captures(&body).ok_or_else(malformed)?;

    let totp_code = captures["code"].to_string();
    let mut tokens: Vec<String> = captures["params"]
        .split_whitespace()
        .map(|t| t.to_string())
        .collect();

    // The grammar guarantees at least one token.
    let command_code = tokens.remove(0);

    Ok(ParsedMessage {
        totp_code,
        command_code,
        params: tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_and_command_only() {
        let parsed = parse_message("471123 ping").unwrap();
        assert_eq!(parsed.totp_code, "471123");
        assert_eq!(parsed.command_code, "ping");
        assert!(parsed.params.is_empty());
    }

    #[test]
    fn test_code_with_params() {
        let parsed = parse_message("471123 ping hi there").unwrap();
        assert_eq!(parsed.command_code, "ping");
        assert_eq!(parsed.params, vec!["hi", "there"]);
    }

    #[test]
    fn test_no_space_after_code() {
        let parsed = parse_message("471123ping").unwrap();
        assert_eq!(parsed.totp_code, "471123");
        assert_eq!(parsed.command_code, "ping");
    }

    #[test]
    fn test_lowercasing() {
        let parsed = parse_message("471123 PING ALPHA").unwrap();
        assert_eq!(parsed.command_code, "ping");
        assert_eq!(parsed.params, vec!["alpha"]);
    }

    #[test]
    fn test_max_param_count() {
        // command code + 9 parameters = 10 tokens, the maximum.
        let body = "471123 cmd p1 p2 p3 p4 p5 p6 p7 p8 p9";
        let parsed = parse_message(body).unwrap();
        assert_eq!(parsed.params.len(), 9);

        // An 11th token breaks the grammar.
        let body = "471123 cmd p1 p2 p3 p4 p5 p6 p7 p8 p9 p10";
        assert!(parse_message(body).is_err());
    }

    #[test]
    fn test_rejects_missing_code() {
        assert!(parse_message("ping hi").is_err());
        assert!(parse_message("12345 ping").is_err());
        assert!(parse_message("1234567 ping").is_err());
    }

    #[test]
    fn test_rejects_code_without_command() {
        assert!(parse_message("471123").is_err());
        assert!(parse_message("471123 ").is_err());
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(parse_message("").is_err());
        let oversized = format!("471123 {}", "x".repeat(MAX_MESSAGE_LEN));
        assert!(parse_message(&oversized).is_err());
    }
}
