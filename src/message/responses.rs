//! Fixed outbound response statuses.
//!
//! The transport collaborator sends exactly one of these strings back to
//! the sender. Every authorization failure maps to the same undifferentiated
//! "403 forbidden"; the public channel must not learn which half failed.

use std::fmt;

/// Outbound response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    /// Command executed (attached launch accepted).
    Ok,
    /// Detached launch acknowledged; execution happens after the response.
    Accepted,
    /// Any authorization failure, deliberately undifferentiated.
    Forbidden,
    /// Correctable sender mistake: bad grammar or unresolved placeholders.
    NotExtended,
}

impl ResponseStatus {
    /// The wire string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Ok => "200 ok",
            ResponseStatus::Accepted => "200 accepted",
            ResponseStatus::Forbidden => "403 forbidden",
            ResponseStatus::NotExtended => "510 not extended",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_strings() {
        assert_eq!(ResponseStatus::Ok.as_str(), "200 ok");
        assert_eq!(ResponseStatus::Accepted.as_str(), "200 accepted");
        assert_eq!(ResponseStatus::Forbidden.as_str(), "403 forbidden");
        assert_eq!(ResponseStatus::NotExtended.as_str(), "510 not extended");
    }
}
