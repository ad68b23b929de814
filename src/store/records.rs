//! Credential store records.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{BastionError, StoreErrorKind};
use crate::validation::{validate_callsign, validate_command_code};

/// Permitted range for an identity's TOTP time-step interval, in seconds.
pub const TTL_RANGE: std::ops::RangeInclusive<u32> = 30..=300;

/// One command registered for an identity.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandBinding {
    /// Template with `$0`..`$9` placeholders; `$0` is the resolved callsign.
    pub command_string: String,
    /// Launch the process detached from the message flow.
    #[serde(default)]
    pub detached_launch: bool,
    /// Watchdog in seconds; 0.0 disables it. Only meaningful for
    /// attached launches.
    #[serde(default)]
    pub watchdog_timespan: f64,
}

/// One identity entry: a callsign, its TOTP secret, and its command map.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    /// Canonical uppercase callsign, optionally with an `-SSID` suffix.
    pub callsign: String,
    /// Base32 TOTP shared secret.
    pub secret: String,
    /// TOTP time-step interval in seconds (30..=300).
    pub ttl: u32,
    /// command code → binding.
    #[serde(default)]
    pub commands: HashMap<String, CommandBinding>,
}

/// An immutable snapshot of the credential store.
///
/// Identities keep their document order; the resolver scans them in that
/// order and stops at the first verifying match.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreSnapshot {
    pub identities: Vec<Identity>,
}

impl StoreSnapshot {
    /// Validate every entry of a freshly parsed snapshot.
    ///
    /// Checks the callsign grammar, the ttl range, command code shape,
    /// watchdog sanity, and callsign uniqueness. Any violation makes the
    /// whole document invalid; the loader then keeps the previous
    /// snapshot.
    pub fn validate(&self) -> Result<(), BastionError> {
        let mut seen = std::collections::HashSet::new();

        for identity in &self.identities {
            let invalid = |message: String| BastionError::Store {
                kind: StoreErrorKind::InvalidEntry {
                    callsign: identity.callsign.clone(),
                    message,
                },
            };

            validate_callsign(&identity.callsign).map_err(|_| {
                invalid("callsign does not match the callsign grammar".to_string())
            })?;

            if !seen.insert(identity.callsign.as_str()) {
                return Err(invalid("duplicate callsign entry".to_string()));
            }

            if identity.secret.trim().is_empty() {
                return Err(invalid("secret cannot be empty".to_string()));
            }

            if !TTL_RANGE.contains(&identity.ttl) {
                return Err(invalid(format!(
                    "ttl {} outside permitted range {}..={}",
                    identity.ttl,
                    TTL_RANGE.start(),
                    TTL_RANGE.end()
                )));
            }

            for (code, binding) in &identity.commands {
                validate_command_code(&identity.callsign, code)?;

                if binding.command_string.trim().is_empty() {
                    return Err(invalid(format!("command '{}' has an empty command_string", code)));
                }
                if !binding.watchdog_timespan.is_finite() || binding.watchdog_timespan < 0.0 {
                    return Err(invalid(format!(
                        "command '{}' has an invalid watchdog_timespan",
                        code
                    )));
                }
            }
        }

        Ok(())
    }
}
