//! Identity resolution with callsign/SSID delegation.
//!
//! An identity without an SSID suffix acts as a base entry: a request from
//! `X-n` may authenticate against either `X-n`'s own secret or `X`'s
//! secret. The reverse never holds; truncating a bare callsign yields
//! itself, never an SSID'd form, so `X` can only authenticate against `X`.

use tracing::debug;

use crate::error::{AuthErrorKind, BastionError};
use crate::store::StoreSnapshot;
use crate::validation::base_callsign;

use super::totp;

/// Command data carried by a successful resolution.
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    /// The command code the sender asked for.
    pub code: String,
    /// Template with `$0`..`$9` placeholders.
    pub command_string: String,
    /// Launch detached from the message flow.
    pub detached_launch: bool,
    /// Watchdog in seconds; 0.0 disables it.
    pub watchdog_timespan: f64,
}

/// Outcome of a successful resolution.
///
/// `callsign` is the callsign of the identity that verified the code,
/// which may be the SSID-less base rather than the callsign the message
/// carried.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub callsign: String,
    pub command: Option<ResolvedCommand>,
}

/// Resolve which stored identity a (callsign, code) pair authenticates,
/// and optionally look up a command binding on it.
///
/// Identities are scanned in store order; a candidate matches if its
/// callsign equals the presented callsign or its SSID-less base, and the
/// scan stops at the first candidate whose own secret verifies the code.
/// With `command_code` absent or empty, a successful resolution carries no
/// command data ("check credential only" mode).
///
/// # Errors
///
/// Every failure path is an authorization error; callers must surface all
/// of them identically so the public channel learns nothing about which
/// half failed.
pub fn resolve(
    snapshot: &StoreSnapshot,
    callsign: &str,
    totp_code: &str,
    command_code: Option<&str>,
    now: u64,
) -> Result<Resolution, BastionError> {
    let base = base_callsign(callsign);

    for identity in &snapshot.identities {
        if identity.callsign != callsign && identity.callsign != base {
            continue;
        }

        if !totp::verify(&identity.secret, totp_code, identity.ttl, now) {
            // A candidate whose secret does not verify is skipped, not
            // fatal; the other form may still match.
            continue;
        }

        debug!(
            presented = callsign,
            resolved = %identity.callsign,
            "Identity resolved"
        );

        let command_code = command_code.filter(|c| !c.is_empty());
        let command = match command_code {
            None => None,
            Some(code) => match identity.commands.get(code) {
                Some(binding) => Some(ResolvedCommand {
                    code: code.to_string(),
                    command_string: binding.command_string.clone(),
                    detached_launch: binding.detached_launch,
                    watchdog_timespan: binding.watchdog_timespan,
                }),
                None => {
                    return Err(BastionError::Authorization {
                        kind: AuthErrorKind::UnknownCommandCode,
                    })
                }
            },
        };

        return Ok(Resolution {
            callsign: identity.callsign.clone(),
            command,
        });
    }

    Err(BastionError::Authorization {
        kind: AuthErrorKind::NoMatchingIdentity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::code_at;

    const BASE_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";
    const SSID_SECRET: &str = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP";
    const NOW: u64 = 1_700_000_000;

    fn snapshot() -> StoreSnapshot {
        serde_yaml::from_str(&format!(
            r#"
identities:
  - callsign: DF1JSL
    secret: {BASE_SECRET}
    ttl: 30
    commands:
      ping:
        command_string: "echo $0 $1"
        detached_launch: false
        watchdog_timespan: 2.0
  - callsign: DF1JSL-1
    secret: {SSID_SECRET}
    ttl: 30
    commands:
      reboot:
        command_string: "systemctl reboot"
        detached_launch: true
        watchdog_timespan: 0.0
"#
        ))
        .unwrap()
    }

    fn base_code() -> String {
        code_at(BASE_SECRET, 30, NOW).unwrap()
    }

    fn ssid_code() -> String {
        code_at(SSID_SECRET, 30, NOW).unwrap()
    }

    #[test]
    fn test_own_secret_resolves_own_identity() {
        let snapshot = snapshot();
        let resolution = resolve(&snapshot, "DF1JSL-1", &ssid_code(), None, NOW).unwrap();
        assert_eq!(resolution.callsign, "DF1JSL-1");
    }

    #[test]
    fn test_ssid_delegates_to_base() {
        let snapshot = snapshot();
        let resolution = resolve(&snapshot, "DF1JSL-1", &base_code(), None, NOW).unwrap();
        assert_eq!(resolution.callsign, "DF1JSL");
    }

    #[test]
    fn test_base_cannot_use_ssid_secret() {
        let snapshot = snapshot();
        let result = resolve(&snapshot, "DF1JSL", &ssid_code(), None, NOW);
        assert!(matches!(
            result,
            Err(BastionError::Authorization {
                kind: AuthErrorKind::NoMatchingIdentity
            })
        ));
    }

    #[test]
    fn test_base_resolves_with_own_secret() {
        let snapshot = snapshot();
        let resolution = resolve(&snapshot, "DF1JSL", &base_code(), None, NOW).unwrap();
        assert_eq!(resolution.callsign, "DF1JSL");
    }

    #[test]
    fn test_unknown_callsign_delegates_to_base() {
        // DF1JSL-15 has no entry of its own but knows the base secret.
        let snapshot = snapshot();
        let resolution = resolve(&snapshot, "DF1JSL-15", &base_code(), None, NOW).unwrap();
        assert_eq!(resolution.callsign, "DF1JSL");
    }

    #[test]
    fn test_unknown_callsign_wrong_code() {
        let snapshot = snapshot();
        assert!(resolve(&snapshot, "DF1JSL-15", &ssid_code(), None, NOW).is_err());
        assert!(resolve(&snapshot, "DF1JSL-15", "000000", None, NOW).is_err());
    }

    #[test]
    fn test_command_lookup() {
        let snapshot = snapshot();
        let resolution =
            resolve(&snapshot, "DF1JSL", &base_code(), Some("ping"), NOW).unwrap();
        let command = resolution.command.unwrap();
        assert_eq!(command.command_string, "echo $0 $1");
        assert!(!command.detached_launch);
        assert_eq!(command.watchdog_timespan, 2.0);
    }

    #[test]
    fn test_unknown_command_is_unauthorized() {
        let snapshot = snapshot();
        let result = resolve(&snapshot, "DF1JSL", &base_code(), Some("nope"), NOW);
        assert!(matches!(
            result,
            Err(BastionError::Authorization {
                kind: AuthErrorKind::UnknownCommandCode
            })
        ));
    }

    #[test]
    fn test_delegated_command_comes_from_base_identity() {
        // The resolved identity's command map is consulted, not the
        // presented callsign's.
        let snapshot = snapshot();
        let resolution =
            resolve(&snapshot, "DF1JSL-15", &base_code(), Some("ping"), NOW).unwrap();
        assert_eq!(resolution.callsign, "DF1JSL");
        assert!(resolution.command.is_some());

        // "reboot" belongs to DF1JSL-1, not to the resolved base identity.
        assert!(resolve(&snapshot, "DF1JSL-15", &base_code(), Some("reboot"), NOW).is_err());
    }

    #[test]
    fn test_empty_command_code_is_credential_check() {
        let snapshot = snapshot();
        let resolution =
            resolve(&snapshot, "DF1JSL", &base_code(), Some(""), NOW).unwrap();
        assert!(resolution.command.is_none());
    }
}
