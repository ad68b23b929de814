//! Time-based one-time-password verification (RFC 6238).
//!
//! Codes are six decimal digits derived from an HMAC-SHA1 over the current
//! time step. Verification accepts the current step plus one step of clock
//! skew in either direction; the replay cache's max-age is sized to cover
//! that widened validity window.

use data_encoding::BASE32_NOPAD;
use ring::constant_time;
use ring::hmac;

use crate::error::{BastionError, StoreErrorKind};

/// Number of digits in a code.
const CODE_DIGITS: usize = 6;

/// Accepted clock-skew tolerance, in time steps on either side of now.
const SKEW_STEPS: u64 = 1;

/// Verify a 6-digit code against a base32 secret and a time-step interval.
///
/// `now` is the current unix time in seconds. Input that is not exactly
/// six ASCII digits is rejected without attempting verification, as is a
/// secret that does not decode. Comparison is constant-time per candidate
/// step.
pub fn verify(secret: &str, code: &str, ttl_interval: u32, now: u64) -> bool {
    if !is_well_formed_code(code) {
        return false;
    }

    let key = match decode_secret(secret) {
        Ok(key) => key,
        Err(_) => return false,
    };

    let interval = u64::from(ttl_interval.max(1));
    let step = now / interval;

    let first = step.saturating_sub(SKEW_STEPS);
    let last = step + SKEW_STEPS;

    for candidate in first..=last {
        let expected = hotp(&key, candidate);
        if constant_time::verify_slices_are_equal(code.as_bytes(), expected.as_bytes()).is_ok() {
            return true;
        }
    }

    false
}

/// The code a secret produces at a given unix time.
///
/// Used by tests and by credential-check tooling; the hot path goes
/// through [`verify`].
pub fn code_at(secret: &str, ttl_interval: u32, time: u64) -> Result<String, BastionError> {
    let key = decode_secret(secret)?;
    let interval = u64::from(ttl_interval.max(1));
    Ok(hotp(&key, time / interval))
}

/// A code is exactly six ASCII digits.
fn is_well_formed_code(code: &str) -> bool {
    code.len() == CODE_DIGITS && code.bytes().all(|b| b.is_ascii_digit())
}

/// Decode a base32 secret into an HMAC-SHA1 key.
///
/// Accepts lowercase, embedded spaces, and trailing padding, all of which
/// provisioning tools commonly emit.
fn decode_secret(secret: &str) -> Result<hmac::Key, BastionError> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let normalized = normalized.trim_end_matches('=');

    let bytes = BASE32_NOPAD
        .decode(normalized.as_bytes())
        .map_err(|e| BastionError::Store {
            kind: StoreErrorKind::InvalidEntry {
                callsign: String::new(),
                message: format!("secret is not valid base32: {}", e),
            },
        })?;

    Ok(hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, &bytes))
}

/// RFC 4226 HOTP with dynamic truncation, zero-padded to six digits.
fn hotp(key: &hmac::Key, counter: u64) -> String {
    let tag = hmac::sign(key, &counter.to_be_bytes());
    let digest = tag.as_ref();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = (u32::from(digest[offset]) & 0x7f) << 24
        | u32::from(digest[offset + 1]) << 16
        | u32::from(digest[offset + 2]) << 8
        | u32::from(digest[offset + 3]);

    format!("{:06}", binary % 1_000_000)
}
