//! Authorization layer.
//!
//! Everything between "a message arrived" and "a command ran": TOTP
//! verification, callsign/SSID identity resolution, and replay protection.

mod replay;
mod resolver;
mod totp;

pub use replay::{ReplayCache, ReplayKey};
pub use resolver::{resolve, ResolvedCommand, Resolution};
pub use totp::{code_at, verify};
