//! Input validation for the bastion core.
//!
//! Validates callsigns and command codes before they are allowed anywhere
//! near the credential store or the process supervisor.

mod callsign;
mod command_code;

pub use callsign::{base_callsign, canonicalize_callsign, validate_callsign};
pub use command_code::validate_command_code;
