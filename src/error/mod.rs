//! Error types for the bastion core.

mod types;

pub use types::{
    AuthErrorKind, BastionError, BastionResult, ExecErrorKind, FormatErrorKind, StoreErrorKind,
};
