//! Process supervision.
//!
//! Launches rendered commands either attached (with an optional watchdog)
//! or fully detached, and tears down the whole process tree when a
//! watchdog fires.

mod supervisor;

pub use supervisor::{split_command, ProcessSupervisor, DEFAULT_GRACE_PERIOD};
