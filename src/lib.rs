//! APRS Bastion Library
//!
//! This crate provides the authorization-and-execution core of a
//! TOTP-secured APRS command bastion: a credential store keyed by
//! callsign, identity resolution with SSID delegation, replay protection,
//! command template rendering, and supervised process execution.
//!
//! The APRS-IS transport is an external collaborator; it feeds inbound
//! (callsign, message) pairs into [`handler::MessageHandler`] and sends
//! the returned fixed status string back to the sender.

pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod exec;
pub mod handler;
pub mod message;
pub mod store;
pub mod validation;
