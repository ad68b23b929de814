//! Inbound message handling.
//!
//! One message flows through one pipeline: parse → resolve identity →
//! replay check → render → replay commit → execute. Every exit maps to
//! one of the four fixed outbound statuses, and every decision leaves an
//! audit entry behind.
//!
//! Detached launches are not executed here: the handler hands a
//! [`DeferredExecution`] back to the caller, who sends the response first
//! and then calls [`MessageHandler::post_process`]. The sender gets an
//! acknowledgement even when the command itself is slow.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditEntry, AuditLogger, AuditOutcome};
use crate::auth::{resolve, ReplayCache, ReplayKey};
use crate::error::{AuthErrorKind, BastionError, FormatErrorKind};
use crate::exec::ProcessSupervisor;
use crate::message::{first_unresolved_placeholder, parse_message, render, ResponseStatus};
use crate::store::StoreHandle;
use crate::validation::{canonicalize_callsign, validate_callsign};

/// A detached launch waiting for the response to go out first.
#[derive(Debug, Clone)]
pub struct DeferredExecution {
    /// Request this launch belongs to.
    pub request_id: Uuid,
    /// Resolved callsign the command is bound to.
    pub callsign: String,
    /// The code that authorized the launch.
    pub totp_code: String,
    /// Fully rendered command string.
    pub command: String,
    /// Watchdog setting carried along; not applied to detached launches.
    pub watchdog_timespan: f64,
}

/// What the caller sends back, plus any deferred work.
#[derive(Debug)]
pub struct HandlerOutcome {
    /// The fixed status string for the transport collaborator.
    pub status: ResponseStatus,
    /// Present when a detached launch must run after the response.
    pub deferred: Option<DeferredExecution>,
}

/// The authorization-and-execution pipeline for inbound messages.
///
/// Safe for concurrent invocation: the store snapshot is read per call,
/// the replay cache serializes its own check-and-set, and the supervisor
/// holds no state.
pub struct MessageHandler {
    store: Arc<StoreHandle>,
    replay: Arc<ReplayCache>,
    supervisor: ProcessSupervisor,
    audit: Option<Arc<AuditLogger>>,
}

impl MessageHandler {
    /// Create a new handler around the shared store and replay cache.
    pub fn new(
        store: Arc<StoreHandle>,
        replay: Arc<ReplayCache>,
        supervisor: ProcessSupervisor,
        audit: Option<Arc<AuditLogger>>,
    ) -> Self {
        Self {
            store,
            replay,
            supervisor,
            audit,
        }
    }

    /// Handle one inbound message and decide the outbound status.
    ///
    /// Never returns an error: every failure is translated to a status
    /// here, and a bad command must not take down message processing for
    /// subsequent senders.
    pub fn handle_message(&self, from_callsign: &str, body: &str) -> HandlerOutcome {
        let request_id = Uuid::new_v4();
        let start = Instant::now();
        let sender = canonicalize_callsign(from_callsign);

        info!(
            request_id = %request_id,
            sender = %sender,
            "Handling inbound message"
        );

        let mut resolved: Option<String> = None;
        let mut command_code: Option<String> = None;

        let result =
            self.process(&sender, body, request_id, &mut resolved, &mut command_code);

        let (status, outcome, deferred) = match result {
            Ok(accepted) => accepted,
            Err(e) => {
                let status = match &e {
                    BastionError::Format { .. } => ResponseStatus::NotExtended,
                    _ => ResponseStatus::Forbidden,
                };
                warn!(
                    request_id = %request_id,
                    sender = %sender,
                    error = %e,
                    "Message rejected"
                );
                (
                    status,
                    AuditOutcome::Rejected {
                        reason: e.to_string(),
                    },
                    None,
                )
            }
        };

        self.write_audit(AuditEntry {
            timestamp: Utc::now().to_rfc3339(),
            request_id,
            sender,
            resolved,
            command_code,
            status: status.as_str().to_string(),
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
        });

        HandlerOutcome { status, deferred }
    }

    /// Run a deferred (detached) launch after the response has been sent.
    ///
    /// Launch failures are logged and audited; the sender already received
    /// "200 accepted" and learns nothing further.
    pub fn post_process(&self, deferred: DeferredExecution) {
        info!(
            request_id = %deferred.request_id,
            callsign = %deferred.callsign,
            command = %deferred.command,
            "Executing deferred command"
        );

        let start = Instant::now();
        let outcome = match self
            .supervisor
            .execute(&deferred.command, true, deferred.watchdog_timespan)
        {
            Ok(pid) => AuditOutcome::Accepted {
                detached: true,
                pid: Some(pid),
            },
            Err(e) => {
                error!(
                    request_id = %deferred.request_id,
                    error = %e,
                    "Deferred command failed to launch"
                );
                AuditOutcome::ExecutionFailed {
                    reason: e.to_string(),
                }
            }
        };

        self.write_audit(AuditEntry {
            timestamp: Utc::now().to_rfc3339(),
            request_id: deferred.request_id,
            sender: deferred.callsign.clone(),
            resolved: Some(deferred.callsign),
            command_code: None,
            status: ResponseStatus::Accepted.as_str().to_string(),
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    /// The pipeline proper. Returns the acceptance triple or the error
    /// that decides the rejection status.
    fn process(
        &self,
        sender: &str,
        body: &str,
        request_id: Uuid,
        resolved: &mut Option<String>,
        command_code: &mut Option<String>,
    ) -> Result<(ResponseStatus, AuditOutcome, Option<DeferredExecution>), BastionError> {
        validate_callsign(sender)?;

        let parsed = parse_message(body)?;
        *command_code = Some(parsed.command_code.clone());

        let snapshot = self.store.current();
        let now = unix_now();
        let resolution = resolve(
            &snapshot,
            sender,
            &parsed.totp_code,
            Some(&parsed.command_code),
            now,
        )?;
        *resolved = Some(resolution.callsign.clone());

        let Some(command) = resolution.command else {
            return Err(BastionError::Authorization {
                kind: AuthErrorKind::UnknownCommandCode,
            });
        };

        let key: ReplayKey = (resolution.callsign.clone(), parsed.totp_code.clone());
        if self.replay.seen(&key) {
            return Err(BastionError::Authorization {
                kind: AuthErrorKind::DuplicateCode,
            });
        }

        // params[0] is the resolved callsign, the rest are message tokens.
        let mut params = Vec::with_capacity(parsed.params.len() + 1);
        params.push(resolution.callsign.clone());
        params.extend(parsed.params.iter().cloned());

        let (rendered, missing) = render(&command.command_string, &params);
        if missing {
            let placeholder =
                first_unresolved_placeholder(&rendered).unwrap_or_else(|| "$?".to_string());
            return Err(BastionError::Format {
                kind: FormatErrorKind::UnresolvedPlaceholder { placeholder },
            });
        }

        // The command is now accepted; commit the pair. Two in-flight
        // duplicates can both pass seen(), only one wins the commit.
        if !self.replay.record(&key) {
            return Err(BastionError::Authorization {
                kind: AuthErrorKind::DuplicateCode,
            });
        }

        if command.detached_launch {
            let deferred = DeferredExecution {
                request_id,
                callsign: resolution.callsign,
                totp_code: parsed.totp_code,
                command: rendered,
                watchdog_timespan: command.watchdog_timespan,
            };
            return Ok((
                ResponseStatus::Accepted,
                AuditOutcome::Accepted {
                    detached: true,
                    pid: None,
                },
                Some(deferred),
            ));
        }

        match self
            .supervisor
            .execute(&rendered, false, command.watchdog_timespan)
        {
            Ok(pid) => {
                info!(
                    request_id = %request_id,
                    pid,
                    command = %rendered,
                    "Command executed"
                );
                Ok((
                    ResponseStatus::Ok,
                    AuditOutcome::Accepted {
                        detached: false,
                        pid: Some(pid),
                    },
                    None,
                ))
            }
            Err(e) => {
                // The request was accepted before the launch; execution
                // failures stay on our side of the channel.
                error!(
                    request_id = %request_id,
                    command = %rendered,
                    error = %e,
                    "Command execution failed"
                );
                Ok((
                    ResponseStatus::Ok,
                    AuditOutcome::ExecutionFailed {
                        reason: e.to_string(),
                    },
                    None,
                ))
            }
        }
    }

    fn write_audit(&self, entry: AuditEntry) {
        if let Some(logger) = &self.audit {
            if let Err(e) = logger.log(&entry) {
                error!(error = %e, "Failed to write audit log entry");
            }
        }
    }
}

/// Current unix time in seconds.
fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
