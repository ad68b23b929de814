//! Supervised subprocess execution.
//!
//! A command string is split per shell-word rules (quoting respected) and
//! executed one of three ways:
//!
//! - detached: own process group, stdio detached, returns the pid
//!   immediately and never looks back
//! - attached without watchdog: blocks until natural exit, captures and
//!   logs stdout/stderr
//! - attached with watchdog: polls for completion; on deadline the entire
//!   process group gets SIGTERM, a grace period, then SIGKILL
//!
//! Every failure comes back as a value; a bad command must not take down
//! message processing for subsequent senders.

use std::io;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{BastionError, ExecErrorKind};

/// Poll interval while waiting on an attached child.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default grace period between SIGTERM and SIGKILL.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Split a command string into argv per shell-word-splitting rules.
///
/// # Errors
///
/// Returns a parse error for unbalanced quoting and an empty-command
/// error if nothing remains after splitting.
pub fn split_command(command: &str) -> Result<Vec<String>, BastionError> {
    let argv = shell_words::split(command).map_err(|e| BastionError::Exec {
        kind: ExecErrorKind::Parse {
            message: e.to_string(),
        },
    })?;

    if argv.is_empty() {
        return Err(BastionError::Exec {
            kind: ExecErrorKind::EmptyCommand,
        });
    }

    Ok(argv)
}

/// Supervisor for launching and terminating rendered commands.
pub struct ProcessSupervisor {
    /// Time allowed between the graceful and the forceful phase of a
    /// watchdog termination.
    grace_period: Duration,
}

impl ProcessSupervisor {
    /// Create a supervisor with the given termination grace period.
    pub fn new(grace_period: Duration) -> Self {
        Self { grace_period }
    }

    /// Execute a command string.
    ///
    /// Returns the child pid. A watchdog expiry is reported as a distinct
    /// timed-out error carrying the pid; by the time that error is
    /// returned the process tree no longer exists.
    pub fn execute(
        &self,
        command: &str,
        detached: bool,
        watchdog_secs: f64,
    ) -> Result<u32, BastionError> {
        if !watchdog_secs.is_finite() || watchdog_secs < 0.0 {
            return Err(BastionError::Exec {
                kind: ExecErrorKind::Parse {
                    message: format!("invalid watchdog timespan {}", watchdog_secs),
                },
            });
        }

        let argv = split_command(command)?;
        let program = argv[0].clone();

        debug!(
            program = %program,
            detached,
            watchdog_secs,
            "Executing command"
        );

        if detached {
            self.launch_detached(&argv)
        } else {
            self.launch_attached(&argv, watchdog_secs)
        }
    }

    /// Start a process in its own group with stdio detached and return
    /// immediately. No exit status is ever observed and no watchdog
    /// applies.
    fn launch_detached(&self, argv: &[String]) -> Result<u32, BastionError> {
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let child = cmd.spawn().map_err(|e| spawn_error(&argv[0], &e))?;
        let pid = child.id();

        debug!(pid, program = %argv[0], "Detached process started");
        Ok(pid)
    }

    /// Run a process attached to the message flow, with output capture
    /// and an optional watchdog.
    fn launch_attached(&self, argv: &[String], watchdog_secs: f64) -> Result<u32, BastionError> {
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            // Own process group, so the watchdog can signal the whole tree.
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn().map_err(|e| spawn_error(&argv[0], &e))?;
        let pid = child.id();
        debug!(pid, program = %argv[0], "Process started");

        if watchdog_secs == 0.0 {
            // No watchdog: block until natural completion.
            return self.reap(child, pid, &argv[0]);
        }

        let deadline = Instant::now() + Duration::from_secs_f64(watchdog_secs);
        loop {
            match child.try_wait() {
                Ok(Some(_)) => return self.reap(child, pid, &argv[0]),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!(
                            pid,
                            program = %argv[0],
                            watchdog_secs,
                            "Watchdog timeout reached, terminating process tree"
                        );
                        self.terminate_tree(&mut child);
                        return Err(BastionError::Exec {
                            kind: ExecErrorKind::TimedOut { watchdog_secs, pid },
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(BastionError::Exec {
                        kind: ExecErrorKind::Wait {
                            message: e.to_string(),
                        },
                    })
                }
            }
        }
    }

    /// Collect the child's output, log it, and return the pid.
    fn reap(&self, child: Child, pid: u32, program: &str) -> Result<u32, BastionError> {
        let output = child.wait_with_output().map_err(|e| BastionError::Exec {
            kind: ExecErrorKind::Wait {
                message: e.to_string(),
            },
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            debug!(pid, program, stdout = %stdout.trim_end(), "Process stdout");
        }
        if !stderr.trim().is_empty() {
            warn!(pid, program, stderr = %stderr.trim_end(), "Process stderr");
        }

        debug!(
            pid,
            program,
            exit_code = ?output.status.code(),
            "Process finished"
        );
        Ok(pid)
    }

    /// Two-phase termination of the child's entire process group:
    /// SIGTERM, wait up to the grace period, SIGKILL survivors, reap.
    #[cfg(unix)]
    fn terminate_tree(&self, child: &mut Child) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        // The child was launched as its own group leader, so its pid is
        // the pgid of the whole tree.
        let pgid = Pid::from_raw(child.id() as i32);

        if let Err(e) = killpg(pgid, Signal::SIGTERM) {
            warn!(pid = child.id(), error = %e, "SIGTERM to process group failed");
        }

        let deadline = Instant::now() + self.grace_period;
        let mut exited = false;
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(Some(_)) => {
                    exited = true;
                    break;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(50)),
                Err(e) => {
                    warn!(pid = child.id(), error = %e, "Wait after SIGTERM failed");
                    break;
                }
            }
        }

        if !exited {
            if let Err(e) = killpg(pgid, Signal::SIGKILL) {
                warn!(pid = child.id(), error = %e, "SIGKILL to process group failed");
            }
            if let Err(e) = child.wait() {
                warn!(pid = child.id(), error = %e, "Failed to reap killed process");
            }
        }
    }

    /// Best-effort fallback without process groups: kill the root and reap.
    #[cfg(not(unix))]
    fn terminate_tree(&self, child: &mut Child) {
        if let Err(e) = child.kill() {
            warn!(pid = child.id(), error = %e, "Kill failed");
        }
        let _ = child.wait();
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

/// Map a spawn failure onto the execution error taxonomy.
fn spawn_error(program: &str, e: &io::Error) -> BastionError {
    let kind = match e.kind() {
        io::ErrorKind::NotFound => ExecErrorKind::NotFound {
            program: program.to_string(),
        },
        io::ErrorKind::PermissionDenied => ExecErrorKind::PermissionDenied {
            program: program.to_string(),
        },
        _ => ExecErrorKind::LaunchFailed {
            program: program.to_string(),
            message: e.to_string(),
        },
    };
    BastionError::Exec { kind }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_respects_quoting() {
        let argv = split_command("notify 'hello world' --flag").unwrap();
        assert_eq!(argv, vec!["notify", "hello world", "--flag"]);
    }

    #[test]
    fn test_split_empty_command() {
        let err = split_command("   ").unwrap_err();
        assert!(matches!(
            err,
            BastionError::Exec {
                kind: ExecErrorKind::EmptyCommand
            }
        ));
    }

    #[test]
    fn test_split_unbalanced_quote() {
        assert!(matches!(
            split_command("echo 'oops").unwrap_err(),
            BastionError::Exec {
                kind: ExecErrorKind::Parse { .. }
            }
        ));
    }

    #[test]
    fn test_attached_no_watchdog() {
        let supervisor = ProcessSupervisor::default();
        let pid = supervisor.execute("echo hello", false, 0.0).unwrap();
        assert!(pid > 0);
    }

    #[test]
    fn test_attached_nonzero_exit_is_not_an_error() {
        // Exit status is logged, not judged; the launch itself succeeded.
        let supervisor = ProcessSupervisor::default();
        assert!(supervisor.execute("false", false, 0.0).is_ok());
    }

    #[test]
    fn test_executable_not_found() {
        let supervisor = ProcessSupervisor::default();
        let err = supervisor
            .execute("no_such_program_48151623", false, 0.0)
            .unwrap_err();
        assert!(matches!(
            err,
            BastionError::Exec {
                kind: ExecErrorKind::NotFound { .. }
            }
        ));
    }

    #[test]
    fn test_detached_returns_immediately() {
        let supervisor = ProcessSupervisor::default();
        let start = Instant::now();
        let pid = supervisor.execute("sleep 2", true, 0.0).unwrap();
        assert!(pid > 0);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_watchdog_completes_in_time() {
        let supervisor = ProcessSupervisor::default();
        let pid = supervisor.execute("echo quick", false, 5.0).unwrap();
        assert!(pid > 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_watchdog_terminates_process_tree() {
        use nix::sys::signal::killpg;
        use nix::unistd::Pid;

        let supervisor = ProcessSupervisor::default();
        let start = Instant::now();
        let err = supervisor
            .execute("sh -c 'sleep 5'", false, 1.0)
            .unwrap_err();

        let pid = match err {
            BastionError::Exec {
                kind: ExecErrorKind::TimedOut { pid, .. },
            } => pid,
            other => panic!("expected timeout, got {other}"),
        };

        // Terminated well before the sleep would have finished.
        assert!(start.elapsed() < Duration::from_secs(5));

        // The whole process group is gone: signal 0 probes existence.
        // Signal delivery is asynchronous, so allow a short settle window.
        let pgid = Pid::from_raw(pid as i32);
        let mut gone = false;
        for _ in 0..50 {
            if killpg(pgid, None).is_err() {
                gone = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(gone, "process group still exists after watchdog");
    }
}
