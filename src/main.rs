//! APRS Bastion - authorization and execution daemon for TOTP-secured
//! remote commands over APRS.

use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aprs_bastion::audit::AuditLogger;
use aprs_bastion::auth::ReplayCache;
use aprs_bastion::config::Settings;
use aprs_bastion::exec::ProcessSupervisor;
use aprs_bastion::handler::MessageHandler;
use aprs_bastion::store::StoreHandle;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

fn main() -> ExitCode {
    // Parse command line arguments (simple std::env approach)
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    let config_path = get_arg_value(&args, "--config", "-c")
        .unwrap_or_else(|| "/etc/aprs-bastion/daemon.toml".to_string());

    // An offline test call runs one message through the full pipeline
    // without any APRS-IS connectivity.
    let testcall = match (
        get_arg_value(&args, "--callsign", "-s"),
        get_arg_value(&args, "--message", "-m"),
    ) {
        (Some(callsign), Some(message)) => Some((callsign, message)),
        (None, None) => None,
        _ => {
            eprintln!("--callsign and --message must be given together");
            return ExitCode::FAILURE;
        }
    };

    // Load configuration
    let settings = match Settings::load(&config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging based on configuration
    init_logging(&settings);

    info!("Starting {} v{}", NAME, VERSION);
    info!("Configuration loaded from: {}", config_path);
    info!("Credential store: {}", settings.store.path.display());
    info!("Log level: {}", settings.logging.level);

    // Run the async main
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(async_main(settings, testcall)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Daemon failed");
            ExitCode::FAILURE
        }
    }
}

/// Async main function.
async fn async_main(
    settings: Settings,
    testcall: Option<(String, String)>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Load the credential store; a missing or broken store is fatal at
    // startup (it is only recoverable at hot-reload time).
    let store = Arc::new(StoreHandle::open(&settings.store.path)?);

    // Replay cache for consumed (callsign, code) pairs
    let replay = Arc::new(ReplayCache::new(
        Duration::from_secs(settings.replay.max_age_seconds),
        settings.replay.max_entries,
    ));

    let supervisor =
        ProcessSupervisor::new(Duration::from_secs(settings.exec.grace_period_seconds));

    let audit = if settings.audit.enabled {
        Some(Arc::new(AuditLogger::new(&settings.audit.log_path)?))
    } else {
        None
    };

    let handler = Arc::new(MessageHandler::new(
        Arc::clone(&store),
        Arc::clone(&replay),
        supervisor,
        audit,
    ));

    if let Some((callsign, message)) = testcall {
        return run_testcall(handler, callsign, message).await;
    }

    // Daemon mode: keep the store fresh and wait for the transport
    // collaborator (library consumers) or a shutdown signal.
    store.start_watch_task(Duration::from_secs(settings.store.watch_interval_seconds));
    replay.start_cleanup_task(Duration::from_secs(settings.replay.cleanup_interval_seconds));

    info!("Bastion core ready; waiting for shutdown signal");
    loop {
        tokio::select! {
            _ = shutdown_signal() => {
                info!("Shutdown signal received");
                break;
            }
            _ = reload_signal() => {
                info!("Reload signal received, re-reading credential store...");
                store.reload_if_modified();
            }
        }
    }

    info!("Daemon stopped");
    Ok(())
}

/// Run one (callsign, message) pair through the full pipeline, exactly
/// like a live message from APRS-IS, and print the outbound status.
async fn run_testcall(
    handler: Arc<MessageHandler>,
    callsign: String,
    message: String,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        callsign = %callsign,
        message = %message,
        "Simulating inbound message"
    );

    let outcome = {
        let handler = Arc::clone(&handler);
        tokio::task::spawn_blocking(move || {
            let outcome = handler.handle_message(&callsign, &message);
            // The transport would send the response here, before any
            // deferred work runs.
            println!("{}", outcome.status);
            if let Some(deferred) = outcome.deferred {
                handler.post_process(deferred);
            }
            outcome.status
        })
        .await?
    };

    info!(status = %outcome, "Test call complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Wait for a reload signal (SIGHUP).
#[cfg(unix)]
async fn reload_signal() {
    match signal::unix::signal(signal::unix::SignalKind::hangup()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            error!(error = %e, "Failed to install SIGHUP handler");
            std::future::pending::<()>().await;
        }
    }
}

/// No-op reload signal for non-Unix platforms.
#[cfg(not(unix))]
async fn reload_signal() {
    std::future::pending::<()>().await;
}

/// Print help message.
fn print_help() {
    println!(
        r#"{} {}
Authorization and execution core for a TOTP-secured APRS command bastion.

USAGE:
    {} [OPTIONS]

OPTIONS:
    -c, --config <PATH>      Path to configuration file
                             [default: /etc/aprs-bastion/daemon.toml]
    -s, --callsign <CALL>    Offline test call: sender callsign
    -m, --message <TEXT>     Offline test call: message body
                             (both must be given together; runs one
                             message through the full pipeline and
                             prints the outbound status)
    -h, --help               Print help information
    -V, --version            Print version information
"#,
        NAME, VERSION, NAME
    );
}

/// Get the value following a flag (or `--flag=value`) from the arguments.
fn get_arg_value(args: &[String], long: &str, short: &str) -> Option<String> {
    for (i, arg) in args.iter().enumerate() {
        if (arg == long || arg == short) && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        if let Some(value) = arg.strip_prefix(&format!("{}=", long)) {
            return Some(value.to_string());
        }
    }
    None
}

/// Initialize logging based on settings.
fn init_logging(settings: &Settings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Default to pretty format
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}
