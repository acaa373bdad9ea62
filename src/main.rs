//! valkey-slot-audit - print the key count of every slot range in a Valkey cluster.
//!
//! This is the main entry point that:
//! - Parses configuration from flags and environment
//! - Initializes structured logging on stderr
//! - Runs the audit, cancelling it cleanly on SIGINT or SIGTERM
//! - Prints the report on stdout

use std::process::ExitCode;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use valkey_slot_audit::{AuditConfig, ReportFormat, run_audit};

/// Exit status when the report was printed but some masters were not fully scanned.
const EXIT_PARTIAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let config = AuditConfig::parse();

    if let Err(e) = init_tracing(config.log_json) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        host = %config.host,
        port = config.port,
        tls = config.tls,
        single_entrypoint = config.uses_single_entrypoint(),
        "Starting slot audit"
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            warn!("Received shutdown signal, stopping after current batch...");
            cancel.cancel();
        });
    }

    let report = match run_audit(&config, &cancel).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Failed to read cluster topology");
            return ExitCode::FAILURE;
        }
    };

    match config.format {
        ReportFormat::Text => print!("{}", report.to_human()),
        ReportFormat::Json => match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!(error = %e, "Failed to serialize report");
                return ExitCode::FAILURE;
            }
        },
    }

    if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL)
    }
}

fn init_tracing(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::from_default_env().add_directive("valkey_slot_audit=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// If a handler cannot be installed, that signal is simply never delivered.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
