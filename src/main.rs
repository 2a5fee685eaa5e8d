//! http-pipe
//!
//! Pipes standard input to an HTTP collector.
//!
//! # Architecture Overview
//!
//! ```text
//!     stdin                ┌──────────────────────────────────────────────┐
//!     ───────────────────▶ │ pipe::Session                                 │
//!                          │   inbuf ⇄ outbuf ─▶ (zlib) ─▶ header + body   │
//!                          │        │                         │            │
//!                          │   pacing: admission + rate   net: connection │ ──▶ collector
//!                          │        └──────── one select! per tick ───────┘ │ ◀── response
//!                          └──────────────────────────────────────────────┘
//!                                   ▲                     ▲
//!                         lifecycle (startup,        resilience (retry
//!                         signals, stop flag)        budget, backoff)
//! ```

use std::process::ExitCode;

use clap::Parser;

use http_pipe::cli::Cli;
use http_pipe::config::ObservabilityConfig;
use http_pipe::lifecycle::{signals, startup, Shutdown};
use http_pipe::{observability, PipeError, ServeReport};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.show_version {
        println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    // A blocking stdin read cannot be cancelled; do not wait for it.
    runtime.shutdown_background();

    match result {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ServeReport, PipeError> {
    let config = match startup::resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not configured yet; fall back to the flag alone.
            observability::init(&ObservabilityConfig {
                verbose: cli.verbose,
                ..ObservabilityConfig::default()
            });
            return Err(e);
        }
    };
    observability::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "http-pipe starting");
    observability::log_config(&config);

    let mut session = startup::build_session(&config).await?;

    let shutdown = Shutdown::new();
    tokio::spawn(signals::listen(shutdown.clone()));

    let report = session.serve(shutdown.subscribe()).await?;
    tracing::info!(
        transactions = report.transactions,
        body_bytes = report.body_bytes,
        wire_bytes = report.wire_bytes,
        connections_opened = report.connections_opened,
        connect_failures = report.connect_failures,
        rollbacks = report.rollbacks,
        abandoned = report.abandoned,
        malformed = report.malformed,
        rejected = report.rejected,
        "Pipe finished"
    );
    Ok(report)
}
