//! OS signal handling.
//!
//! # Responsibilities
//! - Listen for SIGINT, SIGTERM and SIGQUIT
//! - Raise the stop flag on the first one
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that fails to register is logged and skipped; Ctrl-C always works

use crate::lifecycle::shutdown::Shutdown;

#[cfg(unix)]
async fn recv_or_pending(signal: Option<&mut tokio::signal::unix::Signal>) {
    match signal {
        Some(signal) => {
            signal.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(unix)]
fn register(kind: tokio::signal::unix::SignalKind, name: &str) -> Option<tokio::signal::unix::Signal> {
    match tokio::signal::unix::signal(kind) {
        Ok(signal) => Some(signal),
        Err(e) => {
            tracing::warn!(signal = name, error = %e, "Failed to install signal handler");
            None
        }
    }
}

/// Wait for a termination signal, then trigger `shutdown`.
#[cfg(unix)]
pub async fn listen(shutdown: Shutdown) {
    use tokio::signal::unix::SignalKind;

    let mut term = register(SignalKind::terminate(), "SIGTERM");
    let mut quit = register(SignalKind::quit(), "SIGQUIT");

    let name = tokio::select! {
        Ok(()) = tokio::signal::ctrl_c() => "SIGINT",
        _ = recv_or_pending(term.as_mut()) => "SIGTERM",
        _ = recv_or_pending(quit.as_mut()) => "SIGQUIT",
    };

    tracing::info!(signal = name, "Stop requested");
    shutdown.trigger();
}

/// Wait for Ctrl-C, then trigger `shutdown`.
#[cfg(not(unix))]
pub async fn listen(shutdown: Shutdown) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!(signal = "ctrl-c", "Stop requested");
        shutdown.trigger();
    }
}
