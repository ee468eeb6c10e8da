// Signal handling module
//
// SIGTERM (container stop) and SIGINT (Ctrl+C) both request shutdown.

use std::sync::Arc;
use tokio::sync::Notify;

use crate::logger;

/// Spawn a task that fires `shutdown` once on SIGTERM or SIGINT.
///
/// `notify_one` stores a permit, so a signal arriving while the accept loop
/// is busy is not lost.
#[cfg(unix)]
pub fn start_signal_handler(shutdown: Arc<Notify>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => logger::log_info("SIGTERM received"),
            _ = sigint.recv() => logger::log_info("SIGINT received"),
        }
        shutdown.notify_one();
    });
    Ok(())
}

/// Windows fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(shutdown: Arc<Notify>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            logger::log_info("Ctrl+C received");
            shutdown.notify_one();
        }
    });
    Ok(())
}
