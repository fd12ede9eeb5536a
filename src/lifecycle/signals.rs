//! OS signal handling.
//!
//! SIGTERM/SIGINT trigger graceful shutdown; SIGHUP requests a refresh.

use crate::lifecycle::Shutdown;
use crate::refresh::{RefreshHandle, RefreshTrigger};

/// Spawn the task translating OS signals into shutdown and refresh requests.
pub fn spawn_signal_listener(handle: RefreshHandle, shutdown: Shutdown) {
    tokio::spawn(async move {
        if let Err(e) = listen(handle, &shutdown).await {
            tracing::error!(error = %e, "Signal handler failed; shutting down");
        }
        shutdown.trigger();
    });
}

#[cfg(unix)]
async fn listen(handle: RefreshHandle, shutdown: &Shutdown) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut stop = shutdown.subscribe();

    loop {
        tokio::select! {
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received, requesting refresh");
                handle.trigger(RefreshTrigger::Signal);
            }
            _ = terminate.recv() => {
                tracing::info!("SIGTERM received, shutting down");
                return Ok(());
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("SIGINT received, shutting down");
                return Ok(());
            }
            _ = stop.recv() => return Ok(()),
        }
    }
}

#[cfg(not(unix))]
async fn listen(_handle: RefreshHandle, shutdown: &Shutdown) -> std::io::Result<()> {
    let mut stop = shutdown.subscribe();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Ctrl-C received, shutting down");
        }
        _ = stop.recv() => {}
    }
    Ok(())
}
