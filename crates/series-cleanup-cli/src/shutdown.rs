use series_cleanup_core::CancellationToken;
use std::io;
use std::thread;
use tokio::signal::ctrl_c;
use tracing::{debug, error, info, warn};

/// Cancel `token` when SIGINT or SIGTERM arrives. Listens on a background
/// thread with its own single-threaded runtime.
pub fn cancel_on_signal(token: CancellationToken) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name("signal-listener".to_string())
        .spawn(move || {
            runtime.block_on(wait_for_signal());
            warn!("Stopping: in-flight deletions will finish, no new ones will start");
            token.cancel();
        })?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            error!(error = ?e, "Could not listen for SIGTERM");
            wait_for_ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = wait_for_ctrl_c() => {},
        _ = sigterm.recv() => {
            debug!("Received SIGTERM.");
        }
    }
    info!("Shutdown signal received.");
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    wait_for_ctrl_c().await;
    info!("Shutdown signal received.");
}

async fn wait_for_ctrl_c() {
    match ctrl_c().await {
        Ok(()) => debug!("Received SIGINT."),
        Err(e) => {
            error!(error = ?e, "Encountered error while listening for SIGINT.");
            // Never cancel because the listener failed.
            std::future::pending::<()>().await;
        }
    }
}
