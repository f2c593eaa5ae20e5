//! Process shutdown signals

/// Resolves on Ctrl-C, and on Unix also on SIGTERM or SIGQUIT.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let unix = async {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::quit()),
        ) {
            (Ok(mut term), Ok(mut quit)) => {
                tokio::select! {
                    _ = term.recv() => tracing::debug!("received SIGTERM"),
                    _ = quit.recv() => tracing::debug!("received SIGQUIT"),
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "failed to install unix signal handlers");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let unix = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::debug!("received Ctrl-C"),
        _ = unix => {}
    }
}
