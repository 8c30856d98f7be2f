use tokio::select;
use tokio_util::sync::CancellationToken;

/// Detects signals sent to the process. `keytally stop` terminates the daemon with SIGTERM, so
/// on unix that signal matters as much as ctrl-c does during development.
///
/// On Windows detached processes can't detect signals sent to them, so this should be enhanced in
/// the future to support another way of sending signals.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        use tracing::error;

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                select! {
                    _ = tokio::signal::ctrl_c() => {
                        cancelation.cancel();
                    },
                    _ = terminate.recv() => {
                        cancelation.cancel();
                    },
                };
                return;
            }
            Err(e) => {
                error!("Can't listen for SIGTERM, only ctrl-c will work {e:?}");
            }
        }
    }

    select! {
        _ = tokio::signal::ctrl_c() => {
            cancelation.cancel();
        },
    };
}
