//! Translates termination signals into cooperative cancellation.

use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Returns a token cancelled on the first SIGTERM or SIGINT.
///
/// Must be called from inside a tokio runtime.
///
/// # Errors
///
/// Fails if the signal handlers cannot be registered.
pub fn shutdown_token() -> std::io::Result<CancellationToken> {
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = int.recv() => "SIGINT",
            () = trigger.cancelled() => return,
        };
        info!(signal = name, "shutdown requested");
        trigger.cancel();
    });
    Ok(token)
}
