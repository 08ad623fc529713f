//! Signal-driven shutdown.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::error::ExitCode;
use crate::observability::StopReason;

/// Cancellation token plus the reason it was cancelled.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    reason: Arc<OnceLock<StopReason>>,
}

impl Shutdown {
    /// Handle that has not been triggered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the run. Only the first reason is kept.
    pub fn trigger(&self, reason: StopReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    /// Token cancelled by [`trigger`](Self::trigger).
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Why the run was cancelled, if it was.
    #[must_use]
    pub fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }

    /// Process exit code for the recorded reason.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.reason() {
            Some(StopReason::Interrupted) => ExitCode::INTERRUPTED,
            Some(StopReason::Terminated) => ExitCode::TERMINATED,
            Some(StopReason::Completed | StopReason::Hidden) | None => ExitCode::SUCCESS,
        }
    }
}

/// Waits for SIGINT or SIGTERM and triggers `shutdown`. A second signal
/// exits immediately.
///
/// # Errors
///
/// Returns an I/O error if the SIGTERM handler can't be registered.
#[cfg(unix)]
pub async fn listen(shutdown: Shutdown) -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => shutdown.trigger(StopReason::Interrupted),
        _ = sigterm.recv() => shutdown.trigger(StopReason::Terminated),
    }
    tracing::info!(reason = ?shutdown.reason(), "shutting down");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => std::process::exit(ExitCode::INTERRUPTED),
        _ = sigterm.recv() => std::process::exit(ExitCode::TERMINATED),
    }
}

/// Waits for Ctrl+C and triggers `shutdown`. A second Ctrl+C exits
/// immediately.
///
/// # Errors
///
/// Returns an I/O error if the Ctrl+C handler can't be registered.
#[cfg(not(unix))]
pub async fn listen(shutdown: Shutdown) -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    shutdown.trigger(StopReason::Interrupted);
    tokio::signal::ctrl_c().await?;
    std::process::exit(ExitCode::INTERRUPTED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reason_wins() {
        let shutdown = Shutdown::new();
        assert_eq!(shutdown.exit_code(), ExitCode::SUCCESS);
        assert!(!shutdown.token().is_cancelled());

        shutdown.trigger(StopReason::Terminated);
        shutdown.trigger(StopReason::Interrupted);

        assert!(shutdown.token().is_cancelled());
        assert_eq!(shutdown.reason(), Some(StopReason::Terminated));
        assert_eq!(shutdown.exit_code(), ExitCode::TERMINATED);
    }
}
