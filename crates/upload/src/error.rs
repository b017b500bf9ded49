//! Error taxonomy and retry classification.

use std::time::Duration;

use crate::net::NetworkError;
use crate::types::BackoffConfig;

/// Errors surfaced by the upload pipeline.
///
/// Only `Encryption`, `InvalidForm`, `RetriesExhausted`, `Cancelled`, and
/// `Io` ever cross the crate boundary; transient and restart-class errors
/// are absorbed by the coordinator until their budgets run out.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Encrypting or staging the source file failed. Never retried.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Transport-level failure; resumed with backoff by default.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The storage endpoint reports the session or location is gone or
    /// expired; the whole attempt is rebuilt.
    #[error("upload session invalidated: {0}")]
    SessionInvalidated(String),

    /// The control-plane form could not be decoded. A protocol bug, not a
    /// transient condition; never retried.
    #[error("invalid upload form: {0}")]
    InvalidForm(String),

    /// A storage endpoint answered with a status no code path expects.
    #[error("unexpected status code {0}")]
    UnexpectedStatus(u16),

    /// A retry budget was exhausted without success.
    #[error("no more retries after {0} attempts")]
    RetriesExhausted(u32),

    /// Cooperative cancellation. Cleanup still runs; no backoff is taken.
    #[error("upload cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How long to wait before acting on a [`FailureMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delay {
    Immediate,
    After(Duration),
}

/// Per-failure retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Terminal: surface the error to the caller.
    NoMoreRetries,
    /// Retry against the same session and location, resuming from the
    /// server's acknowledged offset.
    Resume(Delay),
    /// Rebuild form, endpoint, and location from scratch. Does not consume
    /// a resume-retry slot.
    Restart(Delay),
}

/// Classifies a sub-attempt failure.
///
/// `next_attempt` is the 1-based number of the retry this decision would
/// lead to; the backoff delay grows with it. Cancellation never reaches
/// this function; the coordinator short-circuits it first.
pub fn classify_failure(
    error: &UploadError,
    next_attempt: u32,
    backoff: &BackoffConfig,
) -> FailureMode {
    let delay = Delay::After(backoff.delay_for_attempt(next_attempt));
    match error {
        UploadError::Network(_) => FailureMode::Resume(delay),
        UploadError::SessionInvalidated(_) => FailureMode::Restart(delay),
        // Server-side trouble is worth resuming through; any other
        // unexpected status means our view of the session is wrong.
        UploadError::UnexpectedStatus(status) if *status >= 500 => FailureMode::Resume(delay),
        UploadError::UnexpectedStatus(_) => FailureMode::Restart(delay),
        _ => FailureMode::NoMoreRetries,
    }
}
