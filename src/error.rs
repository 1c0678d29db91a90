// src/error.rs

/// Client-visible failures. Everything else is logged and isolated in the
/// task where it happened.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert {0} not found or expired")]
    NotFound(uuid::Uuid),
}

/// Result of a cancellation request. A repeat cancellation is a success
/// with a note, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyCancelled,
}
