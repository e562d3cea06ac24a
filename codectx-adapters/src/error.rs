//! Error types for the external interface adapters (spec §4.5).

use thiserror::Error;

/// Result type alias used throughout `codectx-adapters`.
pub type Result<T> = std::result::Result<T, AdapterError>;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Core(#[from] codectx_core::CoreError),

    #[error("resilience layer rejected the call: {0}")]
    Resilience(#[from] codectx_resilience::ResilienceError),

    /// The projected cost/token usage of a batch exceeds a configured
    /// ceiling (spec §4.3.5, §4.5.3 `CheckLimits`).
    #[error("projected usage exceeds configured limit: {reason}")]
    LimitExceeded { reason: String },
}
