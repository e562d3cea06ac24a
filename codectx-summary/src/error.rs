//! Error types for the hierarchical summary subsystem.

use thiserror::Error;

/// Result type alias used throughout `codectx-summary`.
pub type Result<T> = std::result::Result<T, SummaryError>;

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error(transparent)]
    Core(#[from] codectx_core::CoreError),

    #[error("no summary found for id {0}")]
    NotFound(String),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("summary failed validation: {0}")]
    ValidationFailed(String),

    #[error("classifier produced no usable intent for query")]
    ClassificationFailed,

    #[error("language hierarchy has no strategy registered for {0:?}")]
    NoHierarchyStrategy(codectx_core::SummaryLevel),

    #[error("summarization exceeded the configured token budget for level {0:?}")]
    TokenBudgetExceeded(codectx_core::SummaryLevel),

    #[error("resilience layer rejected the call: {0}")]
    Resilience(#[from] codectx_resilience::ResilienceError),
}
