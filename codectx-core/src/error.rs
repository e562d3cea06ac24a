//! Error types shared across the context core.

use thiserror::Error;

/// Result type alias used throughout `codectx-core`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Cross-cutting error kinds named in the specification's error-handling
/// design. Downstream crates either reuse this enum directly or wrap it in
/// a crate-local error with a `#[from]` arm.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The supplied query was empty after trimming.
    #[error("query is empty")]
    EmptyQuery,

    /// The supplied query exceeded the configured maximum length.
    #[error("query exceeds maximum length of {max}")]
    QueryTooLong {
        /// The configured ceiling that was exceeded.
        max: usize,
    },

    /// `budget <= 0`.
    #[error("budget must be positive, got {0}")]
    InvalidBudget(i64),

    /// The graph passed to an operation is nil or not yet frozen.
    #[error("graph is not initialized or not frozen")]
    GraphNotInitialized,

    /// A plan-step index referenced by the caller does not exist.
    #[error("invalid plan step index {0}")]
    InvalidStepIndex(usize),

    /// The original query was already set and a second write was attempted.
    #[error("original query has already been set")]
    QueryAlreadySet,

    /// A bounded list (plan steps) has reached its configured limit.
    #[error("plan steps limit reached ({0})")]
    PlanStepsLimitReached(usize),

    /// A bounded list (findings) has reached its configured limit.
    #[error("findings limit reached ({0})")]
    FindingsLimitReached(usize),

    /// A bounded list (constraints) has reached its configured limit.
    #[error("constraints limit reached ({0})")]
    ConstraintsLimitReached(usize),

    /// Optimistic-concurrency write lost a race against the stored version.
    #[error("cache version conflict: expected {expected}, found {found}")]
    CacheVersionConflict {
        /// The version the caller believed was current.
        expected: u64,
        /// The version actually stored.
        found: u64,
    },

    /// An `ApplyBatch` call's checksum did not match its contents.
    #[error("batch validation failed: checksum mismatch")]
    BatchValidationFailed,

    /// The circuit is open and the call was rejected without execution.
    #[error("circuit is open")]
    CircuitOpen,

    /// The calling context was cancelled before the operation completed.
    #[error("operation was cancelled")]
    Cancelled,

    /// Releasing a semaphore permit that was never acquired.
    #[error("semaphore released without a matching acquire")]
    UnbalancedRelease,
}
