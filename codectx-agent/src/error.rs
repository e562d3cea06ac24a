//! Error types for the agent-loop context manager.

use thiserror::Error;

/// Result type alias used throughout `codectx-agent`.
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Covers the pinned-instructions mutators, which reuse
    /// `codectx-core`'s `QueryAlreadySet`, `InvalidStepIndex`,
    /// `PlanStepsLimitReached`, `FindingsLimitReached`, and
    /// `ConstraintsLimitReached` variants.
    #[error(transparent)]
    Core(#[from] codectx_core::CoreError),

    #[error(transparent)]
    Context(#[from] codectx_context::AssemblerError),
}
