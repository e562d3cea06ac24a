//! Error types for the context assembler.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssemblerError>;

#[derive(Debug, Error)]
pub enum AssemblerError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("query exceeds maximum length of {max}")]
    QueryTooLong { max: usize },

    #[error("budget must be positive, got {0}")]
    InvalidBudget(i64),

    #[error("graph is not initialized or not frozen")]
    GraphNotInitialized,

    #[error("budget allocation percentages must sum to 100, got {0}")]
    InvalidBudgetAllocation(u32),
}
