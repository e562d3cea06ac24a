//! Convenience re-exports for downstream crates.

pub use crate::cost::{CostEstimate, CostEstimator, CostLimits, PriceTable, UsageTotals};
pub use crate::error::{AdapterError, Result};
pub use crate::library_docs::{InMemoryLibraryDocProvider, NullLibraryDocProvider};
pub use crate::memory_retriever::{MemoryCandidate, MemoryRetriever, MemoryRetrieverConfig, ScoredMemory};
