//! External interface adapters (spec §4.5): concrete `LibraryDocProvider`
//! implementations, `MemoryRetriever` scoring, and the cost estimator that
//! bridges into `codectx-summary`'s `CostGuard` seam.
//!
//! Everything here is replaceable by a composition root with its own
//! backends (a real vector-store-backed doc provider, a persisted memory
//! store, provider-specific pricing) without touching the core crates —
//! those depend only on the trait shapes declared in `codectx-core` and
//! `codectx-summary`.

pub mod cost;
pub mod error;
pub mod library_docs;
pub mod memory_retriever;
pub mod prelude;

pub use cost::{CostEstimate, CostEstimator, CostLimits, PriceTable, UsageTotals};
pub use error::{AdapterError, Result};
pub use library_docs::{InMemoryLibraryDocProvider, NullLibraryDocProvider};
pub use memory_retriever::{MemoryCandidate, MemoryRetriever, MemoryRetrieverConfig, ScoredMemory};
