//! Convenience re-exports for downstream crates.

pub use crate::assembler::Assembler;
pub use crate::config::{AssemblerConfig, BudgetAllocation};
pub use crate::error::{AssemblerError, Result};
pub use crate::entry_points::{find_entry_points, tokenize_query};
pub use crate::scoring::{query_similarity, score_symbol};
