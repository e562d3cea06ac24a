//! Convenience re-exports for downstream crates.

pub use crate::error::{CoreError, Result};
pub use crate::library_doc::{LibraryDoc, LibraryDocProvider};
pub use crate::llm::{CompletionOptions, CompletionResponse, FinishReason, LLMClient, LLMErrorClass};
pub use crate::state::{CircuitState, ConnectionState, DegradationMode};
pub use crate::symbol::{EdgeKind, EdgeRef, Graph, Symbol, SymbolIndex, SymbolKind};
pub use crate::types::{ContextResult, ScoredSymbol, Summary, SummaryLevel};
