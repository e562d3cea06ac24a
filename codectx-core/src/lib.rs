//! Shared data model and error types for the code-understanding context core.
//!
//! This crate holds only what every other `codectx-*` crate needs: the
//! `Symbol`/`Graph`/`SymbolIndex` supplied-capability surface, the scoring and
//! result types that flow out of the assembler, the hierarchical `Summary`
//! record, and the cross-cutting error/state enums. It contains no business
//! logic of its own.

pub mod error;
pub mod library_doc;
pub mod llm;
pub mod prelude;
pub mod state;
pub mod symbol;
pub mod types;

pub use error::{CoreError, Result};
pub use library_doc::{LibraryDoc, LibraryDocProvider};
pub use llm::{CompletionOptions, CompletionResponse, FinishReason, LLMClient, LLMErrorClass};
pub use state::{CircuitState, ConnectionState, DegradationMode};
pub use symbol::{EdgeKind, EdgeRef, Graph, Symbol, SymbolIndex, SymbolKind};
pub use types::{ContextResult, ScoredSymbol, Summary, SummaryLevel};
