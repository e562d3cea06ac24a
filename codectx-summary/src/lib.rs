//! Hierarchical Summary Cache & Retriever subsystem: a multi-level
//! (project/package/file/symbol) summary cache, per-language entity-id
//! hierarchy, integrity checking, query-driven retrieval, and an
//! LLM-backed summarizer with validation (spec §4.3).

pub mod cache;
pub mod error;
pub mod hierarchy;
pub mod integrity;
pub mod prelude;
pub mod retriever;
pub mod summarizer;
pub mod types;
pub mod validator;

pub use cache::{SummaryCache, SummaryCacheConfig};
pub use error::{Result, SummaryError};
pub use hierarchy::{GoHierarchy, HierarchyRegistry, LanguageHierarchy, PythonHierarchy};
pub use integrity::{IntegrityChecker, IntegrityReport, RepairReport};
pub use retriever::{Classifier, HeuristicClassifier, HierarchicalRetriever};
pub use summarizer::{CostGuard, SummarizeRequest, Summarizer};
pub use validator::{SummaryValidator, ValidatorConfig};
