//! Convenience re-exports for downstream crates.

pub use crate::cache::{SummaryCache, SummaryCacheConfig};
pub use crate::error::{Result, SummaryError};
pub use crate::hierarchy::{GoHierarchy, HierarchyRegistry, LanguageHierarchy, PythonHierarchy};
pub use crate::integrity::{IntegrityChecker, IntegrityReport, RepairReport};
pub use crate::retriever::{Classifier, HeuristicClassifier, HierarchicalRetriever};
pub use crate::summarizer::{CostGuard, SummarizeRequest, Summarizer};
pub use crate::types::{
    CacheStats, Classification, PackageInfo, FileInfo, ProjectInfo, QueryIntent, RetrievalResult,
    RetrieverConfig,
};
pub use crate::validator::{SummaryValidator, ValidatorConfig};
