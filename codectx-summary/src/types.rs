//! Inputs and auxiliary types for the summary subsystem (spec §4.3).

use std::collections::HashMap;

use codectx_core::SummaryLevel;
use serde::{Deserialize, Serialize};

/// Structured input handed to the Summarizer when prompting for a
/// project-level summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub language: String,
    pub package_ids: Vec<String>,
    pub package_names: Vec<String>,
}

/// Structured input for a package-level summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub id: String,
    pub language: String,
    pub file_ids: Vec<String>,
    pub file_names: Vec<String>,
    pub symbol_count: usize,
}

/// Structured input for a file-level summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub language: String,
    pub symbol_ids: Vec<String>,
    pub symbol_names: Vec<String>,
    pub line_count: usize,
}

/// Per-[`SummaryLevel`] token limits used when prompting the LLM.
#[derive(Debug, Clone, Copy)]
pub struct LevelLimits {
    pub max_tokens: usize,
    pub max_keywords: usize,
}

#[must_use]
pub const fn level_limits(level: SummaryLevel) -> LevelLimits {
    match level {
        SummaryLevel::Project => LevelLimits {
            max_tokens: 4000,
            max_keywords: 500,
        },
        SummaryLevel::Package => LevelLimits {
            max_tokens: 2000,
            max_keywords: 300,
        },
        SummaryLevel::File => LevelLimits {
            max_tokens: 1000,
            max_keywords: 150,
        },
        SummaryLevel::Symbol => LevelLimits {
            max_tokens: 500,
            max_keywords: 100,
        },
    }
}

/// A self-contained batch of cache mutations applied atomically by
/// [`crate::cache::SummaryCache::apply_batch`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUpdate {
    pub version: u64,
    pub summaries: Vec<codectx_core::Summary>,
    pub delete_ids: Vec<String>,
    pub checksum: String,
}

impl BatchUpdate {
    /// Deterministic checksum of the batch contents, computed the same way
    /// a caller is expected to when constructing the batch: sort `(id,
    /// hash, version)` triples and deletion ids, then hash the
    /// concatenation with a fixed-seed hasher so the result is stable
    /// across processes.
    #[must_use]
    pub fn compute_checksum(summaries: &[codectx_core::Summary], delete_ids: &[String]) -> String {
        use std::hash::{Hash, Hasher};

        let mut keys: Vec<(String, String, u64)> = summaries
            .iter()
            .map(|s| (s.id.clone(), s.hash.clone(), s.version))
            .collect();
        keys.sort();
        let mut deletes = delete_ids.to_vec();
        deletes.sort();

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for (id, hash, version) in &keys {
            id.hash(&mut hasher);
            hash.hash(&mut hasher);
            version.hash(&mut hasher);
        }
        for id in &deletes {
            id.hash(&mut hasher);
        }
        format!("{:016x}", hasher.finish())
    }

    /// Builds a batch and stamps it with its own checksum.
    #[must_use]
    pub fn new(version: u64, summaries: Vec<codectx_core::Summary>, delete_ids: Vec<String>) -> Self {
        let checksum = Self::compute_checksum(&summaries, &delete_ids);
        Self {
            version,
            summaries,
            delete_ids,
            checksum,
        }
    }
}

/// `HashProvider` for [`crate::integrity::IntegrityChecker::validate_with_hashes`]:
/// maps an entity id to its current source-content hash, if known.
pub type HashProvider<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Snapshot counters returned by [`crate::cache::SummaryCache::stats`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// The classifier's judgement of what kind of retrieval the query wants
/// (spec §4.3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryIntent {
    Overview,
    Specific,
    Locational,
    Conceptual,
}

impl Default for QueryIntent {
    fn default() -> Self {
        Self::Conceptual
    }
}

/// Output of a [`crate::retriever::Classifier`].
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub intent: QueryIntent,
    pub terms: Vec<String>,
}

/// Tuning knobs for [`crate::retriever::HierarchicalRetriever`].
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub max_packages: usize,
    pub max_files_per_pkg: usize,
    pub max_symbols_per_file: usize,
    pub min_relevance_score: f64,
    pub chars_per_token: f64,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            max_packages: 10,
            max_files_per_pkg: 5,
            max_symbols_per_file: 10,
            min_relevance_score: 0.3,
            chars_per_token: 4.0,
        }
    }
}

/// Result of a retrieval pass.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub summaries: Vec<codectx_core::Summary>,
    pub tokens_used: usize,
    pub partial_match: bool,
}

/// A parsed `file_path -> source hash` map used by callers that build
/// [`HashProvider`] closures around an in-memory snapshot rather than a
/// live filesystem query.
pub type HashSnapshot = HashMap<String, String>;
