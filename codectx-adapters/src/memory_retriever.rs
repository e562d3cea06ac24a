//! `MemoryRetriever` scoring (spec §4.5.2).
//!
//! Scores candidate memories for a caller-supplied scope and query, the way
//! `llmspell-memory`'s consolidation context assembler scores entities by
//! keyword relevance (`consolidation/context_assembly.rs`) before sorting
//! and truncating to a budget — generalised here to the confidence/recency/
//! relevance/scope-boost formula the spec names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single candidate a higher-level caller wants ranked. The core does not
/// define what a "memory" is beyond these four scoring inputs; the content
/// payload is opaque to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCandidate {
    pub id: String,
    /// Declared scope this memory applies to, e.g. `"project:foo"`,
    /// `"project:*"`, or `"*"`.
    pub scope: String,
    /// Confidence in `[0, 1]` assigned at write time.
    pub confidence: f64,
    /// Last time this memory was used/accessed.
    pub last_used: DateTime<Utc>,
    /// Semantic relevance of this memory to the current query, in `[0, 1]`,
    /// computed upstream (e.g. embedding cosine similarity or keyword
    /// overlap) — out of scope for this crate to compute itself.
    pub semantic_relevance: f64,
}

/// A scored candidate, ready to sort and truncate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMemory {
    pub id: String,
    pub score: f64,
}

/// Weights and decay tuning for [`MemoryRetriever::score`].
#[derive(Debug, Clone, Copy)]
pub struct MemoryRetrieverConfig {
    pub weight_confidence: f64,
    pub weight_recency: f64,
    pub weight_relevance: f64,
    /// Exponential recency decay half-life-ish constant, in days.
    pub recency_decay_days: f64,
}

impl Default for MemoryRetrieverConfig {
    fn default() -> Self {
        Self {
            weight_confidence: 0.3,
            weight_recency: 0.2,
            weight_relevance: 0.5,
            recency_decay_days: 30.0,
        }
    }
}

/// Scores and ranks [`MemoryCandidate`]s against a caller-supplied scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryRetriever {
    config: MemoryRetrieverConfig,
}

impl MemoryRetriever {
    #[must_use]
    pub fn new(config: MemoryRetrieverConfig) -> Self {
        Self { config }
    }

    /// `scopeBoost ∈ {1.0, 1.5}` depending on whether `candidate_scope`
    /// matches `caller_scope` by exact match, glob suffix (`prefix*`), or
    /// universal (`*`) (spec §4.5.2).
    #[must_use]
    pub fn scope_boost(candidate_scope: &str, caller_scope: &str) -> f64 {
        if candidate_scope == "*" || caller_scope == "*" {
            return 1.5;
        }
        if candidate_scope == caller_scope {
            return 1.5;
        }
        if let Some(prefix) = candidate_scope.strip_suffix('*') {
            if caller_scope.starts_with(prefix) {
                return 1.5;
            }
        }
        if let Some(prefix) = caller_scope.strip_suffix('*') {
            if candidate_scope.starts_with(prefix) {
                return 1.5;
            }
        }
        1.0
    }

    /// `(weightConfidence·confidence + weightRecency·recencyDecay +
    /// weightRelevance·semanticRelevance) × scopeBoost`.
    #[must_use]
    pub fn score(&self, candidate: &MemoryCandidate, caller_scope: &str, now: DateTime<Utc>) -> f64 {
        let days_since_use = (now - candidate.last_used).num_milliseconds() as f64
            / (1000.0 * 60.0 * 60.0 * 24.0);
        let days_since_use = days_since_use.max(0.0);
        let recency_decay = (-days_since_use / self.config.recency_decay_days).exp();
        let boost = Self::scope_boost(&candidate.scope, caller_scope);
        (self.config.weight_confidence * candidate.confidence
            + self.config.weight_recency * recency_decay
            + self.config.weight_relevance * candidate.semantic_relevance)
            * boost
    }

    /// Scores every candidate, sorts descending by score, and truncates to
    /// `limit`.
    #[must_use]
    pub fn retrieve(
        &self,
        candidates: &[MemoryCandidate],
        caller_scope: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Vec<ScoredMemory> {
        let mut scored: Vec<ScoredMemory> = candidates
            .iter()
            .map(|c| ScoredMemory {
                id: c.id.clone(),
                score: self.score(c, caller_scope, now),
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}
