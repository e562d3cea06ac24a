//! Validates and repairs the invariants a healthy summary tree must hold
//! (spec §4.3.3).

use std::time::{Duration, Instant};

use chrono::Utc;
use codectx_core::{CoreError, SummaryLevel};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::SummaryCache;
use crate::error::Result;
use crate::hierarchy::LanguageHierarchy;
use crate::types::HashProvider;

/// A missing-child entry: `parentId` claims a child id absent from the
/// cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingChild {
    pub parent_id: String,
    pub child_id: String,
}

/// A level-mismatch entry: the id's lexically-derived level disagrees
/// with the stored `level` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelMismatch {
    pub id: String,
    pub expected: SummaryLevel,
    pub actual: SummaryLevel,
}

/// A stale-hash entry surfaced by [`IntegrityChecker::validate_with_hashes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleEntry {
    pub id: String,
    pub stored_hash: String,
    pub current_hash: String,
}

/// Findings from a validation pass.
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub valid: bool,
    pub orphaned_children: Vec<String>,
    pub missing_children: Vec<MissingChild>,
    pub level_mismatches: Vec<LevelMismatch>,
    pub stale_entries: Vec<StaleEntry>,
    pub total_checked: usize,
    pub duration: Duration,
}

/// Outcome of a repair pass.
#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    pub orphans_deleted: usize,
    pub stale_invalidated: usize,
    pub level_mismatches_corrected: usize,
    /// Regenerating a deleted child's summary requires the Summarizer;
    /// this layer never does it, so the count is always zero here.
    pub children_regenerated: usize,
}

/// Walks a [`SummaryCache`] checking cross-entry invariants against a
/// [`LanguageHierarchy`], and can repair what it finds.
pub struct IntegrityChecker<'a> {
    cache: &'a SummaryCache,
    hierarchy: &'a dyn LanguageHierarchy,
}

impl<'a> IntegrityChecker<'a> {
    #[must_use]
    pub fn new(cache: &'a SummaryCache, hierarchy: &'a dyn LanguageHierarchy) -> Self {
        Self { cache, hierarchy }
    }

    fn all_summaries(&self) -> Vec<codectx_core::Summary> {
        [
            SummaryLevel::Project,
            SummaryLevel::Package,
            SummaryLevel::File,
            SummaryLevel::Symbol,
        ]
        .into_iter()
        .flat_map(|level| self.cache.get_by_level(level))
        .collect()
    }

    /// Validates orphaned children, missing children, and level mismatches.
    pub async fn validate(&self, cancel: &CancellationToken) -> Result<IntegrityReport> {
        self.validate_inner(cancel, None).await
    }

    /// As [`Self::validate`], additionally querying `hash_provider` for
    /// each id's current source hash to detect stale entries.
    pub async fn validate_with_hashes(
        &self,
        cancel: &CancellationToken,
        hash_provider: HashProvider<'_>,
    ) -> Result<IntegrityReport> {
        self.validate_inner(cancel, Some(hash_provider)).await
    }

    async fn validate_inner(
        &self,
        cancel: &CancellationToken,
        hash_provider: Option<HashProvider<'_>>,
    ) -> Result<IntegrityReport> {
        let start = Instant::now();
        let summaries = self.all_summaries();
        let ids: std::collections::HashSet<&str> =
            summaries.iter().map(|s| s.id.as_str()).collect();

        let mut report = IntegrityReport::default();

        for summary in &summaries {
            if cancel.is_cancelled() {
                report.duration = start.elapsed();
                warn!(
                    total_checked = report.total_checked,
                    "integrity validation pass cancelled mid-pass"
                );
                return Err(CoreError::Cancelled.into());
            }
            report.total_checked += 1;

            if summary.level > SummaryLevel::Project
                && !summary.parent_id.is_empty()
                && !ids.contains(summary.parent_id.as_str())
            {
                report.orphaned_children.push(summary.id.clone());
            }

            for child_id in &summary.children {
                if !ids.contains(child_id.as_str()) {
                    report.missing_children.push(MissingChild {
                        parent_id: summary.id.clone(),
                        child_id: child_id.clone(),
                    });
                }
            }

            let expected = self.hierarchy.entity_level(&summary.id);
            if expected != summary.level {
                report.level_mismatches.push(LevelMismatch {
                    id: summary.id.clone(),
                    expected,
                    actual: summary.level,
                });
            }

            if let Some(provider) = hash_provider {
                if let Some(current_hash) = provider(&summary.id) {
                    if current_hash != summary.hash {
                        report.stale_entries.push(StaleEntry {
                            id: summary.id.clone(),
                            stored_hash: summary.hash.clone(),
                            current_hash,
                        });
                    }
                }
            }
        }

        report.valid = report.orphaned_children.is_empty()
            && report.missing_children.is_empty()
            && report.level_mismatches.is_empty()
            && report.stale_entries.is_empty();
        report.duration = start.elapsed();
        info!(
            total_checked = report.total_checked,
            valid = report.valid,
            "integrity validation pass complete"
        );
        Ok(report)
    }

    /// Mutates the cache according to `report`: deletes orphans,
    /// invalidates stale entries, and corrects level mismatches in place.
    /// Cancellable mid-pass; returns whatever was completed so far.
    pub fn repair(&self, report: &IntegrityReport, cancel: &CancellationToken) -> RepairReport {
        let mut outcome = RepairReport::default();

        for id in &report.orphaned_children {
            if cancel.is_cancelled() {
                return outcome;
            }
            self.cache.invalidate(id);
            outcome.orphans_deleted += 1;
            warn!(id, "integrity repair deleted orphaned child");
        }

        for stale in &report.stale_entries {
            if cancel.is_cancelled() {
                return outcome;
            }
            self.cache.invalidate(&stale.id);
            outcome.stale_invalidated += 1;
        }

        for mismatch in &report.level_mismatches {
            if cancel.is_cancelled() {
                return outcome;
            }
            if let Some(mut summary) = self.cache.get_stale(&mismatch.id).map(|(s, _)| s) {
                summary.level = mismatch.expected;
                summary.updated_at = Utc::now();
                self.cache.set(summary);
                outcome.level_mismatches_corrected += 1;
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SummaryCacheConfig;
    use crate::hierarchy::GoHierarchy;
    use codectx_core::Summary;

    fn summary(id: &str, level: SummaryLevel, parent_id: &str, children: Vec<&str>) -> Summary {
        let now = Utc::now();
        Summary {
            id: id.to_string(),
            level,
            parent_id: parent_id.to_string(),
            children: children.into_iter().map(String::from).collect(),
            content: "body".to_string(),
            keywords: vec![],
            hash: "h1".to_string(),
            language: "go".to_string(),
            tokens_used: 5,
            partial: false,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    #[tokio::test]
    async fn validate_detects_orphan_and_missing_child() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        cache.set(summary(
            "pkg/auth/validator.go",
            SummaryLevel::File,
            "pkg/ghost",
            vec!["pkg/auth/validator.go#Missing"],
        ));
        let go = GoHierarchy;
        let checker = IntegrityChecker::new(&cache, &go);
        let report = checker.validate(&CancellationToken::new()).await.unwrap();
        assert!(!report.valid);
        assert_eq!(report.orphaned_children, vec!["pkg/auth/validator.go"]);
        assert_eq!(report.missing_children.len(), 1);
    }

    #[tokio::test]
    async fn validate_detects_level_mismatch() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        cache.set(summary(
            "pkg/auth/validator.go",
            SummaryLevel::Package,
            "",
            vec![],
        ));
        let go = GoHierarchy;
        let checker = IntegrityChecker::new(&cache, &go);
        let report = checker.validate(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.level_mismatches.len(), 1);
        assert_eq!(
            report.level_mismatches[0].expected,
            SummaryLevel::File
        );
    }

    #[tokio::test]
    async fn validate_with_hashes_detects_stale() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        cache.set(summary("pkg/auth", SummaryLevel::Package, "", vec![]));
        let go = GoHierarchy;
        let checker = IntegrityChecker::new(&cache, &go);
        let provider = |id: &str| -> Option<String> {
            if id == "pkg/auth" {
                Some("different-hash".to_string())
            } else {
                None
            }
        };
        let report = checker
            .validate_with_hashes(&CancellationToken::new(), &provider)
            .await
            .unwrap();
        assert_eq!(report.stale_entries.len(), 1);
    }

    #[tokio::test]
    async fn repair_deletes_orphans_and_invalidates_stale() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        cache.set(summary(
            "pkg/auth/validator.go",
            SummaryLevel::File,
            "pkg/ghost",
            vec![],
        ));
        let go = GoHierarchy;
        let checker = IntegrityChecker::new(&cache, &go);
        let cancel = CancellationToken::new();
        let report = checker.validate(&cancel).await.unwrap();
        let repaired = checker.repair(&report, &cancel);
        assert_eq!(repaired.orphans_deleted, 1);
        assert!(!cache.has("pkg/auth/validator.go"));
        assert_eq!(repaired.children_regenerated, 0);
    }

    #[tokio::test]
    async fn repair_corrects_level_mismatch_in_place() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        cache.set(summary(
            "pkg/auth/validator.go",
            SummaryLevel::Package,
            "",
            vec![],
        ));
        let go = GoHierarchy;
        let checker = IntegrityChecker::new(&cache, &go);
        let cancel = CancellationToken::new();
        let report = checker.validate(&cancel).await.unwrap();
        let repaired = checker.repair(&report, &cancel);
        assert_eq!(repaired.level_mismatches_corrected, 1);
        let (fixed, _) = cache.get_stale("pkg/auth/validator.go").unwrap();
        assert_eq!(fixed.level, SummaryLevel::File);
    }

    #[tokio::test]
    async fn mid_pass_cancellation_returns_cancelled_error() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        for i in 0..5 {
            cache.set(summary(&format!("pkg{i}"), SummaryLevel::Package, "", vec![]));
        }
        let go = GoHierarchy;
        let checker = IntegrityChecker::new(&cache, &go);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = checker.validate(&cancel).await;
        assert!(matches!(
            result,
            Err(crate::error::SummaryError::Core(codectx_core::CoreError::Cancelled))
        ));
    }
}
