//! In-memory hierarchical summary cache with secondary indexes, LRU
//! eviction by `updatedAt`, optimistic concurrency control, and atomic
//! batch application (spec §4.3.1).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use codectx_core::{CoreError, Summary, SummaryLevel};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::error::{Result, SummaryError};
use crate::types::{BatchUpdate, CacheStats};

/// Configuration for [`SummaryCache`].
#[derive(Debug, Clone)]
pub struct SummaryCacheConfig {
    pub max_entries: usize,
    pub fresh_ttl: Duration,
    pub stale_read_enabled: bool,
}

impl Default for SummaryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            fresh_ttl: Duration::from_secs(15 * 60),
            stale_read_enabled: true,
        }
    }
}

struct State {
    entries: HashMap<String, Summary>,
    by_level: HashMap<SummaryLevel, HashSet<String>>,
    by_parent: HashMap<String, HashSet<String>>,
}

impl State {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            by_level: HashMap::new(),
            by_parent: HashMap::new(),
        }
    }

    fn index_insert(&mut self, summary: &Summary) {
        self.by_level
            .entry(summary.level)
            .or_default()
            .insert(summary.id.clone());
        if !summary.parent_id.is_empty() {
            self.by_parent
                .entry(summary.parent_id.clone())
                .or_default()
                .insert(summary.id.clone());
        }
    }

    fn index_remove(&mut self, summary: &Summary) {
        if let Some(set) = self.by_level.get_mut(&summary.level) {
            set.remove(&summary.id);
        }
        if let Some(set) = self.by_parent.get_mut(&summary.parent_id) {
            set.remove(&summary.id);
        }
    }

    fn upsert(&mut self, summary: Summary) {
        if let Some(old) = self.entries.get(&summary.id) {
            let old = old.clone();
            self.index_remove(&old);
        }
        self.index_insert(&summary);
        self.entries.insert(summary.id.clone(), summary);
    }

    fn remove(&mut self, id: &str) -> Option<Summary> {
        let removed = self.entries.remove(id)?;
        self.index_remove(&removed);
        Some(removed)
    }

    fn evict_if_over_capacity(&mut self, max_entries: usize) {
        if self.entries.len() <= max_entries {
            return;
        }
        let mut by_age: Vec<(String, chrono::DateTime<Utc>)> = self
            .entries
            .values()
            .map(|s| (s.id.clone(), s.updated_at))
            .collect();
        by_age.sort_by_key(|(_, updated_at)| *updated_at);
        let to_evict = self.entries.len() - max_entries;
        for (id, _) in by_age.into_iter().take(to_evict) {
            self.remove(&id);
            trace!(id, "summary cache evicted oldest entry over capacity");
        }
    }
}

/// Thread-safe cache of hierarchical summaries, keyed by entity id, with
/// O(1) lookup by level and by parent.
pub struct SummaryCache {
    config: SummaryCacheConfig,
    state: RwLock<State>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SummaryCache {
    #[must_use]
    pub fn new(config: SummaryCacheConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the entry iff present and no older than `freshTTL`. A read
    /// lock only — concurrent `get`s must not serialize on each other
    /// (spec §4.3.1, §5).
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Summary> {
        let state = self.state.read();
        match state.entries.get(id) {
            Some(summary) if is_fresh(summary, self.config.fresh_ttl) => {
                let summary = summary.clone();
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(summary)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Returns the entry if present regardless of freshness, plus whether
    /// it is stale. Returns `None` unconditionally if `staleReadEnabled`
    /// is false.
    #[must_use]
    pub fn get_stale(&self, id: &str) -> Option<(Summary, bool)> {
        if !self.config.stale_read_enabled {
            return None;
        }
        let state = self.state.read();
        state
            .entries
            .get(id)
            .map(|s| (s.clone(), !is_fresh(s, self.config.fresh_ttl)))
    }

    /// Upserts `summary`, updating secondary indexes, then evicts down to
    /// capacity if necessary.
    pub fn set(&self, summary: Summary) {
        let mut state = self.state.write();
        state.upsert(summary);
        state.evict_if_over_capacity(self.config.max_entries);
    }

    /// Removes `id`'s entry, if present.
    pub fn invalidate(&self, id: &str) {
        self.state.write().remove(id);
    }

    /// Alias matching the spec's `Delete` naming.
    pub fn delete(&self, id: &str) {
        self.invalidate(id);
    }

    /// Invalidates `id` iff its stored hash differs from `current_hash`.
    /// Returns whether an invalidation occurred.
    pub fn invalidate_if_stale(&self, id: &str, current_hash: &str) -> bool {
        let mut state = self.state.write();
        let stale = state
            .entries
            .get(id)
            .is_some_and(|s| s.hash != current_hash);
        if stale {
            state.remove(id);
        }
        stale
    }

    #[must_use]
    pub fn has(&self, id: &str) -> bool {
        self.state.read().entries.contains_key(id)
    }

    pub fn clear(&self) {
        *self.state.write() = State::new();
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.state.read().entries.len()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        CacheStats {
            entries: state.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Snapshot of every entry at `level`.
    #[must_use]
    pub fn get_by_level(&self, level: SummaryLevel) -> Vec<Summary> {
        let state = self.state.read();
        state
            .by_level
            .get(&level)
            .into_iter()
            .flatten()
            .filter_map(|id| state.entries.get(id).cloned())
            .collect()
    }

    /// Snapshot of every entry whose `parentId` equals `parent_id`.
    #[must_use]
    pub fn get_children(&self, parent_id: &str) -> Vec<Summary> {
        let state = self.state.read();
        state
            .by_parent
            .get(parent_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.entries.get(id).cloned())
            .collect()
    }

    /// Optimistic-concurrency write: succeeds only if the stored version
    /// for `summary.id` equals `expected_version` (or no entry exists and
    /// `expected_version == 0`).
    pub fn set_if_unchanged(&self, summary: Summary, expected_version: u64) -> Result<()> {
        let mut state = self.state.write();
        let current = state.entries.get(&summary.id).map(|s| s.version);
        let matches = match current {
            Some(v) => v == expected_version,
            None => expected_version == 0,
        };
        if !matches {
            return Err(SummaryError::Core(CoreError::CacheVersionConflict {
                expected: expected_version,
                found: current.unwrap_or(0),
            }));
        }
        state.upsert(summary);
        state.evict_if_over_capacity(self.config.max_entries);
        Ok(())
    }

    /// Applies an entire batch atomically: no intermediate state (partial
    /// inserts or deletes) is ever visible to a concurrent reader, because
    /// the whole operation runs under a single write-lock acquisition.
    pub fn apply_batch(&self, batch: BatchUpdate) -> Result<()> {
        let expected = BatchUpdate::compute_checksum(&batch.summaries, &batch.delete_ids);
        if expected != batch.checksum {
            warn!("summary cache batch rejected: checksum mismatch");
            return Err(SummaryError::Core(CoreError::BatchValidationFailed));
        }
        let mut state = self.state.write();
        for id in &batch.delete_ids {
            state.remove(id);
        }
        for summary in batch.summaries {
            state.upsert(summary);
        }
        state.evict_if_over_capacity(self.config.max_entries);
        debug!(version = batch.version, "summary cache batch applied");
        Ok(())
    }
}

fn is_fresh(summary: &Summary, ttl: Duration) -> bool {
    let age = Utc::now().signed_duration_since(summary.updated_at);
    match age.to_std() {
        Ok(age) => age <= ttl,
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn summary(id: &str, level: SummaryLevel, parent_id: &str) -> Summary {
        let now = Utc::now();
        Summary {
            id: id.to_string(),
            level,
            parent_id: parent_id.to_string(),
            children: vec![],
            content: format!("summary for {id}"),
            keywords: vec![],
            hash: "h1".to_string(),
            language: "go".to_string(),
            tokens_used: 10,
            partial: false,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    #[test]
    fn set_then_get_round_trips() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        cache.set(summary("pkg/auth", SummaryLevel::Package, ""));
        assert!(cache.get("pkg/auth").is_some());
        assert_eq!(cache.stats().hits, 1);
        assert!(cache.get("missing").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn stale_entry_is_not_returned_by_get_but_is_by_get_stale() {
        let cache = SummaryCache::new(SummaryCacheConfig {
            fresh_ttl: Duration::from_secs(0),
            ..SummaryCacheConfig::default()
        });
        let mut s = summary("pkg/auth", SummaryLevel::Package, "");
        s.updated_at = Utc::now() - ChronoDuration::seconds(10);
        cache.set(s);
        assert!(cache.get("pkg/auth").is_none());
        let (_, is_stale) = cache.get_stale("pkg/auth").unwrap();
        assert!(is_stale);
    }

    #[test]
    fn get_stale_disabled_returns_none() {
        let cache = SummaryCache::new(SummaryCacheConfig {
            stale_read_enabled: false,
            ..SummaryCacheConfig::default()
        });
        cache.set(summary("pkg/auth", SummaryLevel::Package, ""));
        assert!(cache.get_stale("pkg/auth").is_none());
    }

    #[test]
    fn by_level_and_by_parent_indexes_are_consistent() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        cache.set(summary("pkg/auth", SummaryLevel::Package, ""));
        cache.set(summary(
            "pkg/auth/validator.go",
            SummaryLevel::File,
            "pkg/auth",
        ));
        assert_eq!(cache.get_by_level(SummaryLevel::Package).len(), 1);
        assert_eq!(cache.get_children("pkg/auth").len(), 1);

        cache.invalidate("pkg/auth/validator.go");
        assert!(cache.get_children("pkg/auth").is_empty());
    }

    #[test]
    fn invalidate_if_stale_only_removes_on_hash_mismatch() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        cache.set(summary("pkg/auth", SummaryLevel::Package, ""));
        assert!(!cache.invalidate_if_stale("pkg/auth", "h1"));
        assert!(cache.has("pkg/auth"));
        assert!(cache.invalidate_if_stale("pkg/auth", "h2"));
        assert!(!cache.has("pkg/auth"));
    }

    #[test]
    fn eviction_removes_oldest_updated_first() {
        let cache = SummaryCache::new(SummaryCacheConfig {
            max_entries: 2,
            ..SummaryCacheConfig::default()
        });
        let mut old = summary("a", SummaryLevel::File, "");
        old.updated_at = Utc::now() - ChronoDuration::seconds(100);
        cache.set(old);
        cache.set(summary("b", SummaryLevel::File, ""));
        cache.set(summary("c", SummaryLevel::File, ""));
        assert_eq!(cache.count(), 2);
        assert!(!cache.has("a"));
    }

    #[test]
    fn set_if_unchanged_rejects_version_mismatch() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        let mut s = summary("pkg/auth", SummaryLevel::Package, "");
        s.version = 1;
        cache.set_if_unchanged(s.clone(), 0).unwrap();

        let mut s2 = s.clone();
        s2.version = 2;
        let err = cache.set_if_unchanged(s2, 5).unwrap_err();
        assert!(matches!(
            err,
            SummaryError::Core(CoreError::CacheVersionConflict { .. })
        ));
    }

    #[test]
    fn set_if_unchanged_accepts_matching_version() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        let mut s = summary("pkg/auth", SummaryLevel::Package, "");
        s.version = 1;
        cache.set_if_unchanged(s.clone(), 0).unwrap();

        let mut s2 = s;
        s2.version = 2;
        cache.set_if_unchanged(s2, 1).unwrap();
        assert_eq!(cache.get("pkg/auth").unwrap().version, 2);
    }

    #[test]
    fn apply_batch_rejects_bad_checksum() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        let batch = BatchUpdate {
            version: 1,
            summaries: vec![summary("a", SummaryLevel::File, "")],
            delete_ids: vec![],
            checksum: "bogus".to_string(),
        };
        let err = cache.apply_batch(batch).unwrap_err();
        assert!(matches!(
            err,
            SummaryError::Core(CoreError::BatchValidationFailed)
        ));
    }

    #[test]
    fn apply_batch_inserts_and_deletes_atomically() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        cache.set(summary("stale", SummaryLevel::File, ""));
        let inserts = vec![summary("fresh", SummaryLevel::File, "")];
        let batch = BatchUpdate::new(2, inserts, vec!["stale".to_string()]);
        cache.apply_batch(batch).unwrap();
        assert!(!cache.has("stale"));
        assert!(cache.has("fresh"));
    }

    #[test]
    fn hit_rate_is_zero_when_no_traffic() {
        let cache = SummaryCache::new(SummaryCacheConfig::default());
        assert_eq!(cache.stats().hit_rate(), 0.0);
    }
}
