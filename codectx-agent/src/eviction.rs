//! Candidate-selection policies for freeing token budget from a
//! session's code entries (spec §4.4 Eviction policies).

use std::collections::HashSet;

use crate::types::{CodeEntry, EvictionPolicy};

fn age(entry: &CodeEntry, current_step: u64) -> u64 {
    current_step.saturating_sub(entry.last_accessed)
}

fn hybrid_score(entry: &CodeEntry, current_step: u64, relevance_weight: f64, max_age_steps: u64) -> f64 {
    let age_ratio = if max_age_steps == 0 {
        1.0
    } else {
        (age(entry, current_step) as f64 / max_age_steps as f64).min(1.0)
    };
    relevance_weight * (1.0 - entry.relevance) + (1.0 - relevance_weight) * age_ratio
}

/// Returns the ids to evict (in eviction order) so that their summed
/// `tokens` meets or exceeds `target_free`, honouring `protected_ids`
/// (never selected for eviction regardless of policy).
#[must_use]
pub fn select_for_eviction(
    entries: &[CodeEntry],
    target_free: usize,
    policy: EvictionPolicy,
    current_step: u64,
    relevance_weight: f64,
    max_age_steps: u64,
    protected_ids: &HashSet<String>,
) -> Vec<String> {
    let mut candidates: Vec<&CodeEntry> = entries
        .iter()
        .filter(|e| !e.protected && !protected_ids.contains(&e.id))
        .collect();

    match policy {
        EvictionPolicy::Lru => {
            candidates.sort_by(|a, b| {
                a.last_accessed
                    .cmp(&b.last_accessed)
                    .then_with(|| a.added_at.cmp(&b.added_at))
            });
        }
        EvictionPolicy::Relevance => {
            candidates.sort_by(|a, b| {
                a.relevance
                    .partial_cmp(&b.relevance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        EvictionPolicy::Hybrid => {
            candidates.sort_by(|a, b| {
                let score_a = hybrid_score(a, current_step, relevance_weight, max_age_steps);
                let score_b = hybrid_score(b, current_step, relevance_weight, max_age_steps);
                score_b
                    .partial_cmp(&score_a)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
    }

    let mut freed = 0usize;
    let mut selected = Vec::new();
    for entry in candidates {
        if freed >= target_free {
            break;
        }
        selected.push(entry.id.clone());
        freed += entry.tokens;
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, relevance: f64, added_at: u64, last_accessed: u64, tokens: usize) -> CodeEntry {
        CodeEntry {
            id: id.to_string(),
            relevance,
            added_at,
            last_accessed,
            tokens,
            protected: false,
        }
    }

    #[test]
    fn lru_evicts_least_recently_accessed_first() {
        let entries = vec![
            entry("a", 0.9, 0, 5, 100),
            entry("b", 0.1, 0, 1, 100),
            entry("c", 0.5, 0, 3, 100),
        ];
        let evicted = select_for_eviction(
            &entries,
            150,
            EvictionPolicy::Lru,
            10,
            0.6,
            20,
            &HashSet::new(),
        );
        assert_eq!(evicted, vec!["b", "c"]);
    }

    #[test]
    fn relevance_evicts_lowest_relevance_first() {
        let entries = vec![
            entry("a", 0.9, 0, 5, 100),
            entry("b", 0.1, 0, 1, 100),
            entry("c", 0.5, 0, 3, 100),
        ];
        let evicted = select_for_eviction(
            &entries,
            150,
            EvictionPolicy::Relevance,
            10,
            0.6,
            20,
            &HashSet::new(),
        );
        assert_eq!(evicted, vec!["b", "c"]);
    }

    #[test]
    fn protected_ids_are_never_selected() {
        let entries = vec![entry("a", 0.0, 0, 0, 100), entry("b", 0.0, 0, 0, 100)];
        let mut protected = HashSet::new();
        protected.insert("a".to_string());
        let evicted = select_for_eviction(&entries, 1000, EvictionPolicy::Relevance, 10, 0.6, 20, &protected);
        assert_eq!(evicted, vec!["b"]);
    }

    #[test]
    fn struct_level_protected_flag_is_also_honoured() {
        let mut entries = vec![entry("a", 0.0, 0, 0, 100)];
        entries[0].protected = true;
        let evicted = select_for_eviction(&entries, 1000, EvictionPolicy::Relevance, 10, 0.6, 20, &HashSet::new());
        assert!(evicted.is_empty());
    }

    #[test]
    fn hybrid_prefers_stale_low_relevance_entries() {
        let entries = vec![
            entry("fresh-relevant", 0.9, 0, 10, 100),
            entry("stale-irrelevant", 0.1, 0, 0, 100),
        ];
        let evicted = select_for_eviction(
            &entries,
            100,
            EvictionPolicy::Hybrid,
            10,
            0.6,
            20,
            &HashSet::new(),
        );
        assert_eq!(evicted, vec!["stale-irrelevant"]);
    }

    #[test]
    fn stops_once_target_freed() {
        let entries = vec![
            entry("a", 0.1, 0, 0, 50),
            entry("b", 0.2, 0, 0, 50),
            entry("c", 0.3, 0, 0, 50),
        ];
        let evicted = select_for_eviction(&entries, 60, EvictionPolicy::Relevance, 10, 0.6, 20, &HashSet::new());
        assert_eq!(evicted.len(), 2);
    }
}
