//! Drills down the summary hierarchy to assemble a relevant, budget-bound
//! set of summaries for a query (spec §4.3.4).

use codectx_core::{Summary, SummaryLevel};
use tracing::debug;

use crate::cache::SummaryCache;
use crate::types::{Classification, QueryIntent, RetrievalResult, RetrieverConfig};

/// Classifies a free-text query into a retrieval [`QueryIntent`] plus the
/// search terms to score against.
pub trait Classifier: Send + Sync {
    fn classify(&self, query: &str) -> Classification;
}

/// Default heuristic classifier: looks for a small set of lexical cues,
/// otherwise falls back to `conceptual` per the spec's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl Classifier for HeuristicClassifier {
    fn classify(&self, query: &str) -> Classification {
        let lowered = query.to_lowercase();
        let terms: Vec<String> = lowered
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != '/' && c != '.'))
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();

        let intent = if lowered.contains("overview")
            || lowered.contains("what does this project")
            || lowered.contains("summarize the project")
        {
            QueryIntent::Overview
        } else if terms.iter().any(|t| t.contains('/') || t.contains('.')) {
            QueryIntent::Locational
        } else if lowered.starts_with("find ")
            || lowered.starts_with("where is")
            || lowered.starts_with("show me")
        {
            QueryIntent::Specific
        } else {
            QueryIntent::Conceptual
        };

        Classification { intent, terms }
    }
}

fn estimate_tokens(summary: &Summary, chars_per_token: f64) -> usize {
    let base =
        summary.content.len() as f64 / chars_per_token + summary.id.len() as f64 / chars_per_token;
    let keyword_cost = summary.keywords.len() as f64 * 2.0;
    (base + keyword_cost).ceil() as usize
}

fn score_against_query(summary: &Summary, query: &str, terms: &[String]) -> f64 {
    let content_lower = summary.content.to_lowercase();
    let id_lower = summary.id.to_lowercase();
    let query_lower = query.to_lowercase();

    let mut score = 0.0;
    for word in terms {
        if id_lower.contains(word.as_str()) {
            score += 0.5;
        }
        if content_lower.contains(word.as_str()) {
            score += 0.3;
        }
        if summary
            .keywords
            .iter()
            .any(|k| k.to_lowercase() == *word || k.to_lowercase().contains(word.as_str()))
        {
            score += 0.4;
        }
    }
    if content_lower.contains(&query_lower) {
        score += 0.5;
    }
    score
}

/// Routes a classified query through the hierarchy, drilling down levels
/// while tracking a token budget.
pub struct HierarchicalRetriever<'a> {
    cache: &'a SummaryCache,
    classifier: &'a dyn Classifier,
    config: RetrieverConfig,
}

impl<'a> HierarchicalRetriever<'a> {
    #[must_use]
    pub fn new(cache: &'a SummaryCache, classifier: &'a dyn Classifier, config: RetrieverConfig) -> Self {
        Self {
            cache,
            classifier,
            config,
        }
    }

    #[must_use]
    pub fn retrieve(&self, query: &str, token_budget: usize) -> RetrievalResult {
        let classification = self.classifier.classify(query);
        debug!(intent = ?classification.intent, terms = ?classification.terms, "retriever classified query");
        match classification.intent {
            QueryIntent::Overview => self.retrieve_overview(query, token_budget),
            QueryIntent::Specific => {
                self.retrieve_specific(query, &classification.terms, token_budget)
            }
            QueryIntent::Locational => {
                self.retrieve_locational(query, &classification.terms, token_budget)
            }
            QueryIntent::Conceptual => {
                self.retrieve_conceptual(query, &classification.terms, token_budget)
            }
        }
    }

    fn retrieve_overview(&self, query: &str, token_budget: usize) -> RetrievalResult {
        let mut result = RetrievalResult::default();
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();

        for summary in self.cache.get_by_level(SummaryLevel::Project) {
            if !self.try_push(&mut result, summary, token_budget) {
                return result;
            }
        }

        let mut packages = self.cache.get_by_level(SummaryLevel::Package);
        packages.sort_by(|a, b| {
            score_against_query(b, query, &terms)
                .partial_cmp(&score_against_query(a, query, &terms))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for summary in packages.into_iter().take(self.config.max_packages) {
            if !self.try_push(&mut result, summary, token_budget) {
                return result;
            }
        }
        result
    }

    fn retrieve_conceptual(
        &self,
        query: &str,
        terms: &[String],
        token_budget: usize,
    ) -> RetrievalResult {
        let mut result = RetrievalResult::default();
        let mut packages = self.cache.get_by_level(SummaryLevel::Package);
        packages.sort_by(|a, b| {
            score_against_query(b, query, terms)
                .partial_cmp(&score_against_query(a, query, terms))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for package in packages {
            if score_against_query(&package, query, terms) < self.config.min_relevance_score {
                continue;
            }
            let package_id = package.id.clone();
            if !self.try_push(&mut result, package, token_budget) {
                return result;
            }

            let mut files = self.cache.get_children(&package_id);
            files.sort_by(|a, b| {
                score_against_query(b, query, terms)
                    .partial_cmp(&score_against_query(a, query, terms))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for file in files.into_iter().take(self.config.max_files_per_pkg) {
                let file_id = file.id.clone();
                if !self.try_push(&mut result, file, token_budget) {
                    return result;
                }

                let mut syms = self.cache.get_children(&file_id);
                syms.sort_by(|a, b| {
                    score_against_query(b, query, terms)
                        .partial_cmp(&score_against_query(a, query, terms))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                for sym in syms.into_iter().take(self.config.max_symbols_per_file) {
                    if !self.try_push(&mut result, sym, token_budget) {
                        return result;
                    }
                }
            }

            if result.tokens_used >= token_budget {
                return result;
            }
        }
        result
    }

    fn retrieve_specific(
        &self,
        query: &str,
        terms: &[String],
        token_budget: usize,
    ) -> RetrievalResult {
        let mut result = RetrievalResult::default();
        for level in [
            SummaryLevel::Symbol,
            SummaryLevel::File,
            SummaryLevel::Package,
            SummaryLevel::Project,
        ] {
            for summary in self.cache.get_by_level(level) {
                if !matches_any_term(&summary, query, terms) {
                    continue;
                }
                if !self.try_push(&mut result, summary, token_budget) {
                    return result;
                }
            }
        }
        result
    }

    fn retrieve_locational(
        &self,
        query: &str,
        terms: &[String],
        token_budget: usize,
    ) -> RetrievalResult {
        let path_term = terms.iter().find(|t| t.contains('/') || t.contains('.'));
        let Some(path_term) = path_term else {
            return self.retrieve_conceptual(query, terms, token_budget);
        };

        let mut result = RetrievalResult::default();
        let all = [
            SummaryLevel::Project,
            SummaryLevel::Package,
            SummaryLevel::File,
            SummaryLevel::Symbol,
        ]
        .into_iter()
        .flat_map(|level| self.cache.get_by_level(level));

        for summary in all {
            if summary.id.to_lowercase().contains(path_term.as_str()) {
                let id = summary.id.clone();
                if !self.try_push(&mut result, summary, token_budget) {
                    return result;
                }
                for child in self.cache.get_children(&id) {
                    if !self.try_push(&mut result, child, token_budget) {
                        return result;
                    }
                }
            }
        }
        result
    }

    /// Pushes `summary` into `result` if it still fits the budget,
    /// returning `false` (and marking `partial_match`) once it no longer
    /// does, so callers can short-circuit their drill-down loop.
    fn try_push(&self, result: &mut RetrievalResult, summary: Summary, token_budget: usize) -> bool {
        let cost = estimate_tokens(&summary, self.config.chars_per_token);
        if result.tokens_used + cost > token_budget && !result.summaries.is_empty() {
            result.partial_match = true;
            return false;
        }
        result.tokens_used += cost;
        result.summaries.push(summary);
        true
    }
}

fn matches_any_term(summary: &Summary, query: &str, terms: &[String]) -> bool {
    let id_lower = summary.id.to_lowercase();
    let content_lower = summary.content.to_lowercase();
    let _ = query;
    terms.iter().any(|term| {
        id_lower.contains(term.as_str())
            || content_lower.contains(term.as_str())
            || summary
                .keywords
                .iter()
                .any(|k| k.to_lowercase().contains(term.as_str()))
    })
}
