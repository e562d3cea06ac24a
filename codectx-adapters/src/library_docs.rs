//! Concrete [`LibraryDocProvider`] implementations (spec §4.5.1).
//!
//! The trait itself lives in `codectx-core` so the Assembler can depend on
//! the capability without depending on this crate. What lives here are the
//! implementations a composition root actually wires in: a fixed in-memory
//! corpus (useful standalone and in tests) and a null provider that always
//! reports empty results, matching how `llmspell-rag`'s `provider.rs`
//! separates the trait boundary from its concrete backends.

use async_trait::async_trait;
use codectx_core::{LibraryDoc, LibraryDocProvider};
use tracing::debug;

/// A provider that always returns zero results. Used when library-doc
/// lookup is disabled, or as the "provider" half of graceful degradation
/// when a real backend's circuit is open (the Assembler already treats any
/// `Err` from `search` as an empty list; this type models "no backend
/// configured at all" without requiring an `Option<Arc<dyn ...>>` at every
/// call site).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLibraryDocProvider;

#[async_trait]
impl LibraryDocProvider for NullLibraryDocProvider {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<LibraryDoc>, String> {
        Ok(Vec::new())
    }
}

/// A fixed in-memory corpus, ranked by naive substring relevance. Intended
/// for tests and for embedding a small curated doc set directly in-process
/// rather than calling out to a real vector store (the real vector-store
/// client is explicitly out of core scope — spec §1).
#[derive(Debug, Clone, Default)]
pub struct InMemoryLibraryDocProvider {
    docs: Vec<LibraryDoc>,
}

impl InMemoryLibraryDocProvider {
    #[must_use]
    pub fn new(docs: Vec<LibraryDoc>) -> Self {
        Self { docs }
    }

    pub fn push(&mut self, doc: LibraryDoc) {
        self.docs.push(doc);
    }

    fn score(doc: &LibraryDoc, query_lower: &str) -> u32 {
        let mut score = 0u32;
        if doc.symbol_path.to_lowercase().contains(query_lower) {
            score += 3;
        }
        if doc.library.to_lowercase().contains(query_lower) {
            score += 2;
        }
        if doc.doc_content.to_lowercase().contains(query_lower) {
            score += 1;
        }
        score
    }
}

#[async_trait]
impl LibraryDocProvider for InMemoryLibraryDocProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<LibraryDoc>, String> {
        let query_lower = query.to_lowercase();
        let mut scored: Vec<(u32, &LibraryDoc)> = self
            .docs
            .iter()
            .map(|d| (Self::score(d, &query_lower), d))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        let results: Vec<LibraryDoc> = scored.into_iter().take(limit).map(|(_, d)| d.clone()).collect();
        debug!(query, hits = results.len(), "in-memory library doc search");
        Ok(results)
    }
}
