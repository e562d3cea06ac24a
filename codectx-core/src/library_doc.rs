//! `LibraryDocProvider`, a supplied capability consumed by the Context
//! Assembler (spec §4.5.1). Concrete implementations (in-memory, null, or a
//! real vector-store-backed provider) live in `codectx-adapters`; the core
//! only needs the trait shape so the assembler can depend on it without
//! depending on `codectx-adapters` itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single library documentation excerpt returned by a provider search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDoc {
    pub doc_id: String,
    pub library: String,
    pub version: String,
    pub symbol_path: String,
    pub symbol_kind: String,
    pub signature: String,
    pub doc_content: String,
    pub example: Option<String>,
}

/// Searches an external library-documentation index. Any error must be
/// tolerated by the Assembler as an empty result list (spec §4.2 step 7,
/// §7 "graceful degradation").
#[async_trait]
pub trait LibraryDocProvider: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<LibraryDoc>, String>;
}
