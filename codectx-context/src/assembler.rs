//! The Context Assembler's pipeline (spec §4.2): entry points → bounded
//! BFS → scoring → budget-aware packing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use codectx_core::{Graph, LibraryDocProvider, ScoredSymbol, Symbol, SymbolIndex, SymbolKind};
use codectx_core::ContextResult;
use codectx_resilience::DegradationHandler;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::AssemblerConfig;
use crate::entry_points::{find_entry_points, tokenize_query};
use crate::error::{AssemblerError, Result};
use crate::file_cache::FileLineCache;
use crate::scoring::score_symbol;

/// Graph traversal + scoring + budget-aware packing of source artefacts
/// into a prompt (spec §4.2).
pub struct Assembler {
    graph: Arc<dyn Graph>,
    index: Arc<dyn SymbolIndex>,
    library_docs: Option<Arc<dyn LibraryDocProvider>>,
    library_docs_handler: Option<Arc<dyn DegradationHandler>>,
    config: AssemblerConfig,
    file_cache: FileLineCache,
}

struct Budgets {
    code: f64,
    types: f64,
    lib_docs: f64,
}

impl Assembler {
    /// # Errors
    /// Propagates [`crate::config::BudgetAllocation::validate`].
    pub fn new(
        graph: Arc<dyn Graph>,
        index: Arc<dyn SymbolIndex>,
        library_docs: Option<Arc<dyn LibraryDocProvider>>,
        library_docs_handler: Option<Arc<dyn DegradationHandler>>,
        config: AssemblerConfig,
    ) -> Result<Self> {
        let config = config.validated()?;
        Ok(Self {
            graph,
            index,
            library_docs,
            library_docs_handler,
            config,
            file_cache: FileLineCache::new(),
        })
    }

    /// Run the full pipeline described in spec §4.2. `cancel` is the
    /// caller's outer cancellation; the assembler additionally derives a
    /// child token bounded by `config.timeout`. Cancellation at any point
    /// curtails work and returns a partial result rather than an error
    /// (spec §4.2 "Context cancellation").
    ///
    /// # Errors
    /// Returns a validation error (`EmptyQuery`, `QueryTooLong`,
    /// `InvalidBudget`, `GraphNotInitialized`) if the inputs don't satisfy
    /// spec §4.2's preconditions.
    pub async fn assemble(
        &self,
        cancel: CancellationToken,
        query: &str,
        budget: i64,
    ) -> Result<ContextResult> {
        let start = Instant::now();

        if !self.graph.is_frozen() {
            return Err(AssemblerError::GraphNotInitialized);
        }
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(AssemblerError::EmptyQuery);
        }
        if query.len() > self.config.max_query_length {
            return Err(AssemblerError::QueryTooLong {
                max: self.config.max_query_length,
            });
        }
        if budget <= 0 {
            return Err(AssemblerError::InvalidBudget(budget));
        }

        let child = cancel.child_token();
        let timeout_guard = child.clone();
        let timeout = self.config.timeout;
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(timeout) => timeout_guard.cancel(),
                () = timeout_guard.cancelled() => {}
            }
        });

        let entry_points = find_entry_points(self.index.as_ref(), trimmed).await;
        debug!(count = entry_points.len(), "entry points found");

        if entry_points.is_empty() {
            return Ok(ContextResult {
                context: String::new(),
                symbols_included: Vec::new(),
                library_docs_included: Vec::new(),
                tokens_used: 0,
                truncated: false,
                suggestions: vec![
                    "No symbols found matching the query. Try different terms.".to_string(),
                    "Consider rephrasing with specific function or type names.".to_string(),
                ],
                assembly_duration_ms: as_ms(start),
            });
        }

        let terms = tokenize_query(trimmed);
        let visited = self.walk(&child, &entry_points).await;
        trace!(count = visited.len(), "graph walk complete");

        let mut scored: Vec<ScoredSymbol> = visited
            .into_iter()
            .map(|(symbol, depth)| {
                let score = score_symbol(&symbol, depth, trimmed, &terms);
                ScoredSymbol {
                    symbol,
                    depth,
                    score,
                }
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let effective = budget as f64 * (1.0 - self.config.safety_buffer);
        let budgets = self.split_budget(effective);

        let (code_section, symbols_included, code_tokens, code_included_count) =
            self.pack_code(&scored, budgets.code, &child);
        let (types_section, types_tokens) = self.pack_types(&scored, budgets.types, &child);
        let (lib_docs_section, library_docs_included, lib_tokens) =
            self.pack_library_docs(trimmed, budgets.lib_docs, &child).await;

        let mut context = String::new();
        if !code_section.is_empty() {
            context.push_str(&code_section);
        }
        if !types_section.is_empty() {
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(&types_section);
        }
        if !lib_docs_section.is_empty() {
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str(&lib_docs_section);
        }

        let non_import_count = scored
            .iter()
            .filter(|s| !matches!(s.symbol.kind, SymbolKind::Import | SymbolKind::Package))
            .count();
        let truncated = non_import_count > code_included_count;

        let mut suggestions = Vec::new();
        if truncated {
            let included: HashSet<&str> =
                symbols_included.iter().map(|s| s.as_str()).collect();
            for s in &scored {
                if suggestions.len() >= 3 {
                    break;
                }
                let tag = format!("{}:{}:{}", s.symbol.file_path, s.symbol.start_line, s.symbol.name);
                if !included.contains(tag.as_str()) {
                    suggestions.push(s.symbol.file_path.clone());
                }
            }
        }

        Ok(ContextResult {
            context,
            symbols_included,
            library_docs_included,
            tokens_used: code_tokens + types_tokens + lib_tokens,
            truncated,
            suggestions,
            assembly_duration_ms: as_ms(start),
        })
    }

    fn split_budget(&self, effective: f64) -> Budgets {
        let alloc = self.config.budget_allocation;
        Budgets {
            code: effective * f64::from(alloc.code_pct) / 100.0,
            types: effective * f64::from(alloc.types_pct) / 100.0,
            lib_docs: effective * f64::from(alloc.lib_docs_pct) / 100.0,
        }
    }

    /// Bounded BFS over both edge directions from `entry_points`, up to
    /// `graph_depth` and `max_symbols` (spec §4.2 step 2). Each id's first
    /// visit wins (the shallowest depth), matching BFS order.
    async fn walk(
        &self,
        cancel: &CancellationToken,
        entry_points: &[Symbol],
    ) -> Vec<(Symbol, u32)> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut ordered: Vec<(Symbol, u32)> = Vec::new();
        let mut queue: VecDeque<(String, u32)> = VecDeque::new();
        let known: HashMap<String, Symbol> =
            entry_points.iter().map(|s| (s.id.clone(), s.clone())).collect();

        for s in entry_points {
            queue.push_back((s.id.clone(), 0));
        }

        while let Some((id, depth)) = queue.pop_front() {
            if cancel.is_cancelled() {
                break;
            }
            if visited.contains(&id) || ordered.len() >= self.config.max_symbols {
                continue;
            }
            match self.graph.get_node(&id).await {
                Some((symbol, incoming, outgoing)) => {
                    visited.insert(id.clone());
                    ordered.push((symbol, depth));
                    if depth < self.config.graph_depth {
                        for edge in incoming.iter().chain(outgoing.iter()) {
                            if !visited.contains(&edge.id) {
                                queue.push_back((edge.id.clone(), depth + 1));
                            }
                        }
                    }
                }
                None => {
                    if let Some(symbol) = known.get(&id) {
                        visited.insert(id.clone());
                        ordered.push((symbol.clone(), depth));
                    }
                }
            }
        }
        ordered
    }

    /// Spec §4.2 step 5: iterate scored symbols, skip import/package,
    /// render source (or fall back to doc comment + signature, or kind +
    /// name), wrap as a fenced block, and stop at the first item that would
    /// exceed `code_budget`.
    fn pack_code(
        &self,
        scored: &[ScoredSymbol],
        code_budget: f64,
        cancel: &CancellationToken,
    ) -> (String, Vec<String>, usize, usize) {
        let mut out = String::new();
        let mut tags = Vec::new();
        let mut tokens = 0usize;

        for s in scored {
            if cancel.is_cancelled() {
                break;
            }
            if matches!(s.symbol.kind, SymbolKind::Import | SymbolKind::Package) {
                continue;
            }
            let rendered = self
                .file_cache
                .read_span(&s.symbol.file_path, s.symbol.start_line, s.symbol.end_line)
                .unwrap_or_else(|| fallback_render(&s.symbol));

            let block = format!(
                "```{lang}\n// {path}:{line} {name}\n{body}\n```",
                lang = s.symbol.language,
                path = s.symbol.file_path,
                line = s.symbol.start_line,
                name = s.symbol.name,
                body = rendered
            );
            let block_tokens = estimate_tokens(&block, self.config.chars_per_token);
            if tokens + block_tokens > code_budget as usize {
                break;
            }
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&block);
            tokens += block_tokens;
            tags.push(format!(
                "{}:{}:{}",
                s.symbol.file_path, s.symbol.start_line, s.symbol.name
            ));
        }
        (out, tags, tokens, tags.len())
    }

    /// Spec §4.2 step 6: a second pass restricted to type-like kinds,
    /// de-duplicated, bounded by `types_budget`.
    fn pack_types(
        &self,
        scored: &[ScoredSymbol],
        types_budget: f64,
        cancel: &CancellationToken,
    ) -> (String, usize) {
        let mut out = String::new();
        let mut tokens = 0usize;
        let mut seen = HashSet::new();

        for s in scored {
            if cancel.is_cancelled() {
                break;
            }
            if !matches!(
                s.symbol.kind,
                SymbolKind::Struct | SymbolKind::Interface | SymbolKind::Type | SymbolKind::Class
            ) {
                continue;
            }
            if !seen.insert(s.symbol.id.clone()) {
                continue;
            }
            let rendered = self
                .file_cache
                .read_span(&s.symbol.file_path, s.symbol.start_line, s.symbol.end_line)
                .unwrap_or_else(|| fallback_render(&s.symbol));
            let block = format!(
                "```{lang}\n// {path}:{line} {name}\n{body}\n```",
                lang = s.symbol.language,
                path = s.symbol.file_path,
                line = s.symbol.start_line,
                name = s.symbol.name,
                body = rendered
            );
            let block_tokens = estimate_tokens(&block, self.config.chars_per_token);
            if tokens + block_tokens > types_budget as usize {
                break;
            }
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&block);
            tokens += block_tokens;
        }
        (out, tokens)
    }

    /// Spec §4.2 step 7: library docs are optional, degrade to empty on
    /// any provider error or when the provider's handler requests a skip.
    async fn pack_library_docs(
        &self,
        query: &str,
        lib_docs_budget: f64,
        cancel: &CancellationToken,
    ) -> (String, Vec<String>, usize) {
        if !self.config.include_library_docs || cancel.is_cancelled() {
            return (String::new(), Vec::new(), 0);
        }
        let Some(provider) = &self.library_docs else {
            return (String::new(), Vec::new(), 0);
        };
        if let Some(handler) = &self.library_docs_handler {
            if handler.should_skip() {
                return (String::new(), Vec::new(), 0);
            }
        }

        let docs = match provider.search(query, 10).await {
            Ok(docs) => docs,
            Err(e) => {
                warn!(error = %e, "library doc provider failed, proceeding without docs");
                Vec::new()
            }
        };

        let mut out = String::new();
        let mut included = Vec::new();
        let mut tokens = 0usize;
        for doc in docs {
            if cancel.is_cancelled() {
                break;
            }
            let block = format!(
                "### {library}::{symbol_path}\n```\n{signature}\n```\n{content}",
                library = doc.library,
                symbol_path = doc.symbol_path,
                signature = doc.signature,
                content = doc.doc_content
            );
            let block_tokens = estimate_tokens(&block, self.config.chars_per_token);
            if tokens + block_tokens > lib_docs_budget as usize {
                break;
            }
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&block);
            tokens += block_tokens;
            included.push(format!("{}::{}", doc.library, doc.symbol_path));
        }
        (out, included, tokens)
    }
}

fn fallback_render(symbol: &Symbol) -> String {
    if !symbol.doc_comment.is_empty() || !symbol.signature.is_empty() {
        format!("{}\n{}", symbol.doc_comment, symbol.signature)
            .trim()
            .to_string()
    } else {
        format!("{:?} {}", symbol.kind, symbol.name)
    }
}

fn estimate_tokens(text: &str, chars_per_token: f64) -> usize {
    (text.len() as f64 / chars_per_token).ceil() as usize
}

fn as_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
