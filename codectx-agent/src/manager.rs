//! Orchestrates an [`Assembler`] plus session-scoped bookkeeping across
//! an agent loop's turns (spec §4.4).

use std::collections::HashSet;

use codectx_context::Assembler;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;
use crate::eviction::select_for_eviction;
use crate::types::{
    detect_dominant_language, estimate_tokens, AssembledContext, CodeEntry, ConversationMessage,
    ManagerConfig, RawToolResult, ToolResult,
};

/// Default token estimate for a code entry discovered mid-loop, where no
/// rendered content is available to measure directly.
const DEFAULT_DISCOVERED_ENTRY_TOKENS: usize = 50;

/// Replaces `{{LANGUAGE}}` and `{{TOOLS}}` markers in a system-prompt
/// template, falling back to appending the value if a marker is absent.
#[must_use]
pub fn render_system_prompt(template: &str, language: &str, tools: &[String]) -> String {
    let tools_block = if tools.is_empty() {
        "(none provided yet)".to_string()
    } else {
        tools.iter().map(|t| format!("- {t}")).collect::<Vec<_>>().join("\n")
    };

    let mut rendered = template.to_string();
    rendered = replace_or_append(rendered, "{{LANGUAGE}}", language);
    rendered = replace_or_append(rendered, "{{TOOLS}}", &tools_block);
    rendered
}

fn replace_or_append(template: String, marker: &str, value: &str) -> String {
    if template.contains(marker) {
        template.replace(marker, value)
    } else {
        format!("{template}\n{value}")
    }
}

/// Injects a caller-supplied tool list into an already-rendered system
/// prompt, used when the tool list is only known after the manager's
/// initial `assemble` call.
#[must_use]
pub fn inject_tools_into_prompt(system_prompt: &str, tools: &[String]) -> String {
    let tools_block = if tools.is_empty() {
        "(none provided yet)".to_string()
    } else {
        tools.iter().map(|t| format!("- {t}")).collect::<Vec<_>>().join("\n")
    };
    replace_or_append(system_prompt.to_string(), "{{TOOLS}}", &tools_block)
}

/// Truncates `output` to at most `max_len` characters, preferring to cut
/// at the last newline past the half-way point so the kept portion ends
/// on a clean line boundary.
fn truncate_tool_output(output: &str, max_len: usize) -> String {
    if output.len() <= max_len {
        return output.to_string();
    }
    let half = max_len / 2;
    let cut = output[..max_len]
        .rfind('\n')
        .filter(|&pos| pos >= half)
        .unwrap_or(max_len);
    let truncated_chars = output.len() - cut;
    let mut result = output[..cut].to_string();
    result.push_str(&format!("\n\n[...truncated {truncated_chars} chars]"));
    result
}

/// Wraps an [`Assembler`] with per-session bookkeeping: code-entry
/// relevance/recency, tool-result history, and token-budget eviction.
pub struct ContextManager {
    assembler: Assembler,
    config: ManagerConfig,
}

impl ContextManager {
    #[must_use]
    pub fn new(assembler: Assembler, config: ManagerConfig) -> Self {
        Self { assembler, config }
    }

    /// Runs the assembler, wraps its output in a fresh [`AssembledContext`],
    /// and seeds the conversation with the original query.
    pub async fn assemble(
        &self,
        cancel: CancellationToken,
        query: &str,
        budget: i64,
    ) -> Result<AssembledContext> {
        let result = self.assembler.assemble(cancel, query, budget).await?;

        let code_entries: Vec<CodeEntry> = result
            .symbols_included
            .iter()
            .enumerate()
            .map(|(rank, id)| CodeEntry {
                id: id.clone(),
                relevance: (1.0 - 0.05 * rank as f64).max(0.0),
                added_at: 0,
                last_accessed: 0,
                tokens: if result.symbols_included.is_empty() {
                    0
                } else {
                    result.tokens_used / result.symbols_included.len().max(1)
                },
                protected: true,
            })
            .collect();

        let language = detect_dominant_language(&result.symbols_included);
        let system_prompt = render_system_prompt(&self.config.system_prompt_template, &language, &[]);

        debug!(language, entries = code_entries.len(), "assembled initial agent context");

        Ok(AssembledContext {
            context: result.context,
            code_entries,
            library_docs_included: result.library_docs_included,
            tool_results: Vec::new(),
            conversation_history: vec![ConversationMessage {
                role: "user".to_string(),
                content: query.to_string(),
            }],
            system_prompt,
            total_tokens: result.tokens_used,
            current_step: 0,
            truncated: result.truncated,
        })
    }

    /// Advances the session by one tool call: records the (possibly
    /// truncated) result, prunes old results past `max_tool_results`,
    /// folds in newly discovered code entries, and evicts if the token
    /// budget is now over `max_context_size`.
    #[must_use]
    pub fn update(&self, current: &AssembledContext, tool_result: RawToolResult) -> AssembledContext {
        let mut next = current.clone();
        next.current_step += 1;

        let output_was_truncated = tool_result.output.len() > self.config.max_tool_result_length;
        let truncated_output =
            truncate_tool_output(&tool_result.output, self.config.max_tool_result_length);
        let tokens = estimate_tokens(&truncated_output);
        next.tool_results.push(ToolResult {
            step: next.current_step,
            tool_name: tool_result.tool_name,
            status: tool_result.status,
            output: truncated_output,
            tokens,
            truncated: output_was_truncated,
        });
        next.total_tokens += tokens;

        self.prune_tool_results(&mut next);
        self.fold_in_discovered_entries(&mut next, &tool_result.discovered_entry_ids);

        if next.total_tokens > self.config.max_context_size {
            self.evict(&mut next);
        }

        next
    }

    fn prune_tool_results(&self, ctx: &mut AssembledContext) {
        if ctx.tool_results.len() <= self.config.max_tool_results {
            return;
        }
        let keep_from = ctx.tool_results.len() - (self.config.max_tool_results - 1);
        let collapsed: Vec<ToolResult> = ctx.tool_results.drain(..keep_from).collect();
        let old_sum: usize = collapsed.iter().map(|r| r.tokens).sum();

        let mut summary_lines = String::new();
        for (i, r) in collapsed.iter().enumerate() {
            let preview: String = r.output.chars().take(100).collect();
            summary_lines.push_str(&format!("{}. [{}] {preview}...\n", i + 1, r.status));
        }
        let summary_tokens = estimate_tokens(&summary_lines);

        ctx.tool_results.insert(
            0,
            ToolResult {
                step: collapsed.first().map_or(0, |r| r.step),
                tool_name: "summary".to_string(),
                status: "collapsed".to_string(),
                output: summary_lines,
                tokens: summary_tokens,
                truncated: true,
            },
        );
        ctx.total_tokens = ctx.total_tokens + summary_tokens - old_sum;
    }

    fn fold_in_discovered_entries(&self, ctx: &mut AssembledContext, discovered: &[String]) {
        for id in discovered {
            if let Some(existing) = ctx.code_entries.iter_mut().find(|e| &e.id == id) {
                existing.relevance = (existing.relevance + 0.1).min(1.0);
                existing.last_accessed = ctx.current_step;
            } else {
                ctx.code_entries.push(CodeEntry {
                    id: id.clone(),
                    relevance: 0.5,
                    added_at: ctx.current_step,
                    last_accessed: ctx.current_step,
                    tokens: DEFAULT_DISCOVERED_ENTRY_TOKENS,
                    protected: false,
                });
                ctx.total_tokens += DEFAULT_DISCOVERED_ENTRY_TOKENS;
            }
        }
    }

    fn evict(&self, ctx: &mut AssembledContext) {
        let target_free = ctx.total_tokens - self.config.eviction_target;
        let protected_ids: HashSet<String> = HashSet::new();
        let to_evict = select_for_eviction(
            &ctx.code_entries,
            target_free,
            self.config.eviction_policy,
            ctx.current_step,
            self.config.relevance_weight,
            self.config.max_age_steps,
            &protected_ids,
        );
        if to_evict.is_empty() {
            return;
        }
        warn!(count = to_evict.len(), "evicting code entries over budget");
        let evict_set: HashSet<&String> = to_evict.iter().collect();
        let mut freed = 0usize;
        ctx.code_entries.retain(|e| {
            if evict_set.contains(&e.id) {
                freed += e.tokens;
                false
            } else {
                true
            }
        });
        ctx.total_tokens = ctx.total_tokens.saturating_sub(freed);
        ctx.truncated = true;
    }
}
