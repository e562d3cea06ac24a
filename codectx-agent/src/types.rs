//! Core value types threaded through the agent-loop context manager
//! (spec §4.4).

use serde::{Deserialize, Serialize};

/// A symbol the assembler decided was relevant, tracked across the
/// session's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntry {
    /// `filePath:startLine:symbolName`, matching `ContextResult::symbols_included`.
    pub id: String,
    pub relevance: f64,
    pub added_at: u64,
    pub last_accessed: u64,
    /// Approximate token contribution; used by eviction scoring since the
    /// rendered context is a single string rather than per-entry text.
    pub tokens: usize,
    /// Entries seeded from the original query are always protected, as is
    /// anything the caller pins explicitly.
    pub protected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub step: u64,
    pub tool_name: String,
    pub status: String,
    pub output: String,
    pub tokens: usize,
    /// Set when `output` was cut short for length, or this entry is a
    /// synthetic collapse of several older results.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

/// The full working context handed back to the caller after `assemble`
/// or `update`. Self-contained and cheaply cloned so `update` can deep
/// copy it before mutating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    pub context: String,
    pub code_entries: Vec<CodeEntry>,
    pub library_docs_included: Vec<String>,
    pub tool_results: Vec<ToolResult>,
    pub conversation_history: Vec<ConversationMessage>,
    pub system_prompt: String,
    pub total_tokens: usize,
    pub current_step: u64,
    pub truncated: bool,
}

/// A tool invocation's raw result, as the caller observed it, plus any
/// entity ids it surfaced that the caller's own indexing already
/// resolved (e.g. symbols named in the tool's structured output).
#[derive(Debug, Clone)]
pub struct RawToolResult {
    pub tool_name: String,
    pub status: String,
    pub output: String,
    pub discovered_entry_ids: Vec<String>,
}

/// Selects which [`crate::eviction`] strategy `ContextManager::update`
/// uses once `totalTokens` exceeds `max_context_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionPolicy {
    Lru,
    Relevance,
    Hybrid,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::Hybrid
    }
}

/// Tuning knobs for [`crate::manager::ContextManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub max_tool_result_length: usize,
    pub max_tool_results: usize,
    pub max_context_size: usize,
    pub eviction_target: usize,
    pub eviction_policy: EvictionPolicy,
    /// Weight given to relevance vs. age in the `hybrid` policy's score.
    pub relevance_weight: f64,
    /// Steps after which an untouched entry's age penalty saturates at 1.0.
    pub max_age_steps: u64,
    /// System prompt template containing `{{LANGUAGE}}` and `{{TOOLS}}`
    /// markers; insertions fall back to append-at-end if a marker is
    /// missing.
    pub system_prompt_template: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_tool_result_length: 4000,
            max_tool_results: 10,
            max_context_size: 16_000,
            eviction_target: 12_000,
            eviction_policy: EvictionPolicy::Hybrid,
            relevance_weight: 0.6,
            max_age_steps: 20,
            system_prompt_template: concat!(
                "You are an autonomous coding agent working in a {{LANGUAGE}} codebase.\n",
                "Available tools:\n{{TOOLS}}\n",
                "Use the supplied context to answer precisely and cite file:line references.",
            )
            .to_string(),
        }
    }
}

/// Small closed extension -> language map used to detect the dominant
/// project language over a set of included code entries.
#[must_use]
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "go" => "Go",
        "py" => "Python",
        "rs" => "Rust",
        "js" | "mjs" | "cjs" => "JavaScript",
        "ts" | "tsx" => "TypeScript",
        "java" => "Java",
        "rb" => "Ruby",
        "c" | "h" => "C",
        "cc" | "cpp" | "cxx" | "hpp" => "C++",
        "cs" => "C#",
        _ => return None,
    })
}

/// Counts file extensions across `symbols_included` (`filePath:line:name`
/// entries) and returns the most common language, defaulting to
/// `"unknown"` when nothing recognisable is present.
#[must_use]
pub fn detect_dominant_language(symbols_included: &[String]) -> String {
    use std::collections::HashMap;

    let mut counts: HashMap<&'static str, usize> = HashMap::new();
    for entry in symbols_included {
        let file_path = entry.split(':').next().unwrap_or(entry);
        if let Some(ext) = file_path.rsplit('.').next() {
            if let Some(lang) = language_for_extension(ext) {
                *counts.entry(lang).or_insert(0) += 1;
            }
        }
    }
    counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(lang, _)| lang.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() as f64 / 4.0).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dominant_language_by_extension_count() {
        let entries = vec![
            "pkg/auth/validator.go:10:ValidateToken".to_string(),
            "pkg/auth/session.go:5:RefreshSession".to_string(),
            "pkg/auth/helpers.py:1:helper".to_string(),
        ];
        assert_eq!(detect_dominant_language(&entries), "Go");
    }

    #[test]
    fn unknown_extensions_fall_back_to_unknown() {
        let entries = vec!["README.md:1:intro".to_string()];
        assert_eq!(detect_dominant_language(&entries), "unknown");
    }
}
