//! The `LLMClient` supplied capability (spec §6.1): a narrow interface the
//! core consumes. The wire protocol, provider selection, and retry-at-the-
//! transport-layer concerns are out of scope (spec §1) — this crate only
//! declares the shape the Summarizer programs against.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Why a completion stopped producing tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Error,
}

/// The result of one `LLMClient::complete` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub tokens_used: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub finish_reason: FinishReason,
    pub model: String,
}

/// Tuning passed through to a `complete` call. Left intentionally sparse —
/// the wire client owns model selection, sampling parameters live at the
/// call site that knows the target level's tuning (spec §4.3.5).
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1000,
        }
    }
}

/// Error classification the retry/circuit-breaker machinery in
/// `codectx-resilience` needs without knowing anything about the wire
/// protocol underneath. Implemented by whatever crate-local error type the
/// embedding application's `LLMClient` returns.
pub trait LLMErrorClass: std::fmt::Display {
    /// Rate-limit, timeout, and 5xx-class errors are retryable.
    fn is_retryable(&self) -> bool;
    /// Invalid-request-class errors are permanent.
    fn is_invalid_request(&self) -> bool {
        false
    }
}

/// The narrow LLM capability the Summarizer depends on (spec §6.1). The
/// wire client, provider routing, and prompt templating beyond `SUMMARY: /
/// KEYWORDS:` parsing are explicitly out of scope (spec §1).
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Associated error type must classify itself as retryable/non-retryable
    /// so `codectx-resilience::retry` can drive it without a core dependency
    /// on any particular provider's error enum.
    type Error: LLMErrorClass + Send + Sync + 'static;

    async fn complete(
        &self,
        prompt: &str,
        opts: CompletionOptions,
    ) -> Result<CompletionResponse, Self::Error>;

    /// A model-specific token estimate; may be a heuristic (spec's
    /// non-goals explicitly permit a length-proportional estimator rather
    /// than a real tokenizer).
    fn estimate_tokens(&self, text: &str) -> usize;
}
