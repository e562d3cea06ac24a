//! Thin prompting layer over an [`LLMClient`] that produces cache-ready
//! [`Summary`] values, with circuit-open fallback and validation (spec
//! §4.3.5).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use codectx_core::{CompletionOptions, LLMClient, Summary, SummaryLevel};
use codectx_resilience::{CircuitBreaker, WorkerPool};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, SummaryError};
use crate::cache::SummaryCache;
use crate::types::level_limits;
use crate::validator::{SummaryValidator, ValidationIssue};

/// Narrow seam a composition root wires a cost estimator into, without
/// `codectx-summary` depending on `codectx-adapters` (the concrete
/// `CostEstimator` lives there and is bridged in by whatever crate
/// assembles the full application).
pub trait CostGuard: Send + Sync {
    /// Returns `true` if generating `request_count` summaries at roughly
    /// `avg_tokens_per_request` each stays within configured cost limits.
    fn allow(&self, request_count: usize, avg_tokens_per_request: usize) -> bool;

    fn record_usage(&self, _input_tokens: usize, _output_tokens: usize) {}
}

/// Everything the Summarizer needs to produce (or refresh) one entity's
/// summary.
#[derive(Debug, Clone)]
pub struct SummarizeRequest {
    pub id: String,
    pub level: SummaryLevel,
    pub parent_id: String,
    pub language: String,
    /// Rendered `ProjectInfo`/`PackageInfo`/`FileInfo` prompt body.
    pub prompt_body: String,
    pub current_hash: String,
    pub known_symbol_names: HashSet<String>,
    /// Names/paths available for a partial, metadata-only summary when
    /// the circuit is open and no cached entry exists to fall back on.
    pub fallback_names: Vec<String>,
}

fn build_prompt(request: &SummarizeRequest) -> String {
    format!(
        "Summarize the following {level} in {language}. \
         Respond in exactly the form:\nSUMMARY: <one or two sentences>\nKEYWORDS: <comma-separated>\n\n{body}",
        level = level_name(request.level),
        language = request.language,
        body = request.prompt_body,
    )
}

fn level_name(level: SummaryLevel) -> &'static str {
    match level {
        SummaryLevel::Project => "project",
        SummaryLevel::Package => "package",
        SummaryLevel::File => "file",
        SummaryLevel::Symbol => "symbol",
    }
}

/// Parses a `SUMMARY: ... \n KEYWORDS: ...` completion into its parts.
/// Tolerates missing `KEYWORDS:` (empty keyword list) and leading/trailing
/// whitespace; content defaults to the raw response if no `SUMMARY:`
/// marker is present.
#[must_use]
pub fn parse_response(text: &str) -> (String, Vec<String>) {
    let mut content = String::new();
    let mut keywords = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("SUMMARY:") {
            content = rest.trim().to_string();
        } else if let Some(rest) = trimmed.strip_prefix("KEYWORDS:") {
            keywords = rest
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from)
                .collect();
        }
    }
    if content.is_empty() {
        content = text.trim().to_string();
    }
    (content, keywords)
}

fn partial_summary(request: &SummarizeRequest) -> Summary {
    let now = Utc::now();
    let content = if request.fallback_names.is_empty() {
        format!("({} — no summary available)", request.id)
    } else {
        format!(
            "Contains: {} ({} items).",
            request.fallback_names.join(", "),
            request.fallback_names.len()
        )
    };
    Summary {
        id: request.id.clone(),
        level: request.level,
        parent_id: request.parent_id.clone(),
        children: vec![],
        content,
        keywords: vec![],
        hash: request.current_hash.clone(),
        language: request.language.clone(),
        tokens_used: 0,
        partial: true,
        created_at: now,
        updated_at: now,
        version: 1,
    }
}

/// Generates summaries by prompting `L`, validating the result, and
/// storing it in a [`SummaryCache`]; falls back gracefully when the
/// circuit protecting the LLM call is open.
pub struct Summarizer<L: LLMClient> {
    llm: Arc<L>,
    cache: Arc<SummaryCache>,
    breaker: Arc<CircuitBreaker>,
    validator: SummaryValidator,
}

impl<L: LLMClient> Summarizer<L> {
    #[must_use]
    pub fn new(
        llm: Arc<L>,
        cache: Arc<SummaryCache>,
        breaker: Arc<CircuitBreaker>,
        validator: SummaryValidator,
    ) -> Self {
        Self {
            llm,
            cache,
            breaker,
            validator,
        }
    }

    /// Generates (or returns the cached) summary for one entity.
    pub async fn generate(&self, request: &SummarizeRequest) -> Result<Summary> {
        if let Some(cached) = self.cache.get(&request.id) {
            if cached.hash == request.current_hash {
                debug!(id = %request.id, "summarizer cache hit, hash unchanged");
                return Ok(cached);
            }
            debug!(id = %request.id, "summarizer cache hit but hash stale, regenerating");
        }

        if !self.breaker.allow() {
            warn!(id = %request.id, "summarizer circuit open, falling back");
            return Ok(self.fallback(request));
        }

        let start = Instant::now();
        let limits = level_limits(request.level);
        let opts = CompletionOptions {
            temperature: 0.3,
            max_tokens: limits.max_tokens,
        };
        let prompt = build_prompt(request);

        let response = match self.llm.complete(&prompt, opts).await {
            Ok(response) => {
                self.breaker.record_success(start.elapsed());
                response
            }
            Err(_) => {
                self.breaker.record_failure();
                warn!(id = %request.id, "summarizer LLM call failed, falling back");
                return Ok(self.fallback(request));
            }
        };

        let (content, mut keywords) = parse_response(&response.content);
        keywords.truncate(limits.max_keywords);

        let validation = self.validator.validate(
            &content,
            &keywords,
            request.level,
            request.level,
            &request.parent_id,
            &request.parent_id,
            &request.known_symbol_names,
        );
        if !validation.is_valid() {
            for issue in &validation.issues {
                debug!(id = %request.id, ?issue, "summary validation issue");
            }
        }

        let now = Utc::now();
        let summary = Summary {
            id: request.id.clone(),
            level: request.level,
            parent_id: request.parent_id.clone(),
            children: vec![],
            content,
            keywords,
            hash: request.current_hash.clone(),
            language: request.language.clone(),
            tokens_used: response.output_tokens,
            partial: !validation.is_valid(),
            created_at: now,
            updated_at: now,
            version: self.cache.get_stale(&request.id).map_or(1, |(s, _)| s.version + 1),
        };
        self.cache.set(summary.clone());
        Ok(summary)
    }

    fn fallback(&self, request: &SummarizeRequest) -> Summary {
        if let Some((stale, _)) = self.cache.get_stale(&request.id) {
            return stale;
        }
        let summary = partial_summary(request);
        self.cache.set(summary.clone());
        summary
    }

    /// Generates every package summary in `requests`, cost-pre-checked
    /// through `cost_guard`, dispatched across `pool` with an
    /// order-preserving result slice.
    pub async fn generate_all_package_summaries(
        &self,
        cancel: CancellationToken,
        requests: Vec<SummarizeRequest>,
        pool: &WorkerPool,
        cost_guard: Option<&dyn CostGuard>,
    ) -> Result<Vec<Option<Summary>>>
    where
        L: 'static,
    {
        if let Some(guard) = cost_guard {
            let avg_tokens = level_limits(SummaryLevel::Package).max_tokens;
            if !guard.allow(requests.len(), avg_tokens) {
                return Err(SummaryError::ValidationFailed(
                    "projected cost exceeds configured limits".to_string(),
                ));
            }
        }

        let llm = self.llm.clone();
        let cache = self.cache.clone();
        let breaker = self.breaker.clone();
        let validator_config = crate::validator::ValidatorConfig::default();

        let outcome = codectx_resilience::map_reduce(pool, cancel, requests, move |_idx, request| {
            let llm = llm.clone();
            let cache = cache.clone();
            let breaker = breaker.clone();
            let validator = SummaryValidator::new(crate::validator::ValidatorConfig {
                min_summary_length: validator_config.min_summary_length,
            });
            async move {
                let summarizer = Summarizer {
                    llm,
                    cache,
                    breaker,
                    validator,
                };
                summarizer
                    .generate(&request)
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await;

        if let Some(err) = &outcome.error {
            warn!(error = %err, "one or more package summaries failed to generate");
        }
        Ok(outcome.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::SummaryCacheConfig;
    use crate::validator::ValidatorConfig;
    use async_trait::async_trait;
    use codectx_core::{CompletionResponse, FinishReason, LLMErrorClass};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeLlmError;
    impl std::fmt::Display for FakeLlmError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fake llm error")
        }
    }
    impl LLMErrorClass for FakeLlmError {
        fn is_retryable(&self) -> bool {
            true
        }
    }

    struct FakeLlm {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl LLMClient for FakeLlm {
        type Error = FakeLlmError;

        async fn complete(
            &self,
            _prompt: &str,
            _opts: CompletionOptions,
        ) -> std::result::Result<CompletionResponse, Self::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(FakeLlmError);
            }
            Ok(CompletionResponse {
                content: "SUMMARY: Validates tokens and refreshes sessions.\nKEYWORDS: token, handler"
                    .to_string(),
                tokens_used: 30,
                input_tokens: 20,
                output_tokens: 10,
                finish_reason: FinishReason::Stop,
                model: "fake-model".to_string(),
            })
        }

        fn estimate_tokens(&self, text: &str) -> usize {
            text.len() / 4
        }
    }

    fn request(id: &str) -> SummarizeRequest {
        SummarizeRequest {
            id: id.to_string(),
            level: SummaryLevel::File,
            parent_id: "pkg/auth".to_string(),
            language: "go".to_string(),
            prompt_body: "func ValidateToken() error { ... }".to_string(),
            current_hash: "h1".to_string(),
            known_symbol_names: ["ValidateToken".to_string()].into_iter().collect(),
            fallback_names: vec!["ValidateToken".to_string()],
        }
    }

    #[tokio::test]
    async fn generates_and_caches_a_summary() {
        let llm = Arc::new(FakeLlm {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = Arc::new(SummaryCache::new(SummaryCacheConfig::default()));
        let breaker = Arc::new(CircuitBreaker::new("test-llm"));
        let validator = SummaryValidator::new(ValidatorConfig::default());
        let summarizer = Summarizer::new(llm.clone(), cache.clone(), breaker, validator);

        let summary = summarizer.generate(&request("pkg/auth/validator.go")).await.unwrap();
        assert!(!summary.partial);
        assert!(cache.has("pkg/auth/validator.go"));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fresh_cache_hit_with_matching_hash_skips_llm() {
        let llm = Arc::new(FakeLlm {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = Arc::new(SummaryCache::new(SummaryCacheConfig::default()));
        let breaker = Arc::new(CircuitBreaker::new("test-llm"));
        let validator = SummaryValidator::new(ValidatorConfig::default());
        let summarizer = Summarizer::new(llm.clone(), cache, breaker, validator);

        let req = request("pkg/auth/validator.go");
        summarizer.generate(&req).await.unwrap();
        summarizer.generate(&req).await.unwrap();
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_hash_triggers_regeneration() {
        let llm = Arc::new(FakeLlm {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = Arc::new(SummaryCache::new(SummaryCacheConfig::default()));
        let breaker = Arc::new(CircuitBreaker::new("test-llm"));
        let validator = SummaryValidator::new(ValidatorConfig::default());
        let summarizer = Summarizer::new(llm.clone(), cache, breaker, validator);

        let mut req = request("pkg/auth/validator.go");
        summarizer.generate(&req).await.unwrap();
        req.current_hash = "h2".to_string();
        summarizer.generate(&req).await.unwrap();
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn llm_failure_without_cached_entry_yields_partial_summary() {
        let llm = Arc::new(FakeLlm {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let cache = Arc::new(SummaryCache::new(SummaryCacheConfig::default()));
        let breaker = Arc::new(CircuitBreaker::new("test-llm"));
        let validator = SummaryValidator::new(ValidatorConfig::default());
        let summarizer = Summarizer::new(llm, cache, breaker, validator);

        let summary = summarizer.generate(&request("pkg/auth/validator.go")).await.unwrap();
        assert!(summary.partial);
        assert!(summary.content.contains("ValidateToken"));
    }

    #[tokio::test]
    async fn open_circuit_falls_back_to_stale_cache_entry() {
        let ok_llm = Arc::new(FakeLlm {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let cache = Arc::new(SummaryCache::new(SummaryCacheConfig::default()));
        let breaker = Arc::new(CircuitBreaker::with_config(
            "test-llm",
            codectx_resilience::CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        ));
        let validator = SummaryValidator::new(ValidatorConfig::default());
        let summarizer = Summarizer::new(ok_llm, cache.clone(), breaker.clone(), validator);

        let mut req = request("pkg/auth/validator.go");
        summarizer.generate(&req).await.unwrap();

        breaker.record_failure();
        assert!(!breaker.allow());

        req.current_hash = "h2".to_string();
        let fallback = summarizer.generate(&req).await.unwrap();
        assert_eq!(fallback.hash, "h1");
    }

    #[test]
    fn parse_response_handles_missing_keywords() {
        let (content, keywords) = parse_response("SUMMARY: Just a summary, no keywords line.");
        assert_eq!(content, "Just a summary, no keywords line.");
        assert!(keywords.is_empty());
    }

    #[test]
    fn parse_response_splits_comma_separated_keywords() {
        let (_, keywords) =
            parse_response("SUMMARY: Body text.\nKEYWORDS: token, handler,  auth ");
        assert_eq!(keywords, vec!["token", "handler", "auth"]);
    }
}
