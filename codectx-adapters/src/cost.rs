//! Cost estimator (spec §4.5.3): projects LLM token/dollar cost for
//! summarization work ahead of dispatch, tracks a running usage total, and
//! rejects batches that would exceed configured ceilings — grounded on the
//! pricing-table/threshold pattern in `llmspell-hooks`'s
//! `builtin::cost_tracking::CostTrackingHook` (per-model `input_cost_per_1k`
//! / `output_cost_per_1k`, threshold-based rejection), generalised from a
//! per-provider model table down to the four summary levels this core
//! actually prices.

use codectx_core::SummaryLevel;
use codectx_summary::summarizer::CostGuard;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AdapterError, Result};

/// Dollars-per-1000-tokens pricing, mirroring the reference crate's
/// `ModelPricing`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceTable {
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
}

impl Default for PriceTable {
    fn default() -> Self {
        // Roughly Claude-3-Sonnet-class pricing; callers override for their
        // actual provider/model.
        Self {
            input_cost_per_1k: 0.003,
            output_cost_per_1k: 0.015,
        }
    }
}

/// The per-level token caps the Summarizer prompts against (spec §4.3.5):
/// project 4000/500, package 2000/300, file 1000/150, symbol 500/100. The
/// first figure is the output/content token budget; `input_output_ratio`
/// projects the prompt (input) side, since the core does not know the real
/// prompt size ahead of rendering it.
#[must_use]
pub const fn level_output_budget(level: SummaryLevel) -> usize {
    match level {
        SummaryLevel::Project => 4000,
        SummaryLevel::Package => 2000,
        SummaryLevel::File => 1000,
        SummaryLevel::Symbol => 500,
    }
}

/// `{inputTokens, outputTokens, costUSD}` (spec §4.5.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostEstimate {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

impl CostEstimate {
    fn add(self, other: Self) -> Self {
        Self {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            cost_usd: self.cost_usd + other.cost_usd,
        }
    }
}

/// Ceilings `CheckLimits` enforces before a batch is dispatched.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CostLimits {
    pub max_cost_usd: Option<f64>,
    pub max_total_tokens: Option<u64>,
}

/// Running usage accumulated via `record_usage`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageTotals {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Projects cost ahead of LLM dispatch and tracks actual spend
/// (spec §4.5.3, §4.3.5 `GenerateAllPackageSummaries` cost pre-check).
pub struct CostEstimator {
    prices: PriceTable,
    limits: CostLimits,
    /// How many input tokens to project per output token, absent a
    /// rendered prompt to measure directly. Source-heavy prompts (package
    /// and file level) run larger than this; symbol-level prompts run
    /// smaller. 3.0 is a conservative project-wide average.
    input_output_ratio: f64,
    usage: Mutex<UsageTotals>,
}

impl CostEstimator {
    #[must_use]
    pub fn new(prices: PriceTable, limits: CostLimits) -> Self {
        Self {
            prices,
            limits,
            input_output_ratio: 3.0,
            usage: Mutex::new(UsageTotals::default()),
        }
    }

    #[must_use]
    pub fn with_input_output_ratio(mut self, ratio: f64) -> Self {
        self.input_output_ratio = ratio;
        self
    }

    fn price(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1000.0) * self.prices.input_cost_per_1k
            + (output_tokens as f64 / 1000.0) * self.prices.output_cost_per_1k
    }

    /// `EstimateForLevel(level, n)`.
    #[must_use]
    pub fn estimate_for_level(&self, level: SummaryLevel, n: usize) -> CostEstimate {
        let output_per_item = level_output_budget(level) as u64;
        let input_per_item = (output_per_item as f64 * self.input_output_ratio) as u64;
        let n = n as u64;
        let input_tokens = input_per_item * n;
        let output_tokens = output_per_item * n;
        CostEstimate {
            input_tokens,
            output_tokens,
            cost_usd: self.price(input_tokens, output_tokens),
        }
    }

    /// `EstimateForProject(projects, packages, files)`. Symbol-level
    /// summaries are not counted here: they are generated per-symbol by a
    /// separate dispatch and are not part of the bulk project rollup the
    /// spec names.
    #[must_use]
    pub fn estimate_for_project(&self, projects: usize, packages: usize, files: usize) -> CostEstimate {
        self.estimate_for_level(SummaryLevel::Project, projects)
            .add(self.estimate_for_level(SummaryLevel::Package, packages))
            .add(self.estimate_for_level(SummaryLevel::File, files))
    }

    /// Rejects before dispatch when the projection exceeds configured
    /// ceilings (spec §4.3.5).
    pub fn check_limits(&self, estimate: &CostEstimate) -> Result<()> {
        if let Some(max_cost) = self.limits.max_cost_usd {
            if estimate.cost_usd > max_cost {
                warn!(cost_usd = estimate.cost_usd, max_cost, "cost estimate rejected before dispatch");
                return Err(AdapterError::LimitExceeded {
                    reason: format!(
                        "projected cost ${:.4} exceeds limit ${max_cost:.4}",
                        estimate.cost_usd
                    ),
                });
            }
        }
        if let Some(max_tokens) = self.limits.max_total_tokens {
            let total = estimate.input_tokens + estimate.output_tokens;
            if total > max_tokens {
                warn!(total, max_tokens, "token estimate rejected before dispatch");
                return Err(AdapterError::LimitExceeded {
                    reason: format!("projected tokens {total} exceed limit {max_tokens}"),
                });
            }
        }
        Ok(())
    }

    /// `RecordUsage(input, output)`.
    pub fn record_usage(&self, input_tokens: u64, output_tokens: u64) {
        let mut usage = self.usage.lock();
        usage.input_tokens += input_tokens;
        usage.output_tokens += output_tokens;
        usage.cost_usd += self.price(input_tokens, output_tokens);
    }

    /// `GetUsage()`.
    #[must_use]
    pub fn get_usage(&self) -> UsageTotals {
        *self.usage.lock()
    }
}

/// Bridges this estimator into the Summarizer's narrow [`CostGuard`] seam
/// (spec §4.3.5 `GenerateAllPackageSummaries`) without `codectx-summary`
/// needing to know this crate exists.
impl CostGuard for CostEstimator {
    fn allow(&self, request_count: usize, avg_tokens_per_request: usize) -> bool {
        let output_tokens = (avg_tokens_per_request as u64) * (request_count as u64);
        let input_tokens = (output_tokens as f64 * self.input_output_ratio) as u64;
        let estimate = CostEstimate {
            input_tokens,
            output_tokens,
            cost_usd: self.price(input_tokens, output_tokens),
        };
        self.check_limits(&estimate).is_ok()
    }

    fn record_usage(&self, input_tokens: usize, output_tokens: usize) {
        Self::record_usage(self, input_tokens as u64, output_tokens as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_for_level_scales_with_count() {
        let estimator = CostEstimator::new(PriceTable::default(), CostLimits::default());
        let one = estimator.estimate_for_level(SummaryLevel::File, 1);
        let ten = estimator.estimate_for_level(SummaryLevel::File, 10);
        assert_eq!(ten.output_tokens, one.output_tokens * 10);
        assert_eq!(ten.input_tokens, one.input_tokens * 10);
    }

    #[test]
    fn check_limits_rejects_over_cost_ceiling() {
        let estimator = CostEstimator::new(
            PriceTable::default(),
            CostLimits {
                max_cost_usd: Some(0.01),
                max_total_tokens: None,
            },
        );
        let estimate = estimator.estimate_for_level(SummaryLevel::Project, 100);
        assert!(estimator.check_limits(&estimate).is_err());
    }

    #[test]
    fn check_limits_rejects_over_token_ceiling() {
        let estimator = CostEstimator::new(
            PriceTable::default(),
            CostLimits {
                max_cost_usd: None,
                max_total_tokens: Some(100),
            },
        );
        let estimate = estimator.estimate_for_level(SummaryLevel::Project, 1);
        assert!(estimator.check_limits(&estimate).is_err());
    }

    #[test]
    fn check_limits_passes_within_ceilings() {
        let estimator = CostEstimator::new(
            PriceTable::default(),
            CostLimits {
                max_cost_usd: Some(1000.0),
                max_total_tokens: Some(10_000_000),
            },
        );
        let estimate = estimator.estimate_for_level(SummaryLevel::Symbol, 1);
        assert!(estimator.check_limits(&estimate).is_ok());
    }

    #[test]
    fn record_usage_accumulates() {
        let estimator = CostEstimator::new(PriceTable::default(), CostLimits::default());
        estimator.record_usage(1000, 500);
        estimator.record_usage(1000, 500);
        let usage = estimator.get_usage();
        assert_eq!(usage.input_tokens, 2000);
        assert_eq!(usage.output_tokens, 1000);
        assert!(usage.cost_usd > 0.0);
    }

    #[test]
    fn cost_guard_allow_respects_limits() {
        let estimator = CostEstimator::new(
            PriceTable::default(),
            CostLimits {
                max_cost_usd: Some(0.001),
                max_total_tokens: None,
            },
        );
        assert!(!CostGuard::allow(&estimator, 1000, 4000));
        assert!(CostGuard::allow(&estimator, 1, 10));
    }
}
