//! The pinned-instruction block: a session-owned artefact holding the
//! original query, an ordered plan, findings, and constraints, rendered
//! to Markdown and compressible under a token budget (spec §4.4).

use codectx_core::CoreError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::types::estimate_tokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    InProgress,
    Done,
    Skipped,
}

impl StepStatus {
    const fn symbol(self) -> &'static str {
        match self {
            Self::Pending => "[ ]",
            Self::InProgress => "[>]",
            Self::Done => "[x]",
            Self::Skipped => "[-]",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub description: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub summary: String,
    pub detail: String,
}

/// Limits on the pinned block's bounded lists.
#[derive(Debug, Clone, Copy)]
pub struct PinnedLimits {
    pub max_plan_steps: usize,
    pub max_findings: usize,
    pub max_constraints: usize,
    pub min_pinned_budget: usize,
    pub min_code_budget: usize,
}

impl Default for PinnedLimits {
    fn default() -> Self {
        Self {
            max_plan_steps: 50,
            max_findings: 100,
            max_constraints: 50,
            min_pinned_budget: 200,
            min_code_budget: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PinnedState {
    original_query: Option<String>,
    plan: Vec<PlanStep>,
    findings: Vec<Finding>,
    constraints: Vec<String>,
    #[serde(skip)]
    cached_render: Option<String>,
}

/// Session-owned artefact. All mutators take `&self` and synchronize
/// through a single internal lock; `render` memoises its output until
/// the next mutation invalidates the cache.
#[derive(Debug)]
pub struct PinnedInstructions {
    state: Mutex<PinnedState>,
    limits: PinnedLimits,
}

impl Default for PinnedInstructions {
    fn default() -> Self {
        Self::new(PinnedLimits::default())
    }
}

impl PinnedInstructions {
    #[must_use]
    pub fn new(limits: PinnedLimits) -> Self {
        Self {
            state: Mutex::new(PinnedState::default()),
            limits,
        }
    }

    /// Write-once: fails with [`AgentError::Core`]`(`[`CoreError::QueryAlreadySet`]`)`
    /// if a query was already recorded.
    pub fn set_original_query(&self, query: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock();
        if state.original_query.is_some() {
            return Err(AgentError::Core(CoreError::QueryAlreadySet));
        }
        state.original_query = Some(query.into());
        state.cached_render = None;
        Ok(())
    }

    #[must_use]
    pub fn original_query(&self) -> Option<String> {
        self.state.lock().original_query.clone()
    }

    pub fn add_plan_step(&self, description: impl Into<String>) -> Result<usize> {
        let mut state = self.state.lock();
        if state.plan.len() >= self.limits.max_plan_steps {
            return Err(AgentError::Core(CoreError::PlanStepsLimitReached(
                self.limits.max_plan_steps,
            )));
        }
        state.plan.push(PlanStep {
            description: description.into(),
            status: StepStatus::Pending,
        });
        state.cached_render = None;
        Ok(state.plan.len() - 1)
    }

    pub fn set_step_status(&self, index: usize, status: StepStatus) -> Result<()> {
        let mut state = self.state.lock();
        let step = state
            .plan
            .get_mut(index)
            .ok_or(AgentError::Core(CoreError::InvalidStepIndex(index)))?;
        step.status = status;
        state.cached_render = None;
        Ok(())
    }

    pub fn add_finding(&self, summary: impl Into<String>, detail: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock();
        if state.findings.len() >= self.limits.max_findings {
            return Err(AgentError::Core(CoreError::FindingsLimitReached(
                self.limits.max_findings,
            )));
        }
        state.findings.push(Finding {
            summary: summary.into(),
            detail: detail.into(),
        });
        state.cached_render = None;
        Ok(())
    }

    pub fn add_constraint(&self, constraint: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock();
        if state.constraints.len() >= self.limits.max_constraints {
            return Err(AgentError::Core(CoreError::ConstraintsLimitReached(
                self.limits.max_constraints,
            )));
        }
        state.constraints.push(constraint.into());
        state.cached_render = None;
        Ok(())
    }

    /// Renders the block to Markdown, memoising until the next mutation.
    #[must_use]
    pub fn render(&self) -> String {
        let mut state = self.state.lock();
        if let Some(cached) = &state.cached_render {
            return cached.clone();
        }
        let rendered = render_markdown(&state);
        state.cached_render = Some(rendered.clone());
        rendered
    }

    /// Degrades the block in place until its rendered size is below
    /// `target_tokens`, in order: drop finding details, aggregate
    /// findings beyond the first 3 into one summary, shorten constraints
    /// to at most 50 characters. Stops as soon as the target is met.
    pub fn compress(&self, target_tokens: usize) {
        let mut state = self.state.lock();
        state.cached_render = None;
        if estimate_tokens(&render_markdown(&state)) <= target_tokens {
            return;
        }

        for finding in &mut state.findings {
            finding.detail.clear();
        }
        if estimate_tokens(&render_markdown(&state)) <= target_tokens {
            return;
        }

        if state.findings.len() > 3 {
            let aggregated = state.findings.len() - 3;
            state.findings.truncate(3);
            state.findings.push(Finding {
                summary: format!("Identified {aggregated} issues"),
                detail: String::new(),
            });
        }
        if estimate_tokens(&render_markdown(&state)) <= target_tokens {
            return;
        }

        for constraint in &mut state.constraints {
            if constraint.len() > 50 {
                constraint.truncate(50);
            }
        }
    }

    /// Computes the implied pinned-block budget from the totals a caller
    /// already knows about, then calls [`Self::compress`].
    pub fn compress_to_fit(&self, total_budget: usize, other_reserved: usize) {
        let pinned_budget = (total_budget.saturating_sub(other_reserved + self.limits.min_code_budget))
            .max(self.limits.min_pinned_budget);
        self.compress(pinned_budget);
    }

    /// A JSON-serializable snapshot preserving every field (the cached
    /// render is recomputed on load, not persisted).
    #[must_use]
    pub fn to_snapshot(&self) -> PinnedSnapshot {
        let state = self.state.lock();
        PinnedSnapshot {
            original_query: state.original_query.clone(),
            plan: state.plan.clone(),
            findings: state.findings.clone(),
            constraints: state.constraints.clone(),
        }
    }

    #[must_use]
    pub fn from_snapshot(snapshot: PinnedSnapshot, limits: PinnedLimits) -> Self {
        Self {
            state: Mutex::new(PinnedState {
                original_query: snapshot.original_query,
                plan: snapshot.plan,
                findings: snapshot.findings,
                constraints: snapshot.constraints,
                cached_render: None,
            }),
            limits,
        }
    }
}

/// JSON round-trip representation of [`PinnedInstructions`]'s fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinnedSnapshot {
    pub original_query: Option<String>,
    pub plan: Vec<PlanStep>,
    pub findings: Vec<Finding>,
    pub constraints: Vec<String>,
}

fn render_markdown(state: &PinnedState) -> String {
    let mut out = String::new();
    if let Some(query) = &state.original_query {
        out.push_str("## Original Query\n\n");
        out.push_str(query);
        out.push_str("\n\n");
    }
    if !state.plan.is_empty() {
        out.push_str("## Plan\n\n");
        for step in &state.plan {
            out.push_str(&format!("{} {}\n", step.status.symbol(), step.description));
        }
        out.push('\n');
    }
    if !state.findings.is_empty() {
        out.push_str("## Findings\n\n");
        for finding in &state.findings {
            if finding.detail.is_empty() {
                out.push_str(&format!("- {}\n", finding.summary));
            } else {
                out.push_str(&format!("- {}: {}\n", finding.summary, finding.detail));
            }
        }
        out.push('\n');
    }
    if !state.constraints.is_empty() {
        out.push_str("## Constraints\n\n");
        for constraint in &state.constraints {
            out.push_str(&format!("- {constraint}\n"));
        }
    }
    out
}
