//! Agent-loop context manager (spec §4.4): wraps a
//! [`codectx_context::Assembler`] with session bookkeeping across an
//! agent's turns — code-entry relevance/recency, tool-result history and
//! pruning, token-budget eviction, and a pinned-instructions block.

pub mod error;
pub mod eviction;
pub mod manager;
pub mod pinned;
pub mod prelude;
pub mod types;

pub use error::{AgentError, Result};
pub use eviction::select_for_eviction;
pub use manager::{inject_tools_into_prompt, render_system_prompt, ContextManager};
pub use pinned::{Finding, PinnedInstructions, PinnedLimits, PinnedSnapshot, PlanStep, StepStatus};
pub use types::{
    detect_dominant_language, estimate_tokens, language_for_extension, AssembledContext,
    CodeEntry, ConversationMessage, EvictionPolicy, ManagerConfig, RawToolResult, ToolResult,
};
