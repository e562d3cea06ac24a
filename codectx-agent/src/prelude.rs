//! Convenience re-exports for consumers of `codectx-agent`.

pub use crate::error::{AgentError, Result};
pub use crate::eviction::select_for_eviction;
pub use crate::manager::{inject_tools_into_prompt, render_system_prompt, ContextManager};
pub use crate::pinned::{Finding, PinnedInstructions, PinnedLimits, PinnedSnapshot, PlanStep, StepStatus};
pub use crate::types::{
    detect_dominant_language, estimate_tokens, language_for_extension, AssembledContext,
    CodeEntry, ConversationMessage, EvictionPolicy, ManagerConfig, RawToolResult, ToolResult,
};
