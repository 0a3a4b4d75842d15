//! Context window management: estimation, budgets, file contexts, and truncation.
//!
//! 1. **[`tokens`]**: deterministic character-count token estimates.
//!
//! 2. **[`budget`]**: [`ContextBudget`] classifies the log as healthy,
//!    approaching the limit (80% by default) or critical (90%).
//!
//! 3. **[`file_context`]**: [`FileContextStore`] inserts file contents as
//!    system messages, at most one per path, evicting old or large entries
//!    when the cap is reached.
//!
//! 4. **[`truncation`]**: [`truncate`] rebuilds the log under pressure,
//!    keeping the system prompt, a few file contexts, and the newest
//!    conversation in whole tool-call groups.

pub mod budget;
pub mod file_context;
pub mod tokens;
pub mod truncation;

pub use budget::{ContextBudget, ContextUsage, PressureState};
pub use file_context::{AddOutcome, FileContextStore};
pub use truncation::truncate;

use serde::{Deserialize, Serialize};

/// Context settings for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_tokens: usize,
    pub warning_ratio: f64,
    pub critical_ratio: f64,
    /// Message cap applied by truncation.
    pub max_history_messages: usize,
    /// Maximum number of file-context entries.
    pub max_context_files: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: budget::DEFAULT_MAX_TOKENS,
            warning_ratio: budget::DEFAULT_WARNING_RATIO,
            critical_ratio: budget::DEFAULT_CRITICAL_RATIO,
            max_history_messages: truncation::DEFAULT_MAX_HISTORY_MESSAGES,
            max_context_files: file_context::DEFAULT_MAX_CONTEXT_FILES,
        }
    }
}

impl ContextConfig {
    pub fn budget(&self) -> ContextBudget {
        ContextBudget::new()
            .with_max_tokens(self.max_tokens)
            .with_warning_ratio(self.warning_ratio)
            .with_critical_ratio(self.critical_ratio)
    }

    pub fn file_store(&self) -> FileContextStore {
        FileContextStore::new(self.budget(), self.max_context_files)
    }
}
