//! Context budget: classifies how full the context window is.
//!
//! Usage is estimated with [`tokens::estimate_log`](super::tokens::estimate_log)
//! and compared against two ratios of `max_tokens`. Below the warning ratio
//! the log is *healthy*; at or above it the log is *approaching* the limit;
//! at or above the critical ratio it is *critical*. Truncation and file
//! context eviction both key off this state.

use super::file_context::count_file_contexts;
use super::tokens::estimate_log;
use crate::{Message, MessageRole};
use std::collections::BTreeMap;

/// Default context window size in tokens.
pub const DEFAULT_MAX_TOKENS: usize = 66_000;

/// Default fraction of `max_tokens` at which the log is approaching the limit.
pub const DEFAULT_WARNING_RATIO: f64 = 0.8;

/// Default fraction of `max_tokens` at which the log is critical.
pub const DEFAULT_CRITICAL_RATIO: f64 = 0.9;

/// Pressure state of the context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureState {
    Healthy,
    Approaching,
    Critical,
}

impl std::fmt::Display for PressureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PressureState::Healthy => write!(f, "healthy"),
            PressureState::Approaching => write!(f, "approaching limit"),
            PressureState::Critical => write!(f, "critical"),
        }
    }
}

/// Token budget for the conversation log.
///
/// ```
/// use quill::context::{ContextBudget, PressureState};
///
/// let budget = ContextBudget::new().with_max_tokens(1_000);
/// assert_eq!(budget.classify(700), PressureState::Healthy);
/// assert_eq!(budget.classify(800), PressureState::Approaching);
/// assert_eq!(budget.classify(950), PressureState::Critical);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ContextBudget {
    max_tokens: usize,
    warning_ratio: f64,
    critical_ratio: f64,
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            warning_ratio: DEFAULT_WARNING_RATIO,
            critical_ratio: DEFAULT_CRITICAL_RATIO,
        }
    }
}

impl ContextBudget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_warning_ratio(mut self, ratio: f64) -> Self {
        self.warning_ratio = ratio;
        self
    }

    pub fn with_critical_ratio(mut self, ratio: f64) -> Self {
        self.critical_ratio = ratio;
        self
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn warning_ratio(&self) -> f64 {
        self.warning_ratio
    }

    pub fn critical_ratio(&self) -> f64 {
        self.critical_ratio
    }

    /// `fraction` of `max_tokens`, floored.
    pub fn fraction_of_max(&self, fraction: f64) -> usize {
        (self.max_tokens as f64 * fraction) as usize
    }

    /// Classify an estimated token count.
    pub fn classify(&self, estimated_tokens: usize) -> PressureState {
        let pct = self.usage_fraction(estimated_tokens);
        if pct >= self.critical_ratio {
            PressureState::Critical
        } else if pct >= self.warning_ratio {
            PressureState::Approaching
        } else {
            PressureState::Healthy
        }
    }

    fn usage_fraction(&self, estimated_tokens: usize) -> f64 {
        if self.max_tokens == 0 {
            1.0
        } else {
            estimated_tokens as f64 / self.max_tokens as f64
        }
    }

    /// Current pressure state of a log.
    pub fn state(&self, log: &[Message]) -> PressureState {
        self.classify(estimate_log(log).0)
    }

    /// Snapshot of the log's usage against this budget.
    pub fn estimate_usage(&self, log: &[Message]) -> ContextUsage {
        let (estimated_tokens, breakdown) = estimate_log(log);
        ContextUsage {
            total_messages: log.len(),
            estimated_tokens,
            max_tokens: self.max_tokens,
            usage_pct: self.usage_fraction(estimated_tokens),
            state: self.classify(estimated_tokens),
            file_contexts: count_file_contexts(log),
            breakdown,
        }
    }
}

/// Snapshot of context usage at a point in time.
#[derive(Debug, Clone)]
pub struct ContextUsage {
    pub total_messages: usize,
    pub estimated_tokens: usize,
    pub max_tokens: usize,
    /// Usage as a fraction (0.0 to 1.0+).
    pub usage_pct: f64,
    pub state: PressureState,
    pub file_contexts: usize,
    pub breakdown: BTreeMap<MessageRole, usize>,
}

impl ContextUsage {
    /// Usage as a percentage (0 to 100+).
    pub fn usage_percent(&self) -> f64 {
        self.usage_pct * 100.0
    }

    /// True at or above the warning ratio (includes critical).
    pub fn approaching_limit(&self) -> bool {
        self.state != PressureState::Healthy
    }

    pub fn critical_limit(&self) -> bool {
        self.state == PressureState::Critical
    }

    /// Format as a short log-friendly string.
    pub fn to_log_string(&self) -> String {
        format!(
            "context: ~{} tokens ({:.0}% of {}), {} messages, {} file contexts, {}",
            self.estimated_tokens,
            self.usage_percent(),
            self.max_tokens,
            self.total_messages,
            self.file_contexts,
            self.state,
        )
    }
}
