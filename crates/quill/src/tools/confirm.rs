//! Operator confirmation.
//!
//! Tools that overwrite files or run shell commands ask before acting. The
//! CLI answers through an interactive prompt; tests and one-shot runs use
//! [`AutoConfirm`].

/// Asks the operator a yes/no question.
pub trait Confirm: Send + Sync {
    /// `true` when the operator agrees. Implementations answer `false` when
    /// no answer can be obtained.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every question the same way.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirm for AutoConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        tracing::debug!(prompt, answer = self.0, "auto-confirm");
        self.0
    }
}
