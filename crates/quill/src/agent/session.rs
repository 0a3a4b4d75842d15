//! Conversation state for one interactive session.
//!
//! A [`Session`] owns the message log and the context settings that govern
//! it. The log always starts with the system prompt; file contexts go
//! through the [`FileContextStore`] and every trim goes through
//! [`truncate`](crate::context::truncate).

use crate::Message;
use crate::context::file_context::count_file_contexts;
use crate::context::{
    AddOutcome, ContextBudget, ContextConfig, ContextUsage, FileContextStore, truncate,
};
use std::path::Path;
use tracing::debug;

/// Default and reasoner model names, and which one is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub default: String,
    pub reasoner: String,
    pub use_reasoner: bool,
}

impl ModelSelection {
    pub fn new(default: impl Into<String>, reasoner: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            reasoner: reasoner.into(),
            use_reasoner: false,
        }
    }

    /// The model used for normal turns.
    pub fn active(&self) -> &str {
        if self.use_reasoner {
            &self.reasoner
        } else {
            &self.default
        }
    }

    /// Switch between the default and reasoner model. Returns the new active model.
    pub fn toggle(&mut self) -> &str {
        self.use_reasoner = !self.use_reasoner;
        self.active()
    }
}

/// The message log plus the budget and file-context policy applied to it.
#[derive(Debug, Clone)]
pub struct Session {
    log: Vec<Message>,
    budget: ContextBudget,
    store: FileContextStore,
    max_history_messages: usize,
    models: Option<ModelSelection>,
}

impl Session {
    pub fn new(system_prompt: impl Into<String>, config: ContextConfig) -> Self {
        Self {
            log: vec![Message::system(system_prompt)],
            budget: config.budget(),
            store: config.file_store(),
            max_history_messages: config.max_history_messages,
            models: None,
        }
    }

    pub fn with_models(mut self, models: ModelSelection) -> Self {
        self.models = Some(models);
        self
    }

    pub fn models(&self) -> Option<&ModelSelection> {
        self.models.as_ref()
    }

    pub fn models_mut(&mut self) -> Option<&mut ModelSelection> {
        self.models.as_mut()
    }

    pub fn log(&self) -> &[Message] {
        &self.log
    }

    pub fn budget(&self) -> &ContextBudget {
        &self.budget
    }

    pub fn system_prompt(&self) -> &str {
        self.log.first().map(Message::text).unwrap_or_default()
    }

    /// Replace the root system prompt, e.g. after the base directory changes.
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        match self.log.first_mut() {
            Some(first) => *first = Message::system(prompt),
            None => self.log.push(Message::system(prompt)),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.log.push(Message::user(content));
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.log.push(message);
    }

    /// Add a file's content as a file-context entry.
    pub fn add_file_context(&mut self, path: &Path, content: &str) -> AddOutcome {
        self.store.add(&mut self.log, path, content)
    }

    /// Trim the log to the budget and message cap. Returns how many messages
    /// were removed.
    pub fn truncate(&mut self) -> usize {
        let before = self.log.len();
        self.log = truncate(&self.log, &self.budget, self.max_history_messages);
        let removed = before.saturating_sub(self.log.len());
        if removed > 0 {
            debug!(removed, remaining = self.log.len(), "session log truncated");
        }
        removed
    }

    /// Reset the log to the system prompt alone.
    pub fn clear_context(&mut self) {
        self.log.truncate(1);
    }

    pub fn usage(&self) -> ContextUsage {
        self.budget.estimate_usage(&self.log)
    }

    pub fn file_context_count(&self) -> usize {
        count_file_contexts(&self.log)
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}
