//! File-context entries: file contents the user added to the conversation.
//!
//! Each entry is a system message starting with a stable marker that names
//! the file's normalized absolute path, so the store can find, replace, and
//! evict entries by path. At most one entry exists per path.

use super::budget::{ContextBudget, PressureState};
use super::tokens::{estimate, estimate_text};
use crate::{Message, MessageRole};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

const MARKER_PREFIX: &str = "User added file '";
const MARKER_SUFFIX: &str = "'. Content:\n\n";

/// Default maximum number of file-context entries in the log.
pub const DEFAULT_MAX_CONTEXT_FILES: usize = 5;

/// Fraction of `max_tokens` above which a single file is refused outright.
pub const MAX_SINGLE_FILE_RATIO: f64 = 0.8;

fn marker(path: &str) -> String {
    format!("{MARKER_PREFIX}{path}{MARKER_SUFFIX}")
}

/// Build the system message for a file's content.
pub fn file_context_message(path: &Path, content: &str) -> Message {
    Message::system(format!("{}{content}", marker(&path.display().to_string())))
}

/// The path named by a file-context entry, or `None` for any other message.
pub fn file_context_path(message: &Message) -> Option<&str> {
    if message.role != MessageRole::System {
        return None;
    }
    let rest = message.text().strip_prefix(MARKER_PREFIX)?;
    rest.split_once(MARKER_SUFFIX).map(|(path, _)| path)
}

pub fn is_file_context(message: &Message) -> bool {
    file_context_path(message).is_some()
}

pub fn count_file_contexts(log: &[Message]) -> usize {
    log.iter().filter(|m| is_file_context(m)).count()
}

/// Whether the log ends with an assistant message whose tool calls have not
/// all been answered. Inserting anything then would split a tool-call group.
pub fn has_pending_tool_calls(log: &[Message]) -> bool {
    let Some(last) = log.last() else {
        return false;
    };
    if !last.has_tool_calls() {
        return false;
    }
    let answered: HashSet<&str> = log
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .filter_map(|m| m.tool_call_id.as_deref())
        .collect();
    last.tool_call_ids().any(|id| !answered.contains(id))
}

/// Result of [`FileContextStore::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The entry was inserted. `evicted` lists the paths removed to make room.
    Inserted { evicted: Vec<String> },
    /// A tool-call group is open; nothing was changed.
    Deferred,
    /// The file alone would take too much of the context window.
    Rejected { estimated_tokens: usize, limit: usize },
}

impl AddOutcome {
    /// `false` only when the file was rejected.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, AddOutcome::Rejected { .. })
    }
}

/// Inserts file contents into the log as file-context entries, bounded in
/// count and size.
#[derive(Debug, Clone)]
pub struct FileContextStore {
    budget: ContextBudget,
    max_entries: usize,
}

impl FileContextStore {
    /// `max_entries` is clamped to at least one.
    pub fn new(budget: ContextBudget, max_entries: usize) -> Self {
        Self {
            budget,
            max_entries: max_entries.max(1),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn add(&self, log: &mut Vec<Message>, path: &Path, content: &str) -> AddOutcome {
        let estimated_tokens = estimate_text(content);
        let limit = self.budget.fraction_of_max(MAX_SINGLE_FILE_RATIO);
        if estimated_tokens > limit {
            debug!(
                path = %path.display(),
                estimated_tokens, limit, "file too large for context"
            );
            return AddOutcome::Rejected {
                estimated_tokens,
                limit,
            };
        }

        if has_pending_tool_calls(log) {
            debug!(path = %path.display(), "deferring file context until tool calls are answered");
            return AddOutcome::Deferred;
        }

        let path_str = path.display().to_string();
        log.retain(|m| file_context_path(m) != Some(path_str.as_str()));

        let evict_largest = self.budget.state(log) != PressureState::Healthy;
        let mut evicted = Vec::new();
        loop {
            let entries: Vec<usize> = log
                .iter()
                .enumerate()
                .filter(|(_, m)| is_file_context(m))
                .map(|(i, _)| i)
                .collect();
            if entries.len() < self.max_entries {
                break;
            }
            let victim = if evict_largest {
                largest_entry(log, &entries)
            } else {
                entries[0]
            };
            let removed = log.remove(victim);
            if let Some(p) = file_context_path(&removed) {
                debug!(path = p, largest = evict_largest, "evicted file context");
                evicted.push(p.to_string());
            }
        }

        let message = file_context_message(path, content);
        match log.iter().rposition(|m| m.role == MessageRole::User) {
            Some(i) => log.insert(i, message),
            None => log.push(message),
        }
        AddOutcome::Inserted { evicted }
    }
}

/// Index of the largest entry; the oldest wins ties.
fn largest_entry(log: &[Message], entries: &[usize]) -> usize {
    let mut best = entries[0];
    let mut best_tokens = estimate(&log[best]);
    for &i in &entries[1..] {
        let tokens = estimate(&log[i]);
        if tokens > best_tokens {
            best = i;
            best_tokens = tokens;
        }
    }
    best
}
