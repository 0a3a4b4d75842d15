//! Pressure-driven truncation of the conversation log.
//!
//! When the log is past the warning ratio, or simply has too many messages,
//! [`truncate`] rebuilds it from three parts:
//!
//! 1. The root system prompt, always kept.
//! 2. Up to [`MAX_RETAINED_FILE_CONTEXTS`] file-context entries, smallest and
//!    then most recent first, within a quarter of the target.
//! 3. The newest conversation messages, walked backwards in whole units
//!    until one does not fit. An assistant message and the tool results
//!    answering it form one unit, so a tool-call group is never split.
//!
//! The result is deterministic: the same log and budget always produce the
//! same output.

use super::budget::{ContextBudget, PressureState};
use super::file_context::is_file_context;
use super::tokens::{estimate, estimate_log};
use crate::{Message, MessageRole};
use tracing::debug;

/// Target fraction of `max_tokens` when the log is critical.
pub const CRITICAL_TARGET_RATIO: f64 = 0.6;
/// Target fraction of `max_tokens` when the log is approaching the limit.
pub const APPROACHING_TARGET_RATIO: f64 = 0.7;
/// Target fraction of `max_tokens` when only the message count triggered.
pub const COUNT_TARGET_RATIO: f64 = 0.8;
/// Fraction of the target reserved for file contexts.
pub const FILE_CONTEXT_SHARE: f64 = 0.25;
pub const MAX_RETAINED_FILE_CONTEXTS: usize = 3;

/// Default cap on messages kept after truncation.
pub const DEFAULT_MAX_HISTORY_MESSAGES: usize = 50;

/// Truncate `log` to fit `budget` and `target_max_messages`.
///
/// Returns the log unchanged when it is healthy and within the message cap.
pub fn truncate(
    log: &[Message],
    budget: &ContextBudget,
    target_max_messages: usize,
) -> Vec<Message> {
    let (total_tokens, _) = estimate_log(log);
    let state = budget.classify(total_tokens);
    if state == PressureState::Healthy && log.len() <= target_max_messages {
        return log.to_vec();
    }

    let target_tokens = budget.fraction_of_max(match state {
        PressureState::Critical => CRITICAL_TARGET_RATIO,
        PressureState::Approaching => APPROACHING_TARGET_RATIO,
        PressureState::Healthy => COUNT_TARGET_RATIO,
    });

    let root = log.iter().position(|m| m.role == MessageRole::System);
    let mut system_keep: Vec<usize> = root.into_iter().collect();
    let mut system_tokens: usize = root.map_or(0, |i| estimate(&log[i]));

    // File contexts, smallest first, newest first among equals.
    let mut files: Vec<(usize, usize)> = log
        .iter()
        .enumerate()
        .filter(|(i, m)| Some(*i) != root && is_file_context(m))
        .map(|(i, m)| (i, estimate(m)))
        .collect();
    files.sort_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)));
    let file_budget = (target_tokens as f64 * FILE_CONTEXT_SHARE) as usize;
    let mut file_tokens = 0;
    for (i, tokens) in files.into_iter().take(MAX_RETAINED_FILE_CONTEXTS) {
        if file_tokens + tokens > file_budget {
            break;
        }
        file_tokens += tokens;
        system_keep.push(i);
    }
    system_tokens += file_tokens;
    system_keep.sort_unstable();

    let others: Vec<usize> = (0..log.len())
        .filter(|&i| log[i].role != MessageRole::System)
        .collect();
    let remaining = target_tokens.saturating_sub(system_tokens);
    let mut kept: Vec<usize> = Vec::new();
    let mut used = 0;

    for unit in units_newest_first(log, &others) {
        let unit_tokens: usize = unit.iter().map(|&i| estimate(&log[i])).sum();
        if used + unit_tokens > remaining
            || system_keep.len() + kept.len() + unit.len() > target_max_messages
        {
            break;
        }
        used += unit_tokens;
        kept.extend(unit);
    }
    kept.sort_unstable();

    debug!(
        %state,
        before = log.len(),
        after = system_keep.len() + kept.len(),
        target_tokens,
        kept_tokens = system_tokens + used,
        "truncated conversation log"
    );

    system_keep
        .iter()
        .chain(kept.iter())
        .map(|&i| log[i].clone())
        .collect()
}

/// Group the non-system message indices into atomic units, newest first.
///
/// A run of tool messages belongs to the assistant message right before it.
/// Tool messages without such an assistant are dropped.
fn units_newest_first(log: &[Message], others: &[usize]) -> Vec<Vec<usize>> {
    let mut units = Vec::new();
    let mut pos = others.len();
    while pos > 0 {
        let end = pos;
        let mut start = pos - 1;
        if log[others[start]].role == MessageRole::Tool {
            while start > 0 && log[others[start - 1]].role == MessageRole::Tool {
                start -= 1;
            }
            if start > 0 && log[others[start - 1]].has_tool_calls() {
                start -= 1;
            } else {
                debug!(count = end - start, "dropping orphaned tool results");
                pos = start;
                continue;
            }
        }
        units.push(others[start..end].to_vec());
        pos = start;
    }
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolCall;
    use crate::context::file_context::file_context_message;
    use std::path::Path;

    fn group(id: &str) -> [Message; 2] {
        [
            Message::assistant_with_tool_calls("", vec![ToolCall::new(id, "read_file", "{}")]),
            Message::tool_result(id, "result ".repeat(20)),
        ]
    }

    #[test]
    fn healthy_short_log_is_unchanged() {
        let log = vec![
            Message::system("sys"),
            Message::user("hi"),
            Message::assistant_text("hello"),
        ];
        assert_eq!(truncate(&log, &ContextBudget::new(), 50), log);
    }

    #[test]
    fn count_trigger_keeps_newest_within_cap() {
        let mut log = vec![Message::system("sys")];
        for i in 0..10 {
            log.push(Message::user(format!("q{i}")));
            log.push(Message::assistant_text(format!("a{i}")));
        }
        let out = truncate(&log, &ContextBudget::new(), 5);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], log[0]);
        assert_eq!(out[1].text(), "q8");
        assert_eq!(out[4].text(), "a9");
    }

    #[test]
    fn tool_groups_are_never_split() {
        let mut log = vec![Message::system("sys"), Message::user("go")];
        log.extend(group("c1"));
        log.extend(group("c2"));
        log.push(Message::assistant_text("done"));
        // Cap of 4: root, "done" and the c2 group. The c1 group does not fit.
        let out = truncate(&log, &ContextBudget::new(), 4);
        assert_eq!(out.len(), 4);
        assert_eq!(out[1].tool_call_ids().collect::<Vec<_>>(), vec!["c2"]);
        assert_eq!(out[2].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(out[3].text(), "done");
    }

    #[test]
    fn stops_at_first_unit_that_does_not_fit() {
        let mut log = vec![Message::system("sys"), Message::user("old")];
        log.extend(group("c1"));
        log.push(Message::user("new"));
        // Cap 3: root + "new" fit; the group needs 2 more and stops the walk,
        // so "old" is not kept even though it would fit on its own.
        let out = truncate(&log, &ContextBudget::new(), 3);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].text(), "new");
    }

    #[test]
    fn orphaned_tool_results_are_dropped() {
        let log = vec![
            Message::system("sys"),
            Message::tool_result("ghost", "x"),
            Message::user("q"),
            Message::assistant_text("a"),
        ];
        let out = truncate(&log, &ContextBudget::new(), 3);
        assert!(out.iter().all(|m| m.role != MessageRole::Tool));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn pressure_trims_to_token_target() {
        let budget = ContextBudget::new().with_max_tokens(1000);
        let mut log = vec![Message::system("sys")];
        for _ in 0..10 {
            log.push(Message::user("u".repeat(400)));
        }
        // 10 x 100 tokens: critical. Target is 600 tokens.
        let out = truncate(&log, &budget, 50);
        assert_eq!(out.len(), 7);
        assert_eq!(out[0], log[0]);
        let (tokens, _) = estimate_log(&out);
        assert!(tokens <= 600);
    }

    #[test]
    fn file_contexts_ranked_small_then_recent() {
        let budget = ContextBudget::new().with_max_tokens(1000);
        let mut log = vec![Message::system("sys")];
        for (name, size) in [("a", 80), ("b", 40), ("c", 40), ("d", 40), ("e", 400)] {
            log.push(file_context_message(Path::new(name), &"f".repeat(size)));
        }
        for _ in 0..8 {
            log.push(Message::user("u".repeat(400)));
        }
        let out = truncate(&log, &budget, 50);
        let files: Vec<&str> = out
            .iter()
            .filter_map(crate::context::file_context::file_context_path)
            .collect();
        // Critical target 600, file share 150: three 40-char files fit.
        assert_eq!(files, vec!["b", "c", "d"]);
        assert_eq!(out[0].text(), "sys");
    }

    #[test]
    fn non_file_system_messages_are_dropped_under_pressure() {
        let budget = ContextBudget::new().with_max_tokens(100);
        let log = vec![
            Message::system("sys"),
            Message::system("note ".repeat(80)),
            Message::user("hi"),
        ];
        let out = truncate(&log, &budget, 50);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].text(), "hi");
    }

    #[test]
    fn truncation_is_deterministic() {
        let budget = ContextBudget::new().with_max_tokens(500);
        let mut log = vec![Message::system("sys")];
        for i in 0..20 {
            log.push(Message::user(format!("{i} {}", "x".repeat(100))));
        }
        assert_eq!(truncate(&log, &budget, 50), truncate(&log, &budget, 50));
    }
}
