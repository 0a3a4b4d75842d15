//! Terminal presentation: prompts, confirmations, and streamed turn output.

use std::io::Write;

use console::{Emoji, Term, style};
use dialoguer::{Confirm as ConfirmPrompt, Input};
use quill::UsageInfo;
use quill::agent::TurnObserver;
use quill::tools::Confirm;

pub static ASSISTANT: Emoji<'_, '_> = Emoji("🤖 ", "");
pub static REASONER: Emoji<'_, '_> = Emoji("🧠 ", "");
pub static TOOL: Emoji<'_, '_> = Emoji("⚡ ", "> ");
pub static OK: Emoji<'_, '_> = Emoji("✓ ", "ok ");
pub static FAIL: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Answers confirmations with an interactive yes/no prompt on stderr.
/// Anything other than an explicit yes (including a closed terminal)
/// counts as no.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialoguerConfirm;

impl Confirm for DialoguerConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        ConfirmPrompt::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// Ask `question` with a default of yes.
pub fn confirm_default_yes(question: &str) -> bool {
    ConfirmPrompt::new()
        .with_prompt(question)
        .default(true)
        .interact()
        .unwrap_or(false)
}

/// Read one line of free text. `None` when the operator aborts.
pub fn prompt_line(question: &str) -> Option<String> {
    Input::<String>::new()
        .with_prompt(question)
        .allow_empty(true)
        .interact_text()
        .ok()
        .map(|s| s.trim().to_string())
}

pub fn success(msg: impl std::fmt::Display) {
    println!("{}{}", OK, style(msg).green());
}

pub fn failure(msg: impl std::fmt::Display) {
    println!("{}{}", FAIL, style(msg).red());
}

pub fn warning(msg: impl std::fmt::Display) {
    println!("{}", style(msg).yellow());
}

pub fn note(msg: impl std::fmt::Display) {
    println!("{}", style(msg).dim());
}

pub fn clear_screen() {
    // Not a terminal: nothing to clear.
    let _ = Term::stdout().clear_screen();
}

/// Streams a turn to stdout. Reasoning is shown dimmed, tool calls and
/// their outcomes on their own lines.
pub struct ConsoleObserver {
    label: String,
    in_text: bool,
    in_reasoning: bool,
    show_usage: bool,
}

impl ConsoleObserver {
    pub fn new(reasoner: bool) -> Self {
        let label = if reasoner {
            format!("{}{}", REASONER, style("Reasoner:").magenta().bold())
        } else {
            format!("{}{}", ASSISTANT, style("Assistant:").cyan().bold())
        };
        Self {
            label,
            in_text: false,
            in_reasoning: false,
            show_usage: false,
        }
    }

    pub fn show_usage(mut self, show: bool) -> Self {
        self.show_usage = show;
        self
    }

    fn end_line(&mut self) {
        if self.in_text || self.in_reasoning {
            println!();
        }
        self.in_text = false;
        self.in_reasoning = false;
    }
}

impl TurnObserver for ConsoleObserver {
    fn on_text_delta(&mut self, delta: &str) {
        // Some reasoning models inline their thinking tags in the text.
        let delta = delta.replace("<think>", "").replace("</think>", "");
        if self.in_reasoning {
            println!();
            self.in_reasoning = false;
        }
        if !self.in_text {
            print!("{} ", self.label);
            self.in_text = true;
        }
        print!("{delta}");
        let _ = std::io::stdout().flush();
    }

    fn on_reasoning_delta(&mut self, delta: &str) {
        if !self.in_reasoning {
            print!("{}", style("thinking: ").dim().italic());
            self.in_reasoning = true;
        }
        print!("{}", style(delta).dim());
        let _ = std::io::stdout().flush();
    }

    fn on_response(&mut self, _round: usize, _text: &str) {
        self.end_line();
    }

    fn on_tool_call(&mut self, name: &str, _arguments: &str) {
        self.end_line();
        println!("{}{}", TOOL, style(name).yellow().bold());
    }

    fn on_tool_result(&mut self, name: &str, result: &str) {
        if result.starts_with("Error") {
            let first = result.lines().next().unwrap_or_default();
            println!("  {}{} {}", FAIL, style(name).red(), style(first).dim());
        } else {
            println!("  {}{}", OK, style(name).green());
        }
    }

    fn on_dropped_tool_calls(&mut self, count: usize) {
        self.end_line();
        warning(format!("{count} malformed tool call(s) ignored"));
    }

    fn on_usage(&mut self, usage: &UsageInfo) {
        if self.show_usage
            && let Some(total) = usage.total_tokens
        {
            note(format!("[{total} tokens]"));
        }
    }
}
