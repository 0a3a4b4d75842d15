//! Slash-command parsing.
//!
//! Input starting with `/` is split on whitespace and matched against
//! [`COMMANDS`] by its leading tokens, longest match first, so `/git add`
//! and `/git` never shadow each other. Anything else is a chat message.

use quill::context::ContextUsage;
use std::fmt::Write as _;

/// A parsed line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Folder(Option<String>),
    GitInit,
    GitAdd(Vec<String>),
    GitCommit(Option<String>),
    GitBranch(String),
    GitStatus,
    GitInfo,
    Reasoner,
    ReasonerOnce,
    Clear,
    ClearContext,
    Context,
    Help,
    Exit,
    /// Recognized command missing a required argument; holds its usage line.
    Usage(&'static str),
    /// Slash-prefixed input that matches no command.
    Unknown(String),
    Chat(String),
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Add,
    Folder,
    GitInit,
    GitAdd,
    GitCommit,
    GitBranch,
    GitStatus,
    GitInfo,
    Reasoner,
    ReasonerOnce,
    Clear,
    ClearContext,
    Context,
    Help,
    Exit,
}

/// One entry of the command table.
pub struct CommandSpec {
    pub tokens: &'static [&'static str],
    pub usage: &'static str,
    pub help: &'static str,
    kind: Kind,
}

const fn spec(
    tokens: &'static [&'static str],
    usage: &'static str,
    help: &'static str,
    kind: Kind,
) -> CommandSpec {
    CommandSpec {
        tokens,
        usage,
        help,
        kind,
    }
}

pub const COMMANDS: &[CommandSpec] = &[
    spec(&["/add"], "/add <path>", "Add a file or directory to the conversation", Kind::Add),
    spec(&["/folder"], "/folder [path|reset]", "Show, change, or reset the base directory", Kind::Folder),
    spec(&["/git", "init"], "/git init", "Initialize a git repository", Kind::GitInit),
    spec(&["/git", "add"], "/git add <paths...|.>", "Stage files", Kind::GitAdd),
    spec(&["/git", "commit"], "/git commit [message]", "Commit staged changes", Kind::GitCommit),
    spec(&["/git", "branch"], "/git branch <name>", "Create or switch to a branch", Kind::GitBranch),
    spec(&["/git", "status"], "/git status", "Show repository status", Kind::GitStatus),
    spec(&["/git-info"], "/git-info", "Describe the git capabilities", Kind::GitInfo),
    spec(&["/reasoner"], "/reasoner", "Toggle between the default and reasoner model", Kind::Reasoner),
    spec(&["/r"], "/r", "Ask the reasoner model once", Kind::ReasonerOnce),
    spec(&["/clear-context"], "/clear-context", "Reset the conversation to the system prompt", Kind::ClearContext),
    spec(&["/clear"], "/clear", "Clear the screen", Kind::Clear),
    spec(&["/context"], "/context", "Show context window usage", Kind::Context),
    spec(&["/help"], "/help", "List commands", Kind::Help),
    spec(&["/exit"], "/exit", "Leave", Kind::Exit),
    spec(&["/quit"], "/quit", "Leave", Kind::Exit),
];

impl Command {
    pub fn parse(input: &str) -> Command {
        let trimmed = input.trim();
        if !trimmed.starts_with('/') {
            return Command::Chat(trimmed.to_string());
        }
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let first = tokens.first().map(|t| t.to_lowercase()).unwrap_or_default();
        let second = tokens.get(1).map(|t| t.to_lowercase());

        let matched = COMMANDS
            .iter()
            .filter(|c| match c.tokens {
                [cmd] => *cmd == first,
                [cmd, sub] => *cmd == first && second.as_deref() == Some(*sub),
                _ => false,
            })
            .max_by_key(|c| c.tokens.len());
        let Some(command) = matched else {
            return Command::Unknown(trimmed.to_string());
        };

        let rest = &tokens[command.tokens.len().min(tokens.len())..];
        let joined = (!rest.is_empty()).then(|| rest.join(" "));
        match command.kind {
            Kind::Add => match joined {
                Some(path) => Command::Add(path),
                None => Command::Usage(command.usage),
            },
            Kind::Folder => Command::Folder(joined),
            Kind::GitInit => Command::GitInit,
            Kind::GitAdd if rest.is_empty() => Command::Usage(command.usage),
            Kind::GitAdd => Command::GitAdd(rest.iter().map(|s| s.to_string()).collect()),
            Kind::GitCommit => Command::GitCommit(joined),
            Kind::GitBranch => match rest {
                [name] => Command::GitBranch(name.to_string()),
                _ => Command::Usage(command.usage),
            },
            Kind::GitStatus => Command::GitStatus,
            Kind::GitInfo => Command::GitInfo,
            Kind::Reasoner => Command::Reasoner,
            Kind::ReasonerOnce => Command::ReasonerOnce,
            Kind::Clear => Command::Clear,
            Kind::ClearContext => Command::ClearContext,
            Kind::Context => Command::Context,
            Kind::Help => Command::Help,
            Kind::Exit => Command::Exit,
        }
    }
}

/// The `/help` listing.
pub fn help_text() -> String {
    let width = COMMANDS.iter().map(|c| c.usage.len()).max().unwrap_or(0);
    let mut out = String::from("Commands:\n");
    for c in COMMANDS {
        let _ = writeln!(out, "  {:<width$}  {}", c.usage, c.help);
    }
    out.push_str("Anything else is sent to the assistant.");
    out
}

/// The `/git-info` text.
pub fn git_info_text() -> &'static str {
    "\
The assistant can use these git tools:
  git_init           initialize a repository
  git_add            stage files
  git_commit         commit staged changes
  git_create_branch  create or switch to a branch
  git_status         show repository status

Just describe what you want, for example:
  \"Initialize a repository and commit everything\"
  \"Create a branch called feature/login\"
Files the assistant writes are staged automatically when auto-staging is on."
}

/// The `/context` report.
pub fn context_report(usage: &ContextUsage, max_context_files: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Context usage");
    let _ = writeln!(out, "  Messages       {}", usage.total_messages);
    let _ = writeln!(
        out,
        "  Tokens (est.)  {} / {}",
        usage.estimated_tokens, usage.max_tokens
    );
    let _ = writeln!(out, "  Usage          {:.1}%", usage.usage_percent());
    let _ = writeln!(
        out,
        "  File contexts  {} (max {max_context_files})",
        usage.file_contexts
    );
    let _ = writeln!(out, "  Health         {}", usage.state);
    if !usage.breakdown.is_empty() {
        let _ = writeln!(out, "By role");
        for (role, tokens) in &usage.breakdown {
            let _ = writeln!(out, "  {:<13}  {tokens}", role.to_string());
        }
    }
    out.trim_end().to_string()
}
