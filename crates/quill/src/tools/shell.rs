//! `run_shell`: run a command in the detected shell.
//!
//! The shell is detected once with `which`: bash, then sh, then PowerShell.
//! Commands run in the base directory with a timeout. Destructive patterns
//! are refused before anything is spawned.

use super::confirm::{AutoConfirm, Confirm};
use super::core::{DEFAULT_MAX_RESULT_BYTES, DisabledTool, Tool, ToolFuture, ToolSet, parse_tool_args, truncate_result};
use super::names;
use super::spec::ToolSpec;
use crate::ToolDef;
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Substrings (lowercased) that block a command.
pub const DEFAULT_BLOCKED_COMMANDS: &[&str] = &["rm -rf /", "mkfs", "> /dev/", ":(){", "format c:"];

pub const DEFAULT_SHELL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize, JsonSchema)]
pub struct RunShellArgs {
    /// Command to run (e.g. 'cargo test', 'ls -la src').
    pub command: String,
}

/// A shell found on `PATH`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellKind {
    Bash(PathBuf),
    Sh(PathBuf),
    PowerShell(PathBuf),
}

impl ShellKind {
    /// First available shell in preference order.
    pub fn detect() -> Option<Self> {
        if let Ok(p) = which::which("bash") {
            return Some(ShellKind::Bash(p));
        }
        if let Ok(p) = which::which("sh") {
            return Some(ShellKind::Sh(p));
        }
        ["pwsh", "powershell"]
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(ShellKind::PowerShell)
    }

    /// Every shell on `PATH`, for the system prompt.
    pub fn available() -> Vec<&'static str> {
        ["bash", "sh", "zsh", "pwsh", "powershell"]
            .into_iter()
            .filter(|name| which::which(name).is_ok())
            .collect()
    }

    pub fn label(&self) -> &'static str {
        match self {
            ShellKind::Bash(_) => "bash",
            ShellKind::Sh(_) => "sh",
            ShellKind::PowerShell(_) => "powershell",
        }
    }

    fn command(&self, line: &str) -> Command {
        let (program, flags): (&Path, &[&str]) = match self {
            ShellKind::Bash(p) | ShellKind::Sh(p) => (p, &["-c"]),
            ShellKind::PowerShell(p) => (p, &["-NoProfile", "-NonInteractive", "-Command"]),
        };
        let mut cmd = Command::new(program);
        cmd.args(flags).arg(line);
        cmd
    }
}

/// Run a shell command in a working directory.
pub struct RunShell {
    shell: ShellKind,
    workdir: PathBuf,
    blocked_commands: Vec<String>,
    timeout: Duration,
    max_result_bytes: usize,
    confirm: Arc<dyn Confirm>,
    unavailable: AtomicBool,
}

impl RunShell {
    pub fn new(shell: ShellKind, workdir: impl Into<PathBuf>) -> Self {
        Self {
            shell,
            workdir: workdir.into(),
            blocked_commands: DEFAULT_BLOCKED_COMMANDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            timeout: DEFAULT_SHELL_TIMEOUT,
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            confirm: Arc::new(AutoConfirm(true)),
            unavailable: AtomicBool::new(false),
        }
    }

    /// `None` when no supported shell is installed.
    pub fn detect(workdir: impl Into<PathBuf>) -> Option<Self> {
        ShellKind::detect().map(|shell| Self::new(shell, workdir))
    }

    /// Add a blocked command pattern (lowercased substring match).
    pub fn block_command(mut self, pattern: impl Into<String>) -> Self {
        self.blocked_commands.push(pattern.into().to_lowercase());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    /// Asked before each command runs.
    pub fn confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn shell(&self) -> &ShellKind {
        &self.shell
    }

    async fn run(&self, line: &str) -> String {
        if self.unavailable.load(Ordering::Relaxed) {
            return format!("Error: {} is unavailable for this session", self.shell.label());
        }
        let lower = line.to_lowercase();
        if self.blocked_commands.iter().any(|pat| lower.contains(pat)) {
            warn!(command = line, "blocked shell command");
            return "Error: potentially destructive command blocked".to_string();
        }
        if !self.confirm.confirm(&format!("Run shell command: {line}?")) {
            return "Error: command cancelled by user".to_string();
        }

        info!(shell = self.shell.label(), command = line, "running shell command");
        let mut cmd = self.shell.command(line);
        cmd.current_dir(&self.workdir).kill_on_drop(true);
        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => format_output(output),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                self.unavailable.store(true, Ordering::Relaxed);
                warn!(shell = self.shell.label(), "shell disappeared; disabling run_shell");
                format!("Error: {} is unavailable: {e}", self.shell.label())
            }
            Ok(Err(e)) => format!("Error: failed to run command: {e}"),
            Err(_) => format!(
                "Error: command timed out after {}s",
                self.timeout.as_secs()
            ),
        }
    }
}

fn format_output(output: std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.status.success() {
        if stderr.is_empty() {
            stdout.into_owned()
        } else {
            format!("{stdout}\n[stderr]\n{stderr}")
        }
    } else {
        format!("Command failed ({}):\n{stdout}\n{stderr}", output.status)
    }
}

/// Definition shared by the live and disabled tool.
pub fn run_shell_definition() -> ToolDef {
    ToolSpec::builder(names::RUN_SHELL)
        .purpose("Run a shell command in the base directory and return its output")
        .when_to_use("For builds, tests, listings, and other operations no file tool covers")
        .when_not_to_use(
            "To read, create, or edit files; use the file tools. For git; use the git tools",
        )
        .parameters_for::<RunShellArgs>()
        .example("run_shell(command='cargo test')", "Returns stdout, plus stderr if any")
        .output_format("Command stdout, a [stderr] section if non-empty, or a failure status")
        .to_tool_def()
}

impl Tool for RunShell {
    fn definition(&self) -> ToolDef {
        run_shell_definition()
    }

    fn is_mutation(&self) -> bool {
        true
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<RunShellArgs>(arguments);
        Box::pin(async move {
            match parsed {
                Ok(args) if args.command.trim().is_empty() => {
                    "Error: 'command' must not be empty".to_string()
                }
                Ok(args) => truncate_result(self.run(&args.command).await, self.max_result_bytes),
                Err(e) => e,
            }
        })
    }
}

impl ToolSet {
    /// Register `run_shell`, or a disabled stand-in when no shell was found.
    pub fn with_shell_tool(self, shell: Option<RunShell>) -> Self {
        match shell {
            Some(shell) => self.with(shell),
            None => self.with(DisabledTool::new(
                run_shell_definition(),
                "no supported shell (bash, sh, PowerShell) was found on this system",
            )),
        }
    }
}
