//! The interactive loop: reads operator lines, dispatches slash commands,
//! and runs assistant turns.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use quill::agent::{Session, TurnOutcome, TurnRunner};
use quill::api::CompletionService;
use quill::context::AddOutcome;
use quill::fuzzy::FileFinder;
use quill::tools::{Confirm, ToolSet};
use quill::workspace::{Exclusions, Workspace};
use quill::QuillError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::commands::{self, Command};
use crate::config::CodeConfig;
use crate::tools::git::{StatusSummary, create_gitignore, format_status};
use crate::tools::GitContext;
use crate::ui::{self, ConsoleObserver};

// ── Directory ingestion ─────────────────────────────────────────────

/// What `/add <dir>` did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirAddReport {
    pub added: Vec<String>,
    /// `(path, reason)` for every file that was not added.
    pub skipped: Vec<(String, String)>,
    /// The file-count limit stopped the walk early.
    pub limit_reached: bool,
}

/// Limits applied by [`add_directory`].
#[derive(Debug, Clone, Copy)]
pub struct DirAddLimits {
    pub max_files: usize,
    pub max_file_size: u64,
}

/// Add every eligible file under `dir` as a file context. Hidden and
/// excluded entries are pruned by the walk; binaries, oversized files, and
/// files the context cannot hold are skipped with a reason.
pub fn add_directory(
    session: &mut Session,
    workspace: &Workspace,
    dir: &Path,
    exclusions: &Exclusions,
    limits: DirAddLimits,
) -> Result<DirAddReport, QuillError> {
    let mut report = DirAddReport::default();
    'walk: for (_, files) in workspace.walk(dir, exclusions)? {
        for file in files {
            if report.added.len() >= limits.max_files {
                report.limit_reached = true;
                break 'walk;
            }
            let rel = workspace.display_path(&file);
            match workspace.is_binary(&file) {
                Ok(true) => {
                    report.skipped.push((rel, "binary".into()));
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    report.skipped.push((rel, e.to_string()));
                    continue;
                }
            }
            let content = match workspace.read_text_limited(&file, limits.max_file_size) {
                Ok(c) => c,
                Err(QuillError::SizeLimit { .. }) => {
                    report.skipped.push((rel, "too large".into()));
                    continue;
                }
                Err(e) => {
                    report.skipped.push((rel, e.to_string()));
                    continue;
                }
            };
            match session.add_file_context(&file, &content) {
                AddOutcome::Inserted { .. } => report.added.push(rel),
                AddOutcome::Rejected { .. } => {
                    report.skipped.push((rel, "too large for context".into()))
                }
                AddOutcome::Deferred => {
                    report.skipped.push((rel, "tool call in progress".into()))
                }
            }
        }
    }
    debug!(
        added = report.added.len(),
        skipped = report.skipped.len(),
        limit_reached = report.limit_reached,
        "directory added"
    );
    Ok(report)
}

/// Resolve `/folder <arg>` to a new base directory. `reset` means the
/// process working directory; relative paths are taken against it too.
pub fn resolve_folder(arg: &str) -> Result<PathBuf, String> {
    let cwd = std::env::current_dir().map_err(|e| format!("cannot read current directory: {e}"))?;
    if arg.eq_ignore_ascii_case("reset") {
        return Ok(cwd);
    }
    let path = PathBuf::from(arg);
    let path = if path.is_absolute() { path } else { cwd.join(path) };
    let path = quill::workspace::normalize_lexically(&path);
    if !path.exists() {
        return Err(format!("folder does not exist: {}", path.display()));
    }
    if !path.is_dir() {
        return Err(format!("not a directory: {}", path.display()));
    }
    Workspace::probe_writable(&path).map_err(|e| format!("folder is not writable: {e}"))?;
    Ok(path)
}

/// Resolves once Ctrl-C is pressed. Never resolves if the handler cannot be
/// installed.
async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ── Repl ────────────────────────────────────────────────────────────

/// One interactive session.
pub struct Repl {
    config: CodeConfig,
    service: Box<dyn CompletionService>,
    confirm: Arc<dyn Confirm>,
    workspace: Workspace,
    git: Arc<GitContext>,
    tools: ToolSet,
    session: Session,
}

impl Repl {
    pub fn new(
        config: CodeConfig,
        service: Box<dyn CompletionService>,
        confirm: Arc<dyn Confirm>,
        base: &Path,
    ) -> Self {
        let workspace = Workspace::new(base);
        let git = Arc::new(GitContext::detect(workspace.base(), config.git_auto_stage));
        let tools = config.build_tool_set(&workspace, git.clone(), confirm.clone());
        let session = config.session(workspace.base());
        Self {
            config,
            service,
            confirm,
            workspace,
            git,
            tools,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run a single prompt without the interactive loop.
    pub async fn one_shot(&mut self, prompt: &str) -> bool {
        self.chat(prompt, false).await
    }

    /// Read lines from stdin until `/exit` or end of input.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.banner();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("{} ", style("quill>").blue().bold());
            let _ = std::io::Write::flush(&mut std::io::stdout());
            let Some(line) = lines.next_line().await? else {
                println!();
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            if self.handle(&line).await.is_break() {
                break;
            }
        }
        ui::note("Goodbye.");
        Ok(())
    }

    fn banner(&self) {
        println!(
            "{} {}",
            style("quill").cyan().bold(),
            style(format!("({})", self.active_model())).dim()
        );
        ui::note(format!("Base directory: {}", self.workspace.base().display()));
        if self.git.is_enabled() {
            ui::note("Git repository detected.");
        } else if !self.git.is_available() {
            ui::note("git not found; git features are disabled.");
        }
        ui::note("Type /help for commands.");
    }

    fn active_model(&self) -> String {
        self.session
            .models()
            .map(|m| m.active().to_string())
            .unwrap_or_else(|| self.config.model.clone())
    }

    /// Dispatch one line of input.
    pub async fn handle(&mut self, line: &str) -> ControlFlow<()> {
        match Command::parse(line) {
            Command::Chat(text) => {
                self.chat(&text, false).await;
            }
            Command::Add(path) => self.add(&path),
            Command::Folder(arg) => self.folder(arg.as_deref()),
            Command::GitInit => self.git_init().await,
            Command::GitAdd(paths) => self.git_add(&paths).await,
            Command::GitCommit(message) => self.git_commit(message).await,
            Command::GitBranch(name) => self.git_branch(&name).await,
            Command::GitStatus => self.git_status().await,
            Command::GitInfo => println!("{}", commands::git_info_text()),
            Command::Reasoner => self.toggle_reasoner(),
            Command::ReasonerOnce => self.reasoner_once().await,
            Command::Clear => ui::clear_screen(),
            Command::ClearContext => self.clear_context(),
            Command::Context => self.show_context(),
            Command::Help => println!("{}", commands::help_text()),
            Command::Exit => return ControlFlow::Break(()),
            Command::Usage(usage) => ui::warning(format!("Usage: {usage}")),
            Command::Unknown(input) => {
                ui::warning(format!("Unknown command: {input}. Type /help for commands."))
            }
        }
        ControlFlow::Continue(())
    }

    // ── Turns ───────────────────────────────────────────────────────

    /// Run a turn. Returns `false` when the completion service failed.
    async fn chat(&mut self, input: &str, reasoner: bool) -> bool {
        let model = match (reasoner, self.session.models()) {
            (true, _) => self.config.reasoner_model.clone(),
            (false, Some(models)) => models.active().to_string(),
            (false, None) => self.config.model.clone(),
        };
        let is_reasoner = model == self.config.reasoner_model;
        let params = self.config.request_params(&model);
        let runner = TurnRunner::new(self.service.as_ref(), &self.tools, params);
        let mut observer = ConsoleObserver::new(is_reasoner);
        info!(%model, "starting turn");
        let ok = match runner
            .run(&mut self.session, input, &mut observer, ctrl_c())
            .await
        {
            Ok(TurnOutcome::Completed { .. }) => true,
            Ok(TurnOutcome::RoundLimit { rounds }) => {
                ui::warning(format!(
                    "Stopped after {rounds} tool rounds. Ask again to continue."
                ));
                true
            }
            Ok(TurnOutcome::Cancelled { .. }) => {
                println!();
                ui::warning("Cancelled.");
                true
            }
            Err(e) => {
                warn!(error = %e, "turn failed");
                ui::failure(format!("API error: {e}"));
                false
            }
        };
        let usage = self.session.usage();
        if usage.critical_limit() {
            ui::warning(format!(
                "Context is {:.0}% full. Consider /clear-context.",
                usage.usage_percent()
            ));
        } else if usage.approaching_limit() {
            ui::note(format!("Context is {:.0}% full.", usage.usage_percent()));
        }
        ok
    }

    async fn reasoner_once(&mut self) {
        let Some(prompt) = ui::prompt_line("Reasoning prompt") else {
            ui::warning("Cancelled.");
            return;
        };
        if prompt.is_empty() {
            ui::warning("No input provided. Aborting.");
            return;
        }
        self.chat(&prompt, true).await;
    }

    fn toggle_reasoner(&mut self) {
        match self.session.models_mut() {
            Some(models) => {
                let active = models.toggle().to_string();
                ui::success(format!("Switched to {active}"));
            }
            None => ui::warning("No model selection configured."),
        }
    }

    // ── Context ─────────────────────────────────────────────────────

    fn add(&mut self, path: &str) {
        let target = match self.workspace.resolve(path) {
            Ok(p) => p,
            Err(e) => {
                ui::failure(e);
                return;
            }
        };
        if target.is_dir() {
            self.add_dir(&target);
            return;
        }
        let file = if target.is_file() {
            target
        } else {
            let finder = FileFinder::new(self.config.exclusions())
                .with_min_score(self.config.min_fuzzy_file_score);
            match finder.find(self.workspace.base(), path) {
                Some(found) => {
                    let rel = self.workspace.display_path(&found);
                    if !self.confirm.confirm(&format!("Did you mean '{rel}'?")) {
                        ui::note("Not added.");
                        return;
                    }
                    found
                }
                None => {
                    ui::failure(format!("Path does not exist: '{path}'"));
                    if finder.is_available() {
                        ui::note("Tip: no similar file names were found either.");
                    }
                    return;
                }
            }
        };
        self.add_file(&file);
    }

    fn add_file(&mut self, file: &Path) {
        let rel = self.workspace.display_path(file);
        match self.workspace.is_binary(file) {
            Ok(true) => {
                ui::failure(format!("'{rel}' looks like a binary file; not added"));
                return;
            }
            Ok(false) => {}
            Err(e) => {
                ui::failure(e);
                return;
            }
        }
        let content = match self
            .workspace
            .read_text_limited(file, self.config.max_file_size_read)
        {
            Ok(c) => c,
            Err(e) => {
                ui::failure(e);
                return;
            }
        };
        match self.session.add_file_context(file, &content) {
            AddOutcome::Inserted { evicted } => {
                ui::success(format!("Added '{rel}' to the conversation"));
                if !evicted.is_empty() {
                    ui::note(format!("Evicted: {}", evicted.join(", ")));
                }
            }
            AddOutcome::Rejected {
                estimated_tokens,
                limit,
            } => ui::failure(format!(
                "'{rel}' is too large for the context (~{estimated_tokens} tokens, limit {limit})"
            )),
            AddOutcome::Deferred => ui::warning("A tool call is in progress; try again."),
        }
    }

    fn add_dir(&mut self, dir: &Path) {
        let limits = DirAddLimits {
            max_files: self.config.max_files_in_add_dir,
            max_file_size: self.config.max_file_size_in_add_dir,
        };
        let exclusions = self.config.exclusions();
        match add_directory(&mut self.session, &self.workspace, dir, &exclusions, limits) {
            Ok(report) => {
                if report.added.is_empty() {
                    ui::warning("No files added.");
                } else {
                    ui::success(format!("Added {} file(s):", report.added.len()));
                    for rel in &report.added {
                        ui::note(format!("  {rel}"));
                    }
                }
                if report.limit_reached {
                    ui::warning(format!("Max files ({}) reached", limits.max_files));
                }
                if !report.skipped.is_empty() {
                    ui::warning(format!("Skipped {} file(s):", report.skipped.len()));
                    for (rel, reason) in &report.skipped {
                        ui::note(format!("  {rel} ({reason})"));
                    }
                }
            }
            Err(e) => ui::failure(e),
        }
    }

    fn folder(&mut self, arg: Option<&str>) {
        let Some(arg) = arg else {
            println!("Current base directory: {}", self.workspace.base().display());
            return;
        };
        let path = match resolve_folder(arg) {
            Ok(p) => p,
            Err(e) => {
                ui::failure(e);
                return;
            }
        };
        self.set_base(&path);
        ui::success(format!("Base directory set to {}", self.workspace.base().display()));
    }

    /// Point the workspace, git collaborator, tools, and system prompt at a
    /// new base directory. The conversation is kept.
    fn set_base(&mut self, path: &Path) {
        self.workspace = Workspace::new(path);
        self.git = Arc::new(GitContext::detect(
            self.workspace.base(),
            self.config.git_auto_stage,
        ));
        self.tools =
            self.config
                .build_tool_set(&self.workspace, self.git.clone(), self.confirm.clone());
        self.session
            .set_system_prompt(crate::prompt::coding_system_prompt(self.workspace.base()));
        info!(base = %self.workspace.base().display(), "base directory changed");
    }

    fn clear_context(&mut self) {
        let messages = self.session.len();
        let files = self.session.file_context_count();
        println!("Conversation has {messages} message(s), {files} file context(s).");
        if self.confirm.confirm("Clear the conversation (the system prompt is kept)?") {
            self.session.clear_context();
            ui::success("Context cleared.");
        } else {
            ui::note("Kept.");
        }
    }

    fn show_context(&self) {
        let usage = self.session.usage();
        println!(
            "{}",
            commands::context_report(&usage, self.config.context.max_context_files)
        );
    }

    // ── Git ─────────────────────────────────────────────────────────

    fn git_ready(&self) -> bool {
        if !self.git.is_available() {
            ui::failure("git is not available.");
            false
        } else if !self.git.is_enabled() {
            ui::warning("Not a git repository. Run /git init first.");
            false
        } else {
            true
        }
    }

    fn git_failed(&self, err: QuillError) {
        self.git.observe(&err);
        ui::failure(err);
    }

    async fn git_init(&mut self) {
        if !self.git.is_available() {
            ui::failure("git is not available.");
            return;
        }
        let repo = self.git.repo();
        if repo.is_repo() {
            self.git.set_enabled(true);
            ui::note("Git repository already exists; git features enabled.");
            return;
        }
        if let Err(e) = repo.init().await {
            self.git_failed(e);
            return;
        }
        self.git.set_enabled(true);
        let branch = repo.head_branch().await;
        ui::success(format!("Initialized git repository (branch: {branch})"));

        let base = self.workspace.base().to_path_buf();
        if !base.join(".gitignore").exists() && ui::confirm_default_yes("Create a .gitignore?") {
            let custom: Vec<String> = ui::prompt_line("Extra patterns (comma-separated, blank for none)")
                .unwrap_or_default()
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
            match create_gitignore(&base, &custom) {
                Ok(Some(n)) => ui::success(format!("Created .gitignore ({n} lines)")),
                Ok(None) => ui::note(".gitignore already exists."),
                Err(e) => ui::failure(e),
            }
        }
        if ui::confirm_default_yes("Stage all files and make an initial commit?") {
            if let Err(e) = repo.add_all().await {
                self.git_failed(e);
                return;
            }
            match repo.commit("Initial commit").await {
                Ok(_) => ui::success("Initial commit created."),
                Err(e) => self.git_failed(e),
            }
        }
    }

    async fn git_add(&mut self, paths: &[String]) {
        if !self.git_ready() {
            return;
        }
        let repo = self.git.repo();
        let result = if paths.iter().any(|p| p == ".") {
            repo.add_all().await
        } else {
            let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
            repo.add(&refs).await
        };
        match result {
            Ok(()) => ui::success(format!("Staged: {}", paths.join(", "))),
            Err(e) => self.git_failed(e),
        }
    }

    async fn git_commit(&mut self, message: Option<String>) {
        if !self.git_ready() {
            return;
        }
        let repo = self.git.repo();
        match repo.has_staged_changes().await {
            Ok(true) => {}
            Ok(false) => {
                let entries = match repo.status().await {
                    Ok(entries) => entries,
                    Err(e) => return self.git_failed(e),
                };
                let summary = StatusSummary::of(&entries);
                if !summary.unstaged && !summary.untracked {
                    ui::note("Working tree is clean; nothing to commit.");
                    return;
                }
                if !ui::confirm_default_yes("Nothing is staged. Stage all changes?") {
                    ui::note("Nothing committed.");
                    return;
                }
                if let Err(e) = repo.add_all().await {
                    return self.git_failed(e);
                }
            }
            Err(e) => return self.git_failed(e),
        }
        let message = match message {
            Some(m) => m,
            None => match ui::prompt_line("Commit message") {
                Some(m) if !m.is_empty() => m,
                _ => {
                    ui::warning("Commit aborted: empty message.");
                    return;
                }
            },
        };
        match repo.commit(&message).await {
            Ok(_) => match repo.last_commit().await {
                Some(line) => ui::success(format!("Committed: {line}")),
                None => ui::success("Committed."),
            },
            Err(e) => self.git_failed(e),
        }
    }

    async fn git_branch(&mut self, name: &str) {
        if !self.git_ready() {
            return;
        }
        let repo = self.git.repo();
        match repo.branch_exists(name).await {
            Ok(true) => {
                if repo.current_branch().await.as_deref() == Some(name) {
                    ui::note(format!("Already on '{name}'."));
                    return;
                }
                if !ui::confirm_default_yes(&format!("Branch '{name}' exists. Switch to it?")) {
                    return;
                }
                match repo.checkout(name).await {
                    Ok(()) => ui::success(format!("Switched to '{name}'")),
                    Err(e) => self.git_failed(e),
                }
            }
            Ok(false) => match repo.create_branch(name).await {
                Ok(()) => ui::success(format!("Created and switched to '{name}'")),
                Err(e) => self.git_failed(e),
            },
            Err(e) => self.git_failed(e),
        }
    }

    async fn git_status(&mut self) {
        if !self.git_ready() {
            return;
        }
        let repo = self.git.repo();
        match repo.status().await {
            Ok(entries) => {
                let branch = repo.current_branch().await;
                println!("{}", format_status(branch.as_deref(), &entries));
            }
            Err(e) => self.git_failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill::context::ContextConfig;
    use std::fs;

    fn limits(max_files: usize) -> DirAddLimits {
        DirAddLimits {
            max_files,
            max_file_size: 1_000,
        }
    }

    #[test]
    fn directory_add_skips_hidden_binary_and_large() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        fs::write(dir.path().join("a.rs"), "fn a() {}").unwrap();
        fs::write(dir.path().join("blob.dat"), [0u8, 1, 2, 3]).unwrap();
        fs::write(dir.path().join("big.txt"), "x".repeat(2_000)).unwrap();
        fs::write(dir.path().join(".hidden"), "secret").unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/dep.js"), "x").unwrap();

        let mut session = Session::new("sys", ContextConfig::default());
        let report = add_directory(
            &mut session,
            &ws,
            dir.path(),
            &Exclusions::default(),
            limits(10),
        )
        .unwrap();

        assert_eq!(report.added, vec!["a.rs".to_string()]);
        assert!(report.skipped.contains(&("blob.dat".into(), "binary".into())));
        assert!(report.skipped.contains(&("big.txt".into(), "too large".into())));
        assert_eq!(report.skipped.len(), 2);
        assert!(!report.limit_reached);
        assert_eq!(session.file_context_count(), 1);
    }

    #[test]
    fn directory_add_stops_at_max_files() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        let mut session = Session::new("sys", ContextConfig::default());
        let report = add_directory(
            &mut session,
            &ws,
            dir.path(),
            &Exclusions::default(),
            limits(2),
        )
        .unwrap();
        assert_eq!(report.added, vec!["a.txt".to_string(), "b.txt".to_string()]);
        assert!(report.limit_reached);
    }

    #[test]
    fn folder_must_exist_and_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "x").unwrap();
        assert_eq!(resolve_folder(dir.path().to_str().unwrap()).unwrap(), dir.path());
        assert!(resolve_folder(file.to_str().unwrap()).unwrap_err().starts_with("not a directory"));
        let missing = dir.path().join("missing");
        assert!(
            resolve_folder(missing.to_str().unwrap())
                .unwrap_err()
                .starts_with("folder does not exist")
        );
        assert_eq!(resolve_folder("reset").unwrap(), std::env::current_dir().unwrap());
    }
}
