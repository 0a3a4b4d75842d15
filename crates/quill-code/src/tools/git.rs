//! Git collaborator and the git tools.
//!
//! | Tool | Name | Purpose |
//! |------|------|---------|
//! | [`GitInit`] | `git_init` | Initialize a repository in the base directory |
//! | [`GitAdd`] | `git_add` | Stage files |
//! | [`GitCommit`] | `git_commit` | Commit staged changes |
//! | [`GitCreateBranch`] | `git_create_branch` | Create and switch to a branch |
//! | [`GitStatus`] | `git_status` | Porcelain status summary |
//!
//! All tools share one [`GitContext`]. When the `git` binary is missing the
//! context is marked unavailable and every tool answers with an error for
//! the rest of the session.

use futures::future::BoxFuture;
use quill::QuillError;
use quill::ToolDef;
use quill::tools::names;
use quill::tools::{Tool, ToolFuture, ToolSpec, WriteHook, parse_tool_args};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::Command;
use tracing::{debug, info, warn};

const GIT: &str = "git";

// ── Porcelain status ────────────────────────────────────────────────

/// One line of `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Two-character status code, e.g. `" M"`, `"A "`, `"??"`.
    pub code: String,
    pub path: String,
}

impl StatusEntry {
    pub fn is_untracked(&self) -> bool {
        self.code == "??"
    }

    pub fn is_unstaged(&self) -> bool {
        !self.is_untracked() && self.code.starts_with(' ')
    }

    pub fn is_staged(&self) -> bool {
        !self.is_untracked() && !self.is_unstaged()
    }

    pub fn description(&self) -> &'static str {
        match self.code.as_str() {
            " M" => "Mod (unstaged)",
            "MM" => "Mod (staged&un)",
            " A" => "Add (unstaged)",
            "AM" => "Add (staged&mod)",
            "AD" => "Add (staged&del)",
            " D" => "Del (unstaged)",
            "??" => "Untracked",
            "M " => "Mod (staged)",
            "A " => "Add (staged)",
            "D " => "Del (staged)",
            "R " => "Ren (staged)",
            "C " => "Cop (staged)",
            "U " => "Unmerged",
            _ => "Unknown",
        }
    }
}

/// Parse porcelain output. Accepts the standard `"XY path"` form and the
/// shortened `"X path"` form some wrappers produce.
pub fn parse_porcelain(output: &str) -> Vec<StatusEntry> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_porcelain_line)
        .collect()
}

fn parse_porcelain_line(line: &str) -> Option<StatusEntry> {
    let bytes = line.as_bytes();
    if bytes.len() >= 4 && bytes[2] == b' ' && bytes[3] != b' ' {
        return Some(StatusEntry {
            code: line.get(..2)?.to_string(),
            path: line.get(3..)?.trim().to_string(),
        });
    }
    let (code, path) = line.trim_start().split_once(' ')?;
    Some(StatusEntry {
        code: format!("{code:<2}"),
        path: path.trim().to_string(),
    })
}

/// Which kinds of change a status list contains.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusSummary {
    pub staged: bool,
    pub unstaged: bool,
    pub untracked: bool,
}

impl StatusSummary {
    pub fn of(entries: &[StatusEntry]) -> Self {
        let mut summary = Self::default();
        for e in entries {
            summary.untracked |= e.is_untracked();
            summary.unstaged |= e.is_unstaged();
            summary.staged |= e.is_staged();
        }
        summary
    }
}

/// Format entries as an aligned table with a trailing summary.
pub fn format_status(branch: Option<&str>, entries: &[StatusEntry]) -> String {
    let mut out = match branch {
        Some(b) => format!("On branch {b}\n"),
        None => "Not on any branch?\n".to_string(),
    };
    if entries.is_empty() {
        out.push_str("Working tree clean.");
        return out;
    }
    let width = entries.iter().map(|e| e.path.len()).max().unwrap_or(0);
    for e in entries {
        out.push_str(&format!(
            "{:<3} {:<width$}  {}\n",
            e.code,
            e.path,
            e.description()
        ));
    }
    let summary = StatusSummary::of(entries);
    if !summary.staged {
        out.push_str("No changes added to commit.\n");
    } else {
        out.push_str("Changes to be committed.\n");
    }
    if summary.unstaged {
        out.push_str("Changes not staged for commit.\n");
    }
    if summary.untracked {
        out.push_str("Untracked files present.\n");
    }
    out.trim_end().to_string()
}

// ── .gitignore ──────────────────────────────────────────────────────

/// Default `.gitignore` patterns, grouped by section.
pub const GITIGNORE_PATTERNS: &[&str] = &[
    "# Python", "__pycache__/", "*.pyc", "*.pyo", "*.pyd", ".Python", "env/", "venv/", ".venv",
    "ENV/", "*.egg-info/", "dist/", "build/", ".pytest_cache/", ".mypy_cache/", ".coverage",
    "htmlcov/", "", "# Rust", "target/", "", "# Env", ".env", ".env*.local", "!.env.example", "",
    "# IDE", ".vscode/", ".idea/", "*.swp", "*.swo", ".DS_Store", "", "# Logs", "*.log", "logs/",
    "", "# Temp", "*.tmp", "*.temp", "*.bak", "*.cache", "Thumbs.db", "desktop.ini", "", "# Node",
    "node_modules/", "npm-debug.log*", "yarn-debug.log*", "pnpm-lock.yaml", "package-lock.json",
    "", "# Local", "*.session", "*.checkpoint",
];

/// Write `.gitignore` in `dir` unless one exists. Returns the number of
/// lines written, or `None` if the file was already there.
pub fn create_gitignore(dir: &Path, custom: &[String]) -> Result<Option<usize>, QuillError> {
    let path = dir.join(".gitignore");
    if path.exists() {
        return Ok(None);
    }
    let mut lines: Vec<&str> = GITIGNORE_PATTERNS.to_vec();
    if !custom.is_empty() {
        lines.push("");
        lines.push("# Custom");
        lines.extend(custom.iter().map(String::as_str));
    }
    let mut content = lines.join("\n");
    content.push('\n');
    std::fs::write(&path, content).map_err(|e| QuillError::CollaboratorFailed {
        collaborator: "filesystem",
        message: format!("cannot write {}: {e}", path.display()),
    })?;
    Ok(Some(lines.len()))
}

// ── GitRepo ─────────────────────────────────────────────────────────

/// Output of a finished git command.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    fn into_result(self, what: &str) -> Result<String, QuillError> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(QuillError::CollaboratorFailed {
                collaborator: GIT,
                message: format!("{what}: {}", self.stderr.trim()),
            })
        }
    }
}

/// Runs git subprocesses in one directory.
#[derive(Debug, Clone)]
pub struct GitRepo {
    workdir: PathBuf,
}

impl GitRepo {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Whether the directory has its own `.git`.
    pub fn is_repo(&self) -> bool {
        self.workdir.join(".git").exists()
    }

    pub async fn run(&self, args: &[&str]) -> Result<GitOutput, QuillError> {
        debug!(?args, "git");
        let output = Command::new(GIT)
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    QuillError::CollaboratorUnavailable {
                        collaborator: GIT,
                        reason: "the git executable was not found".into(),
                    }
                } else {
                    QuillError::CollaboratorFailed {
                        collaborator: GIT,
                        message: e.to_string(),
                    }
                }
            })?;
        Ok(GitOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    pub async fn init(&self) -> Result<(), QuillError> {
        self.run(&["init"]).await?.into_result("git init")?;
        Ok(())
    }

    /// Branch name of HEAD, `main` when it cannot be determined.
    pub async fn head_branch(&self) -> String {
        match self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await {
            Ok(out) if out.success && !out.stdout.trim().is_empty() => out.stdout.trim().to_string(),
            _ => "main".to_string(),
        }
    }

    pub async fn current_branch(&self) -> Option<String> {
        let out = self.run(&["branch", "--show-current"]).await.ok()?;
        let name = out.stdout.trim();
        (out.success && !name.is_empty()).then(|| name.to_string())
    }

    pub async fn status(&self) -> Result<Vec<StatusEntry>, QuillError> {
        let stdout = self
            .run(&["status", "--porcelain"])
            .await?
            .into_result("git status")?;
        Ok(parse_porcelain(&stdout))
    }

    pub async fn add(&self, paths: &[&str]) -> Result<(), QuillError> {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        self.run(&args).await?.into_result("git add")?;
        Ok(())
    }

    /// `git add -A`
    pub async fn add_all(&self) -> Result<(), QuillError> {
        self.run(&["add", "-A"]).await?.into_result("git add -A")?;
        Ok(())
    }

    pub async fn has_staged_changes(&self) -> Result<bool, QuillError> {
        Ok(!self.run(&["diff", "--staged", "--quiet"]).await?.success)
    }

    pub async fn has_unstaged_changes(&self) -> Result<bool, QuillError> {
        Ok(!self.run(&["diff", "--quiet"]).await?.success)
    }

    pub async fn commit(&self, message: &str) -> Result<String, QuillError> {
        self.run(&["commit", "-m", message])
            .await?
            .into_result("git commit")
    }

    pub async fn last_commit(&self) -> Option<String> {
        let out = self.run(&["log", "--oneline", "-1"]).await.ok()?;
        let line = out.stdout.trim();
        (out.success && !line.is_empty()).then(|| line.to_string())
    }

    pub async fn branch_exists(&self, name: &str) -> Result<bool, QuillError> {
        let out = self.run(&["branch", "--list", name]).await?;
        Ok(out.success && !out.stdout.trim().is_empty())
    }

    pub async fn checkout(&self, name: &str) -> Result<(), QuillError> {
        self.run(&["checkout", name])
            .await?
            .into_result("git checkout")?;
        Ok(())
    }

    /// `git checkout -b <name>`
    pub async fn create_branch(&self, name: &str) -> Result<(), QuillError> {
        self.run(&["checkout", "-b", name])
            .await?
            .into_result("git checkout -b")?;
        Ok(())
    }
}

// ── GitContext ──────────────────────────────────────────────────────

/// Session-wide git state shared by the git tools, the staging hook, and
/// the `/git` commands.
#[derive(Debug)]
pub struct GitContext {
    repo: GitRepo,
    available: AtomicBool,
    enabled: AtomicBool,
    auto_stage: bool,
}

impl GitContext {
    /// Enabled when `git` is installed and `workdir` is a repository.
    pub fn detect(workdir: impl Into<PathBuf>, auto_stage: bool) -> Self {
        let repo = GitRepo::new(workdir);
        let available = which::which(GIT).is_ok();
        let enabled = available && repo.is_repo();
        info!(available, enabled, dir = %repo.workdir().display(), "git detected");
        Self {
            repo,
            available: AtomicBool::new(available),
            enabled: AtomicBool::new(enabled),
            auto_stage,
        }
    }

    pub fn repo(&self) -> &GitRepo {
        &self.repo
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    pub fn is_enabled(&self) -> bool {
        self.is_available() && self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn auto_stage(&self) -> bool {
        self.auto_stage
    }

    /// Record a failure; a missing binary disables git for the session.
    pub fn observe(&self, err: &QuillError) {
        if matches!(err, QuillError::CollaboratorUnavailable { .. }) {
            warn!("git unavailable; disabling git for this session");
            self.available.store(false, Ordering::Relaxed);
            self.enabled.store(false, Ordering::Relaxed);
        }
    }

    /// Guard for tools that need an initialized repository.
    fn require_enabled(&self) -> Result<(), String> {
        if !self.is_available() {
            Err("Error: git is unavailable for this session".into())
        } else if !self.is_enabled() {
            Err("Error: git is not enabled; initialize a repository with git_init first".into())
        } else {
            Ok(())
        }
    }

    fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(self.repo.workdir()).ok()
    }
}

/// Stages written files when auto-staging is on.
pub struct GitStager(pub Arc<GitContext>);

impl WriteHook for GitStager {
    fn after_write<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Option<String>> {
        Box::pin(async move {
            let ctx = &self.0;
            if !ctx.is_enabled() || !ctx.auto_stage() {
                return None;
            }
            let Some(rel) = ctx.relative(path) else {
                warn!(path = %path.display(), "file outside repository; not staged");
                return None;
            };
            let rel = rel.to_string_lossy();
            match ctx.repo().add(&[rel.as_ref()]).await {
                Ok(()) => Some("staged".into()),
                Err(e) => {
                    ctx.observe(&e);
                    Some(format!("not staged: {e}"))
                }
            }
        })
    }
}

// ── Tool arguments ──────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
pub struct GitInitArgs {}

#[derive(Deserialize, JsonSchema)]
pub struct GitAddArgs {
    /// Paths to stage, relative to the repository root.
    pub file_paths: Vec<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct GitCommitArgs {
    /// Commit message.
    pub message: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct GitCreateBranchArgs {
    /// Name of the branch to create and switch to.
    pub branch_name: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct GitStatusArgs {}

fn error_text(ctx: &GitContext, err: QuillError) -> String {
    ctx.observe(&err);
    format!("Error: {err}")
}

// ── Tools ───────────────────────────────────────────────────────────

/// `git_init`
pub struct GitInit(pub Arc<GitContext>);

pub fn git_init_definition() -> ToolDef {
    ToolSpec::builder(names::GIT_INIT)
        .purpose("Initialize a git repository in the base directory")
        .when_to_use("When the project is not yet under version control and the user wants it to be")
        .when_not_to_use("When a repository already exists; use git_status to check")
        .parameters_for::<GitInitArgs>()
        .to_tool_def()
}

impl Tool for GitInit {
    fn definition(&self) -> ToolDef {
        git_init_definition()
    }

    fn is_mutation(&self) -> bool {
        true
    }

    fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
        Box::pin(async move {
            let ctx = &self.0;
            if !ctx.is_available() {
                return "Error: git is unavailable for this session".into();
            }
            if ctx.repo().is_repo() {
                ctx.set_enabled(true);
                return "Git repository already exists.".into();
            }
            match ctx.repo().init().await {
                Ok(()) => {
                    ctx.set_enabled(true);
                    let branch = ctx.repo().head_branch().await;
                    format!(
                        "Initialized git repository in {} (branch: {branch})",
                        ctx.repo().workdir().display()
                    )
                }
                Err(e) => error_text(ctx, e),
            }
        })
    }
}

/// `git_add`
pub struct GitAdd(pub Arc<GitContext>);

pub fn git_add_definition() -> ToolDef {
    ToolSpec::builder(names::GIT_ADD)
        .purpose("Stage files for the next commit")
        .when_to_use("After creating or editing files that should be committed")
        .when_not_to_use("When auto-staging already staged the files you wrote")
        .parameters_for::<GitAddArgs>()
        .example("git_add(file_paths=['src/main.rs'])", "Staged: src/main.rs")
        .to_tool_def()
}

impl Tool for GitAdd {
    fn definition(&self) -> ToolDef {
        git_add_definition()
    }

    fn is_mutation(&self) -> bool {
        true
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<GitAddArgs>(arguments);
        Box::pin(async move {
            let ctx = &self.0;
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            if let Err(e) = ctx.require_enabled() {
                return e;
            }
            if args.file_paths.is_empty() {
                return "Error: 'file_paths' must not be empty".into();
            }
            if args.file_paths.iter().any(|p| p.contains("..")) {
                return "Error: path traversal not allowed".into();
            }
            let mut staged = Vec::new();
            let mut failed = Vec::new();
            for path in &args.file_paths {
                match ctx.repo().add(&[path.as_str()]).await {
                    Ok(()) => staged.push(path.as_str()),
                    Err(e) => {
                        ctx.observe(&e);
                        failed.push(format!("{path} ({e})"));
                    }
                }
            }
            let mut out = String::new();
            if !staged.is_empty() {
                out.push_str(&format!("Staged: {}", staged.join(", ")));
            }
            if !failed.is_empty() {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(&format!("Error: failed to stage: {}", failed.join(", ")));
            }
            out
        })
    }
}

/// `git_commit`
pub struct GitCommit(pub Arc<GitContext>);

pub fn git_commit_definition() -> ToolDef {
    ToolSpec::builder(names::GIT_COMMIT)
        .purpose("Commit the staged changes with a message")
        .when_to_use("When the user asks to commit and the changes are staged")
        .when_not_to_use("Do not commit unless the user has asked you to")
        .parameters_for::<GitCommitArgs>()
        .example("git_commit(message='Fix parser bug')", "Committed: abc1234 Fix parser bug")
        .to_tool_def()
}

impl Tool for GitCommit {
    fn definition(&self) -> ToolDef {
        git_commit_definition()
    }

    fn is_mutation(&self) -> bool {
        true
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<GitCommitArgs>(arguments);
        Box::pin(async move {
            let ctx = &self.0;
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            if args.message.trim().is_empty() {
                return "Error: commit message must not be empty".into();
            }
            if let Err(e) = ctx.require_enabled() {
                return e;
            }
            match ctx.repo().has_staged_changes().await {
                Ok(false) => return "Error: no changes are staged; use git_add first".into(),
                Ok(true) => {}
                Err(e) => return error_text(ctx, e),
            }
            match ctx.repo().commit(&args.message).await {
                Ok(_) => match ctx.repo().last_commit().await {
                    Some(line) => format!("Committed: {line}"),
                    None => "Committed.".into(),
                },
                Err(e) => error_text(ctx, e),
            }
        })
    }
}

/// `git_create_branch`
pub struct GitCreateBranch(pub Arc<GitContext>);

pub fn git_create_branch_definition() -> ToolDef {
    ToolSpec::builder(names::GIT_CREATE_BRANCH)
        .purpose("Create a new branch and switch to it, or switch to it if it exists")
        .when_to_use("When starting work that belongs on its own branch")
        .when_not_to_use("Do not switch branches without the user's permission")
        .parameters_for::<GitCreateBranchArgs>()
        .to_tool_def()
}

impl Tool for GitCreateBranch {
    fn definition(&self) -> ToolDef {
        git_create_branch_definition()
    }

    fn is_mutation(&self) -> bool {
        true
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<GitCreateBranchArgs>(arguments);
        Box::pin(async move {
            let ctx = &self.0;
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            let name = args.branch_name.trim();
            if name.is_empty() {
                return "Error: branch name must not be empty".into();
            }
            if let Err(e) = ctx.require_enabled() {
                return e;
            }
            match ctx.repo().branch_exists(name).await {
                Ok(true) => match ctx.repo().checkout(name).await {
                    Ok(()) => format!("Switched to existing branch '{name}'"),
                    Err(e) => error_text(ctx, e),
                },
                Ok(false) => match ctx.repo().create_branch(name).await {
                    Ok(()) => format!("Created and switched to new branch '{name}'"),
                    Err(e) => error_text(ctx, e),
                },
                Err(e) => error_text(ctx, e),
            }
        })
    }
}

/// `git_status`
pub struct GitStatus(pub Arc<GitContext>);

pub fn git_status_definition() -> ToolDef {
    ToolSpec::builder(names::GIT_STATUS)
        .purpose("Show which files are staged, modified, or untracked")
        .when_to_use("Before committing, or to see what has changed")
        .parameters_for::<GitStatusArgs>()
        .example("git_status()", "On branch main\n M src/lib.rs  Mod (unstaged)")
        .to_tool_def()
}

impl Tool for GitStatus {
    fn definition(&self) -> ToolDef {
        git_status_definition()
    }

    fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
        Box::pin(async move {
            let ctx = &self.0;
            if let Err(e) = ctx.require_enabled() {
                return e;
            }
            match ctx.repo().status().await {
                Ok(entries) => {
                    let branch = ctx.repo().current_branch().await;
                    format_status(branch.as_deref(), &entries)
                }
                Err(e) => error_text(ctx, e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(code: &str, path: &str) -> StatusEntry {
        StatusEntry {
            code: code.into(),
            path: path.into(),
        }
    }

    #[test]
    fn parses_standard_porcelain() {
        let out = " M src/lib.rs\nA  new.rs\n?? notes.txt\nMM both.rs\n";
        assert_eq!(
            parse_porcelain(out),
            vec![
                entry(" M", "src/lib.rs"),
                entry("A ", "new.rs"),
                entry("??", "notes.txt"),
                entry("MM", "both.rs"),
            ]
        );
    }

    #[test]
    fn parses_short_form() {
        assert_eq!(parse_porcelain("M file.rs"), vec![entry("M ", "file.rs")]);
    }

    #[test]
    fn summary_classifies_codes() {
        let entries = vec![entry(" M", "a"), entry("??", "b")];
        assert_eq!(
            StatusSummary::of(&entries),
            StatusSummary {
                staged: false,
                unstaged: true,
                untracked: true
            }
        );
        assert!(StatusSummary::of(&[entry("A ", "c")]).staged);
    }

    #[test]
    fn status_table_lists_entries() {
        let out = format_status(Some("main"), &[entry(" M", "src/lib.rs"), entry("A ", "x.rs")]);
        assert!(out.starts_with("On branch main\n"));
        assert!(out.contains("Mod (unstaged)"));
        assert!(out.contains("Changes to be committed."));
        assert!(out.contains("Changes not staged for commit."));
        assert_eq!(format_status(None, &[]), "Not on any branch?\nWorking tree clean.");
    }

    #[test]
    fn unknown_code_description() {
        assert_eq!(entry("XY", "f").description(), "Unknown");
    }

    #[test]
    fn gitignore_created_once() {
        let dir = tempdir().unwrap();
        let written = create_gitignore(dir.path(), &["*.secret".to_string()]).unwrap();
        assert_eq!(written, Some(GITIGNORE_PATTERNS.len() + 3));
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(content.contains("node_modules/"));
        assert!(content.ends_with("# Custom\n*.secret\n"));
        assert_eq!(create_gitignore(dir.path(), &[]).unwrap(), None);
    }

    #[tokio::test]
    async fn tools_refuse_without_repository() {
        let dir = tempdir().unwrap();
        let ctx = Arc::new(GitContext::detect(dir.path(), true));
        assert!(!ctx.is_enabled());
        let out = GitStatus(ctx.clone()).execute("{}").await;
        assert!(out.starts_with("Error: git"), "{out}");
        let out = GitCommit(ctx).execute(r#"{"message": ""}"#).await;
        assert_eq!(out, "Error: commit message must not be empty");
    }

    #[tokio::test]
    async fn missing_binary_disables_context() {
        let ctx = GitContext::detect("/nonexistent", true);
        ctx.observe(&QuillError::CollaboratorUnavailable {
            collaborator: GIT,
            reason: "gone".into(),
        });
        assert!(!ctx.is_available());
        assert!(!ctx.is_enabled());
    }

    #[tokio::test]
    async fn init_add_commit_round() {
        if which::which(GIT).is_err() {
            return;
        }
        let dir = tempdir().unwrap();
        let ctx = Arc::new(GitContext::detect(dir.path(), true));
        let out = GitInit(ctx.clone()).execute("{}").await;
        assert!(out.starts_with("Initialized git repository"), "{out}");
        assert!(ctx.is_enabled());

        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let note = GitStager(ctx.clone())
            .after_write(&dir.path().join("a.txt"))
            .await;
        assert_eq!(note.as_deref(), Some("staged"));

        let status = ctx.repo().status().await.unwrap();
        assert_eq!(status, vec![entry("A ", "a.txt")]);
    }
}
