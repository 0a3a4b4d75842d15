//! Git tools for the coding assistant.
//!
//! Provides the git collaborator and the [`GitToolsExt`] trait for
//! registration on a [`ToolSet`].

pub mod git;

pub use git::{
    GitAdd, GitCommit, GitContext, GitCreateBranch, GitInit, GitRepo, GitStager, GitStatus,
    StatusEntry,
};

use quill::tools::{DisabledTool, ToolSet};
use std::sync::Arc;

const GIT_MISSING: &str = "git is not installed on this system";

// ── Extension trait ─────────────────────────────────────────────────

/// Extension trait for registering git tools on a [`ToolSet`].
///
/// # Example
///
/// ```ignore
/// use quill::tools::ToolSet;
/// use quill_code::tools::{GitContext, GitToolsExt};
///
/// let git = Arc::new(GitContext::detect(".", true));
/// let tools = ToolSet::new().with_git_tools(git);
/// ```
pub trait GitToolsExt {
    fn with_git_tools(self, git: Arc<GitContext>) -> Self;
}

impl GitToolsExt for ToolSet {
    /// Without a git binary every git tool is registered disabled, so the
    /// model still sees the names and gets a clear answer.
    fn with_git_tools(self, git: Arc<GitContext>) -> Self {
        if !git.is_available() {
            return self
                .with(DisabledTool::new(git::git_init_definition(), GIT_MISSING))
                .with(DisabledTool::new(git::git_add_definition(), GIT_MISSING))
                .with(DisabledTool::new(git::git_commit_definition(), GIT_MISSING))
                .with(DisabledTool::new(
                    git::git_create_branch_definition(),
                    GIT_MISSING,
                ))
                .with(DisabledTool::new(git::git_status_definition(), GIT_MISSING));
        }
        self.with(GitInit(git.clone()))
            .with(GitAdd(git.clone()))
            .with(GitCommit(git.clone()))
            .with(GitCreateBranch(git.clone()))
            .with(GitStatus(git))
    }
}
