//! Assistant configuration with sensible defaults.
//!
//! [`CodeConfig`] captures everything the assistant needs and converts it
//! into quill types via [`request_params`](CodeConfig::request_params),
//! [`session`](CodeConfig::session), and
//! [`build_tool_set`](CodeConfig::build_tool_set). Settings come from an
//! optional TOML file; every field has a default.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use quill::agent::{ModelSelection, RequestParams, Session};
use quill::context::ContextConfig;
use quill::fuzzy::{FileFinder, SnippetEditor};
use quill::tools::files::{
    DEFAULT_MAX_CREATE_BYTES, DEFAULT_MAX_MULTIPLE_READ_BYTES, DEFAULT_MAX_READ_BYTES,
};
use quill::tools::{Confirm, FileTools, RunShell, ToolSet};
use quill::workspace::{DEFAULT_EXCLUDED_EXTENSIONS, DEFAULT_EXCLUDED_NAMES, Exclusions, Workspace};
use quill::DEFAULT_API_URL;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::prompt::coding_system_prompt;
use crate::tools::{GitContext, GitStager, GitToolsExt};

/// Config file looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "quill.toml";

/// Configuration for an assistant session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeConfig {
    /// Model for normal turns. Default: `"llama-3.3-70b"`.
    pub model: String,
    /// Model for `/r` and after `/reasoner`. Default: `"qwen-3-32b"`.
    pub reasoner_model: String,
    /// Chat completions endpoint.
    pub api_url: String,
    /// Default: `0.7`.
    pub temperature: f32,
    /// Default: `1.0`.
    pub top_p: f32,
    /// Maximum tokens per response. Default: `5000`.
    pub max_completion_tokens: u32,
    /// `/add` on a directory stops after this many files.
    pub max_files_in_add_dir: usize,
    /// `/add` on a directory skips files larger than this.
    pub max_file_size_in_add_dir: u64,
    pub max_file_content_size_create: u64,
    pub max_file_size_read: u64,
    pub max_multiple_read_size: usize,
    pub min_fuzzy_file_score: u8,
    pub min_edit_snippet_score: u8,
    pub excluded_names: Vec<String>,
    pub excluded_extensions: Vec<String>,
    /// Stage files written by the file tools. Default: `true`.
    pub git_auto_stage: bool,
    /// Ask before overwriting a file or running a shell command. Default: `true`.
    pub confirm_actions: bool,
    pub context: ContextConfig,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            model: "llama-3.3-70b".to_string(),
            reasoner_model: "qwen-3-32b".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            temperature: 0.7,
            top_p: 1.0,
            max_completion_tokens: 5000,
            max_files_in_add_dir: 1000,
            max_file_size_in_add_dir: 5_000_000,
            max_file_content_size_create: DEFAULT_MAX_CREATE_BYTES,
            max_file_size_read: DEFAULT_MAX_READ_BYTES,
            max_multiple_read_size: DEFAULT_MAX_MULTIPLE_READ_BYTES,
            min_fuzzy_file_score: quill::fuzzy::finder::DEFAULT_MIN_FILE_SCORE,
            min_edit_snippet_score: quill::fuzzy::editor::DEFAULT_MIN_SNIPPET_SCORE,
            excluded_names: DEFAULT_EXCLUDED_NAMES.iter().map(|s| s.to_string()).collect(),
            excluded_extensions: DEFAULT_EXCLUDED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            git_auto_stage: true,
            confirm_actions: true,
            context: ContextConfig::default(),
        }
    }
}

impl CodeConfig {
    /// Load `explicit` if given (it must exist), else `quill.toml` in
    /// `workdir` if present, else defaults.
    pub fn load(explicit: Option<&Path>, workdir: &Path) -> anyhow::Result<Self> {
        let path: PathBuf = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let candidate = workdir.join(CONFIG_FILE_NAME);
                if !candidate.is_file() {
                    return Ok(Self::default());
                }
                candidate
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        debug!(path = %path.display(), model = %config.model, "config loaded");
        Ok(config)
    }

    pub fn exclusions(&self) -> Exclusions {
        Exclusions::new(
            self.excluded_names.iter().cloned(),
            self.excluded_extensions.iter().cloned(),
        )
    }

    pub fn models(&self) -> ModelSelection {
        ModelSelection::new(&self.model, &self.reasoner_model)
    }

    /// Sampling parameters for `model`.
    pub fn request_params(&self, model: &str) -> RequestParams {
        RequestParams::new(model)
            .temperature(self.temperature)
            .top_p(self.top_p)
            .max_completion_tokens(self.max_completion_tokens)
    }

    /// A fresh session whose system prompt describes `base`.
    pub fn session(&self, base: &Path) -> Session {
        Session::new(coding_system_prompt(base), self.context.clone()).with_models(self.models())
    }

    /// Build the file, shell, and git tools rooted at the workspace base.
    pub fn build_tool_set(
        &self,
        workspace: &Workspace,
        git: Arc<GitContext>,
        confirm: Arc<dyn Confirm>,
    ) -> ToolSet {
        let files = FileTools::new(workspace.clone())
            .finder(FileFinder::new(self.exclusions()).with_min_score(self.min_fuzzy_file_score))
            .editor(SnippetEditor::new().with_min_score(self.min_edit_snippet_score))
            .max_read_bytes(self.max_file_size_read)
            .max_create_bytes(self.max_file_content_size_create)
            .max_multiple_read_bytes(self.max_multiple_read_size)
            .confirm(confirm.clone())
            .write_hook(Arc::new(GitStager(git.clone())));
        let shell = RunShell::detect(workspace.base()).map(|shell| shell.confirm(confirm));
        ToolSet::new()
            .with_file_tools(files)
            .with_shell_tool(shell)
            .with_git_tools(git)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill::tools::AutoConfirm;
    use quill::tools::names;

    #[test]
    fn defaults() {
        let config = CodeConfig::default();
        assert_eq!(config.model, "llama-3.3-70b");
        assert_eq!(config.max_completion_tokens, 5000);
        assert_eq!(config.max_files_in_add_dir, 1000);
        assert_eq!(config.max_multiple_read_size, 100_000);
        assert_eq!(config.min_fuzzy_file_score, 80);
        assert_eq!(config.min_edit_snippet_score, 85);
        assert_eq!(config.context.max_context_files, 5);
        assert!(config.git_auto_stage);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: CodeConfig = toml::from_str(
            r#"
            model = "llama-4"
            git_auto_stage = false

            [context]
            max_tokens = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.model, "llama-4");
        assert!(!config.git_auto_stage);
        assert_eq!(config.context.max_tokens, 1000);
        assert_eq!(config.context.max_history_messages, 50);
        assert_eq!(config.reasoner_model, CodeConfig::default().reasoner_model);
    }

    #[test]
    fn load_prefers_workdir_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            CodeConfig::load(None, dir.path()).unwrap(),
            CodeConfig::default()
        );
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "temperature = 0.2\n").unwrap();
        let config = CodeConfig::load(None, dir.path()).unwrap();
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = CodeConfig::load(Some(&missing), dir.path()).unwrap_err();
        assert!(err.to_string().contains("cannot read config file"));
    }

    #[test]
    fn tool_set_has_file_shell_and_git_tools() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        let git = Arc::new(GitContext::detect(workspace.base(), true));
        let tools = CodeConfig::default().build_tool_set(&workspace, git, Arc::new(AutoConfirm(true)));
        for name in [
            names::READ_FILE,
            names::READ_MULTIPLE_FILES,
            names::CREATE_FILE,
            names::CREATE_MULTIPLE_FILES,
            names::EDIT_FILE,
            names::RUN_SHELL,
            names::GIT_STATUS,
            names::GIT_COMMIT,
        ] {
            assert!(tools.contains(name), "missing {name}");
        }
    }

    #[test]
    fn session_uses_configured_models() {
        let session = CodeConfig::default().session(Path::new("/w"));
        assert_eq!(session.models().map(|m| m.active()), Some("llama-3.3-70b"));
        assert!(session.system_prompt().contains("/w"));
    }
}
