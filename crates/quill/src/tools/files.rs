//! File tools: read, create, and edit files inside the workspace.
//!
//! | Tool | Name | Purpose |
//! |------|------|---------|
//! | [`ReadFile`] | `read_file` | Read one file, with fuzzy path fallback |
//! | [`ReadMultipleFiles`] | `read_multiple_files` | Read several files under a combined size cap |
//! | [`CreateFile`] | `create_file` | Create or overwrite one file |
//! | [`CreateMultipleFiles`] | `create_multiple_files` | Create several files at once |
//! | [`EditFile`] | `edit_file` | Replace a snippet via [`SnippetEditor`] |
//!
//! Every path goes through [`Workspace::resolve`]. Writes run the optional
//! [`WriteHook`] afterwards (the CLI stages written files in git there).

use super::confirm::{AutoConfirm, Confirm};
use super::core::{Tool, ToolFuture, ToolSet, parse_tool_args};
use super::names;
use super::spec::ToolSpec;
use crate::ToolDef;
use crate::error::QuillError;
use crate::fuzzy::{FileFinder, SnippetEditor};
use crate::workspace::Workspace;
use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

// ── Defaults ────────────────────────────────────────────────────────

/// Default cap on a single file read by `read_file`.
pub const DEFAULT_MAX_READ_BYTES: u64 = 5_000_000;

/// Default cap on content written by `create_file`.
pub const DEFAULT_MAX_CREATE_BYTES: u64 = 5_000_000;

/// Default combined cap on `read_multiple_files` output.
pub const DEFAULT_MAX_MULTIPLE_READ_BYTES: usize = 100_000;

// ── Typed argument structs ──────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// Path of the file, relative to the base directory (e.g. 'src/main.rs').
    pub path: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct ReadMultipleFilesArgs {
    /// Paths of the files to read, relative to the base directory.
    pub paths: Vec<String>,
}

#[derive(Deserialize, JsonSchema)]
pub struct CreateFileArgs {
    /// Path of the file to create or overwrite.
    pub path: String,
    /// Complete content of the file.
    pub content: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct FileToCreate {
    /// Path of the file to create or overwrite.
    pub path: String,
    /// Complete content of the file.
    pub content: String,
}

#[derive(Deserialize, JsonSchema)]
pub struct CreateMultipleFilesArgs {
    /// Files to create.
    pub files: Vec<FileToCreate>,
}

#[derive(Deserialize, JsonSchema)]
pub struct EditFileArgs {
    /// Path of the file to edit.
    pub path: String,
    /// Existing text to replace. Copy it from the file, including indentation.
    pub original_snippet: String,
    /// Replacement text.
    pub new_snippet: String,
}

// ── WriteHook ───────────────────────────────────────────────────────

/// Called after every successful write.
pub trait WriteHook: Send + Sync {
    /// Returns a note appended to the tool result, if any.
    fn after_write<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Option<String>>;
}

// ── FileTools ───────────────────────────────────────────────────────

/// Shared state for the file tools.
pub struct FileTools {
    workspace: Workspace,
    finder: FileFinder,
    editor: SnippetEditor,
    max_read_bytes: u64,
    max_create_bytes: u64,
    max_multiple_read_bytes: usize,
    confirm: Arc<dyn Confirm>,
    hook: Option<Arc<dyn WriteHook>>,
}

impl std::fmt::Debug for FileTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTools")
            .field("base", &self.workspace.base())
            .field("finder", &self.finder)
            .field("editor", &self.editor)
            .field("max_create_bytes", &self.max_create_bytes)
            .finish_non_exhaustive()
    }
}

impl FileTools {
    /// File tools with default limits, no confirmation prompts, and no hook.
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            finder: FileFinder::default(),
            editor: SnippetEditor::default(),
            max_read_bytes: DEFAULT_MAX_READ_BYTES,
            max_create_bytes: DEFAULT_MAX_CREATE_BYTES,
            max_multiple_read_bytes: DEFAULT_MAX_MULTIPLE_READ_BYTES,
            confirm: Arc::new(AutoConfirm(true)),
            hook: None,
        }
    }

    pub fn finder(mut self, finder: FileFinder) -> Self {
        self.finder = finder;
        self
    }

    pub fn editor(mut self, editor: SnippetEditor) -> Self {
        self.editor = editor;
        self
    }

    pub fn max_read_bytes(mut self, max: u64) -> Self {
        self.max_read_bytes = max;
        self
    }

    pub fn max_create_bytes(mut self, max: u64) -> Self {
        self.max_create_bytes = max;
        self
    }

    pub fn max_multiple_read_bytes(mut self, max: usize) -> Self {
        self.max_multiple_read_bytes = max;
        self
    }

    /// Asked before an existing file is overwritten.
    pub fn confirm(mut self, confirm: Arc<dyn Confirm>) -> Self {
        self.confirm = confirm;
        self
    }

    pub fn write_hook(mut self, hook: Arc<dyn WriteHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Resolve a path that must name an existing file. Falls back to fuzzy
    /// search under the base directory when the exact path does not exist.
    pub fn locate(&self, path: &str) -> Result<PathBuf, String> {
        let exact = self.workspace.resolve(path).map_err(|e| format!("Error: {e}"))?;
        if exact.is_file() {
            return Ok(exact);
        }
        if exact.is_dir() {
            return Err(format!("Error: '{path}' is a directory, not a file"));
        }
        match self.finder.find(self.workspace.base(), path) {
            Some(found) => {
                info!(requested = path, found = %found.display(), "fuzzy path match");
                Ok(found)
            }
            None if self.finder.is_available() => Err(format!(
                "Error: file '{path}' not found, and no similar file name was found"
            )),
            None => Err(format!(
                "Error: file '{path}' not found (fuzzy matching is unavailable)"
            )),
        }
    }

    fn read_text(&self, path: &Path) -> Result<String, QuillError> {
        self.workspace.read_text_limited(path, self.max_read_bytes)
    }

    /// Write one file: size check, overwrite confirmation, write, hook.
    pub async fn create(&self, path: &str, content: &str) -> Result<String, QuillError> {
        let size = content.len() as u64;
        if size > self.max_create_bytes {
            return Err(QuillError::SizeLimit {
                what: format!("content for '{path}'"),
                actual: size,
                limit: self.max_create_bytes,
            });
        }
        let full = self.workspace.resolve(path)?;
        let existed = full.exists();
        if existed {
            let current = std::fs::metadata(&full).map(|m| m.len()).unwrap_or(0);
            let prompt = format!(
                "File '{}' exists ({}). Overwrite?",
                self.workspace.display_path(&full),
                human_size(current)
            );
            if !self.confirm.confirm(&prompt) {
                return Err(QuillError::Validation(
                    "file overwrite cancelled by user".into(),
                ));
            }
        }
        let written = self.workspace.write(&full, content)?;
        let action = if existed { "Updated" } else { "Created" };
        let mut msg = format!(
            "{action} file '{}' ({} bytes)",
            self.workspace.display_path(&written),
            size
        );
        self.append_hook_note(&written, &mut msg).await;
        Ok(msg)
    }

    /// Apply a snippet replacement to an existing file.
    pub async fn edit(&self, path: &str, original: &str, new: &str) -> Result<String, String> {
        let full = self.locate(path)?;
        let content = self.read_text(&full).map_err(|e| format!("Error: {e}"))?;
        let updated = self
            .editor
            .apply(&content, original, new)
            .map_err(|e| format!("Error: edit of '{path}' failed: {}", e.diagnostic()))?;
        self.workspace
            .write(&full, &updated)
            .map_err(|e| format!("Error: {e}"))?;
        let mut msg = format!(
            "Successfully edited file '{}'",
            self.workspace.display_path(&full)
        );
        self.append_hook_note(&full, &mut msg).await;
        Ok(msg)
    }

    async fn append_hook_note(&self, path: &Path, msg: &mut String) {
        if let Some(hook) = &self.hook
            && let Some(note) = hook.after_write(path).await
        {
            msg.push_str(" (");
            msg.push_str(&note);
            msg.push(')');
        }
    }
}

fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} bytes")
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

fn file_block(display: &str, content: &str) -> String {
    format!("Content of file '{display}':\n\n{content}")
}

// ── Tools ───────────────────────────────────────────────────────────

/// `read_file`
pub struct ReadFile {
    files: Arc<FileTools>,
}

impl Tool for ReadFile {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::READ_FILE)
            .purpose("Read the content of a single file")
            .when_to_use("When you need to see a file before discussing or editing it")
            .when_not_to_use("When you need several files; use read_multiple_files")
            .parameters_for::<ReadFileArgs>()
            .example("read_file(path='src/main.rs')", "Returns the file's text")
            .output_format("\"Content of file '<path>':\" followed by the text")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<ReadFileArgs>(arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            let full = match self.files.locate(&args.path) {
                Ok(p) => p,
                Err(e) => return e,
            };
            match self.files.read_text(&full) {
                Ok(content) => file_block(&self.files.workspace.display_path(&full), &content),
                Err(e) => format!("Error: {e}"),
            }
        })
    }
}

/// `read_multiple_files`
pub struct ReadMultipleFiles {
    files: Arc<FileTools>,
}

impl Tool for ReadMultipleFiles {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::READ_MULTIPLE_FILES)
            .purpose("Read the content of several files in one call")
            .when_to_use("When you need to compare or reason about a few related files")
            .when_not_to_use("For a single file; use read_file")
            .parameters_for::<ReadMultipleFilesArgs>()
            .output_format(
                "One \"Content of file '<path>':\" block per file; files past the \
                 combined size limit are listed as skipped",
            )
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<ReadMultipleFilesArgs>(arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            if args.paths.is_empty() {
                return "Error: 'paths' must not be empty".into();
            }

            let limit = self.files.max_multiple_read_bytes;
            let mut blocks: Vec<String> = Vec::new();
            let mut errors: Vec<String> = Vec::new();
            let mut skipped: Vec<String> = Vec::new();
            let mut total = 0usize;

            for path in &args.paths {
                if total >= limit {
                    skipped.push(path.clone());
                    continue;
                }
                let full = match self.files.locate(path) {
                    Ok(p) => p,
                    Err(e) => {
                        errors.push(e);
                        continue;
                    }
                };
                match self.files.read_text(&full) {
                    Ok(content) => {
                        if total + content.len() > limit {
                            skipped.push(path.clone());
                            total = limit;
                            continue;
                        }
                        total += content.len();
                        blocks.push(file_block(
                            &self.files.workspace.display_path(&full),
                            &content,
                        ));
                    }
                    Err(e) => errors.push(format!("Error reading '{path}': {e}")),
                }
            }

            debug!(read = blocks.len(), skipped = skipped.len(), total, "read_multiple_files");
            let mut out = blocks.join("\n\n");
            if !skipped.is_empty() {
                out.push_str(&format!(
                    "\n\nSkipped (combined size limit of {limit} bytes reached): {}",
                    skipped.join(", ")
                ));
            }
            if !errors.is_empty() {
                out.push_str("\n\n");
                out.push_str(&errors.join("\n"));
            }
            out.trim_start().to_string()
        })
    }
}

/// `create_file`
pub struct CreateFile {
    files: Arc<FileTools>,
}

impl Tool for CreateFile {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::CREATE_FILE)
            .purpose("Create a new file or overwrite an existing file with new content")
            .when_to_use("For new files, or when most of a file changes")
            .when_not_to_use("For small changes to an existing file; use edit_file")
            .parameters_for::<CreateFileArgs>()
            .example(
                "create_file(path='src/util.rs', content='pub fn f() {}\\n')",
                "Creates src/util.rs, making parent directories",
            )
            .disambiguate(
                "Changing one function in a large file",
                names::EDIT_FILE,
                "rewriting the whole file risks losing unrelated content",
            )
            .to_tool_def()
    }

    fn is_mutation(&self) -> bool {
        true
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<CreateFileArgs>(arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            match self.files.create(&args.path, &args.content).await {
                Ok(msg) => msg,
                Err(e) => format!("Error: {e}"),
            }
        })
    }
}

/// `create_multiple_files`
pub struct CreateMultipleFiles {
    files: Arc<FileTools>,
}

impl Tool for CreateMultipleFiles {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::CREATE_MULTIPLE_FILES)
            .purpose("Create or overwrite several files in one call")
            .when_to_use("When scaffolding a project or adding a group of related files")
            .when_not_to_use("For a single file; use create_file")
            .parameters_for::<CreateMultipleFilesArgs>()
            .output_format("One line per file, then any errors")
            .to_tool_def()
    }

    fn is_mutation(&self) -> bool {
        true
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<CreateMultipleFilesArgs>(arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            if args.files.is_empty() {
                return "Error: 'files' must not be empty".into();
            }
            let mut lines = Vec::with_capacity(args.files.len());
            for file in &args.files {
                match self.files.create(&file.path, &file.content).await {
                    Ok(msg) => lines.push(msg),
                    Err(e) => lines.push(format!("Error: '{}': {e}", file.path)),
                }
            }
            lines.join("\n")
        })
    }
}

/// `edit_file`
pub struct EditFile {
    files: Arc<FileTools>,
}

impl Tool for EditFile {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(names::EDIT_FILE)
            .purpose("Replace a snippet of an existing file with new text")
            .when_to_use(
                "For targeted changes. The original snippet should be copied from the \
                 file; small differences are tolerated",
            )
            .when_not_to_use("For new files or full rewrites; use create_file")
            .parameters_for::<EditFileArgs>()
            .output_format(
                "Confirmation, or an error showing the attempted snippet and the \
                 closest actual content",
            )
            .to_tool_def()
    }

    fn is_mutation(&self) -> bool {
        true
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let parsed = parse_tool_args::<EditFileArgs>(arguments);
        Box::pin(async move {
            let args = match parsed {
                Ok(a) => a,
                Err(e) => return e,
            };
            match self
                .files
                .edit(&args.path, &args.original_snippet, &args.new_snippet)
                .await
            {
                Ok(msg) | Err(msg) => msg,
            }
        })
    }
}

// ── Registration ────────────────────────────────────────────────────

impl ToolSet {
    /// Register `read_file`, `read_multiple_files`, `create_file`,
    /// `create_multiple_files`, and `edit_file`, all sharing `files`.
    pub fn with_file_tools(self, files: FileTools) -> Self {
        let files = Arc::new(files);
        self.with(ReadFile {
            files: Arc::clone(&files),
        })
        .with(ReadMultipleFiles {
            files: Arc::clone(&files),
        })
        .with(CreateFile {
            files: Arc::clone(&files),
        })
        .with(CreateMultipleFiles {
            files: Arc::clone(&files),
        })
        .with(EditFile { files })
    }
}
