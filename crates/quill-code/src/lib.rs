//! Interactive coding assistant built on quill.
//!
//! `quill-code` wires the quill library into a terminal assistant with
//! git awareness, slash commands, and interactive confirmations.
//!
//! # Library usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use quill::tools::AutoConfirm;
//! use quill::workspace::Workspace;
//! use quill_code::{CodeConfig, GitContext};
//!
//! let config = CodeConfig::default();
//! let workspace = Workspace::new(".");
//! let git = Arc::new(GitContext::detect(workspace.base(), config.git_auto_stage));
//! let tools = config.build_tool_set(&workspace, git, Arc::new(AutoConfirm(true)));
//! let session = config.session(workspace.base());
//! ```
//!
//! # Binary
//!
//! ```sh
//! # Interactive mode (default)
//! quill --workdir /path/to/project
//!
//! # One-shot mode
//! quill --prompt "Add error handling to src/main.rs"
//! ```

pub mod commands;
pub mod config;
pub mod prompt;
pub mod repl;
pub mod tools;
pub mod ui;

pub use config::CodeConfig;
pub use prompt::coding_system_prompt;
pub use repl::Repl;
pub use tools::{GitContext, GitToolsExt};
