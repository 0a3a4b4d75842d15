//! Tools the model can call.
//!
//! Every capability is a [`Tool`] implementor collected into a [`ToolSet`],
//! which handles dispatch, schema validation, timeouts, and truncation.
//!
//! # Submodules
//!
//! - [`core`]: [`Tool`], [`ToolSet`], [`DisabledTool`], argument helpers.
//! - [`files`]: `read_file`, `read_multiple_files`, `create_file`,
//!   `create_multiple_files`, `edit_file`. Register with
//!   [`ToolSet::with_file_tools()`].
//! - [`shell`]: `run_shell` in the detected shell. Register with
//!   [`ToolSet::with_shell_tool()`].
//! - [`spec`]: [`ToolSpec`] builder for structured descriptions.
//! - [`confirm`]: the [`Confirm`] seam for operator yes/no questions.
//! - [`names`]: tool name constants.

pub mod confirm;
pub mod core;
pub mod files;
pub mod names;
pub mod shell;
pub mod spec;

pub use confirm::{AutoConfirm, Confirm};
pub use core::{
    DEFAULT_MAX_RESULT_BYTES, DisabledTool, Tool, ToolFuture, ToolSet, parse_tool_args,
    truncate_result, validate_tool_arguments,
};
pub use files::{FileTools, WriteHook};
pub use shell::{RunShell, ShellKind};
pub use spec::ToolSpec;
