//! Canonical tool name constants.
//!
//! Tool-name string literals reference these constants; a rename only
//! touches this file.

pub const READ_FILE: &str = "read_file";
pub const READ_MULTIPLE_FILES: &str = "read_multiple_files";
pub const CREATE_FILE: &str = "create_file";
pub const CREATE_MULTIPLE_FILES: &str = "create_multiple_files";
pub const EDIT_FILE: &str = "edit_file";
pub const RUN_SHELL: &str = "run_shell";
pub const GIT_INIT: &str = "git_init";
pub const GIT_ADD: &str = "git_add";
pub const GIT_COMMIT: &str = "git_commit";
pub const GIT_CREATE_BRANCH: &str = "git_create_branch";
pub const GIT_STATUS: &str = "git_status";
