//! Convenience re-exports for the common case.
//!
//! ```ignore
//! use quill::prelude::*;
//! ```

pub use crate::agent::{
    ModelSelection, NoopObserver, RequestParams, Session, TurnObserver, TurnOutcome, TurnRunner,
};
pub use crate::api::{CompletionService, RetryConfig, StreamEvent};
pub use crate::context::{AddOutcome, ContextBudget, ContextConfig, ContextUsage, PressureState};
pub use crate::error::{ApiError, EditError, PathError, QuillError};
pub use crate::fuzzy::{FileFinder, SnippetEditor};
pub use crate::tools::{
    AutoConfirm, Confirm, DisabledTool, FileTools, RunShell, Tool, ToolFuture, ToolSet, ToolSpec,
    WriteHook,
};
pub use crate::workspace::{Exclusions, Workspace};
pub use crate::{ChatClient, ChatRequest, Message, MessageRole, ToolCall, ToolDef};
