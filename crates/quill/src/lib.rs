//! Context-window management and fuzzy editing for terminal coding assistants.
//!
//! `quill` is the engine behind the `quill` CLI. It owns the conversation
//! log that is fed to an OpenAI-compatible completion service, keeps that log
//! under a token budget, and executes the tool calls the model requests.
//!
//! Two subsystems carry most of the weight:
//!
//! - **Context window management** ([`context`]): a character-based
//!   [`TokenEstimator`](context::tokens), a [`ContextBudget`](context::ContextBudget)
//!   with healthy / approaching / critical pressure states, the
//!   [`FileContextStore`](context::FileContextStore) for injected file
//!   contents, and [`truncate`](context::truncate), which trims the log while
//!   keeping tool-call groups atomic and the system prompt pinned.
//!
//! - **Fuzzy matching** ([`fuzzy`]): [`FileFinder`](fuzzy::FileFinder) resolves
//!   approximate file names, and [`SnippetEditor`](fuzzy::SnippetEditor)
//!   replaces approximate text regions with ambiguity checks. Both fall back
//!   to exact matching when the `fuzzy` feature is disabled.
//!
//! # Getting started
//!
//! ```ignore
//! use quill::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::new(std::env::var("CEREBRAS_API_KEY")?)?;
//!     let workspace = Workspace::new(".");
//!     let tools = ToolSet::new().with_file_tools(FileTools::new(workspace));
//!
//!     let mut session = Session::new("You are a coding assistant.", ContextConfig::default());
//!     let params = RequestParams::new("llama-3.3-70b");
//!     let outcome = TurnRunner::new(&client, &tools, params)
//!         .run(&mut session, "Summarize src/main.rs", &mut NoopObserver, std::future::pending())
//!         .await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`agent`] | [`Session`](agent::Session) state and the bounded tool-round [`TurnRunner`](agent::TurnRunner) |
//! | [`api`] | SSE streaming, tool-call reassembly, retry, the [`CompletionService`](api::CompletionService) seam |
//! | [`context`] | Token estimation, budget, file contexts, truncation |
//! | [`fuzzy`] | Scorer, file finder, snippet editor |
//! | [`tools`] | [`Tool`](tools::Tool) trait, [`ToolSet`](tools::ToolSet), file and shell tools |
//! | [`workspace`] | Base-directory sandbox for every filesystem access |

pub mod agent;
pub mod api;
pub mod context;
pub mod error;
pub mod fuzzy;
pub mod prelude;
pub mod tools;
pub mod workspace;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ApiError, EditError, PathError, QuillError};

// Re-export schemars for downstream crates deriving tool argument schemas.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

/// Default OpenAI-compatible chat completions endpoint (Cerebras).
pub const DEFAULT_API_URL: &str = "https://api.cerebras.ai/v1/chat/completions";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. Tool parameter schemas are always derived this way
/// so the schema and the deserialization target cannot drift apart.
///
/// ```
/// use quill::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct EditArgs {
///     path: String,
///     original_snippet: String,
/// }
///
/// let schema = json_schema_for::<EditArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"path".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Only the fields the assistant loop sets are
/// modelled; unset optional fields are omitted from serialization.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
    /// `"auto"` lets the model decide whether to call tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A message in the conversation log.
///
/// Build messages through the constructors: they guarantee that
/// `tool_calls` only appears on assistant messages and `tool_call_id` only
/// on tool messages.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// An assistant message that may carry both text and tool calls. An empty
    /// `calls` vector produces a plain text message.
    pub fn assistant_with_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
            tool_calls: if calls.is_empty() { None } else { Some(calls) },
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    /// Message text, or `""` when there is none.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Whether this is an assistant message requesting at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        self.role == MessageRole::Assistant
            && self.tool_calls.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Ids of the tool calls this message requests (empty for non-assistant messages).
    pub fn tool_call_ids(&self) -> impl Iterator<Item = &str> {
        self.tool_calls
            .iter()
            .flatten()
            .map(|call| call.id.as_str())
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition sent to the API (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CallType {
    #[serde(rename = "function")]
    Function,
}

/// A tool call returned by the model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionCallData {
    pub name: String,
    pub arguments: String,
}

/// Token usage statistics reported at the end of a stream.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for an OpenAI-compatible chat completions endpoint.
///
/// Requests are always streamed; see [`ChatClient::chat_stream_live`] and the
/// [`CompletionService`](api::CompletionService) implementation.
pub struct ChatClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) url: String,
    pub(crate) retry: api::RetryConfig,
}

impl ChatClient {
    /// Create a client for [`DEFAULT_API_URL`].
    pub fn new(api_key: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_url(api_key, DEFAULT_API_URL)
    }

    /// Create a client for a custom endpoint.
    pub fn with_url(api_key: impl Into<String>, url: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("quill/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            url: url.into(),
            retry: api::RetryConfig::default(),
        })
    }

    /// Override the retry policy for connection-level failures.
    pub fn with_retry(mut self, retry: api::RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The endpoint this client posts to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("url", &self.url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.text(), "hello");

        let tool = Message::tool_result("call-1", "result");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call-1"));
        assert!(tool.tool_calls.is_none());
    }

    #[test]
    fn assistant_without_calls_is_plain_text() {
        let msg = Message::assistant_with_tool_calls("done", vec![]);
        assert!(msg.tool_calls.is_none());
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn assistant_tool_call_ids() {
        let msg = Message::assistant_with_tool_calls(
            "",
            vec![
                ToolCall::new("a", "read_file", "{}"),
                ToolCall::new("b", "git_status", "{}"),
            ],
        );
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_call_ids().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn chat_request_skips_unset_fields() {
        let req = ChatRequest {
            model: "test-model".into(),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("top_p").is_none());
        assert!(json.get("tools").is_none());
        assert!(json.get("stream").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn tool_message_serializes_call_id() {
        let json = serde_json::to_value(Message::tool_result("c1", "ok")).unwrap();
        assert_eq!(json["tool_call_id"], "c1");
        assert!(json.get("tool_calls").is_none());
    }
}
