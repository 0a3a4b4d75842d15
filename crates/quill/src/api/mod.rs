//! API interaction layer: streaming, retry, and the completion-service seam.
//!
//! - [`streaming`]: SSE decoder for text, reasoning, and tool-call deltas,
//!   plus tool-call reassembly and validation.
//! - [`retry`]: transient error handling with exponential backoff and jitter.
//! - [`service`]: the [`CompletionService`] trait the turn loop talks to.

pub mod retry;
pub mod service;
pub mod streaming;

pub use retry::RetryConfig;
pub use service::{CompletionService, EventSink};
pub use streaming::{StreamEvent, assemble_tool_calls, collect_text, validate_tool_calls};
