//! Typed error hierarchy.
//!
//! - [`PathError`]: a path was refused before touching the filesystem.
//! - [`EditError`]: [`SnippetEditor`](crate::fuzzy::SnippetEditor) could not
//!   place a replacement. Carries the attempted snippet and the closest
//!   actual content so the operator (or the model) can see what went wrong.
//! - [`ApiError`]: the completion service failed.
//! - [`QuillError`]: everything a tool or collaborator can report.
//!
//! Tools never propagate these past the tool boundary; they are rendered into
//! `"Error: ..."` tool results so the conversation can continue.

use std::path::PathBuf;
use thiserror::Error;

/// A path was rejected by the [`Workspace`](crate::workspace::Workspace) sandbox.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path '{path}' refers to the home directory; use a path relative to the base directory")]
    HomeReference { path: String },

    #[error("path '{path}' resolves outside the base directory '{}'", .base.display())]
    OutsideBase { path: String, base: PathBuf },
}

/// Why a snippet replacement could not be applied.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("original snippet is empty")]
    EmptySnippet,

    #[error("original snippet not found and fuzzy matching is unavailable")]
    NotFound { snippet: String },

    #[error("content too short: snippet has {snippet_lines} lines but the file has {content_lines}")]
    ContentTooShort {
        snippet_lines: usize,
        content_lines: usize,
    },

    #[error("best match scored {score}, below the threshold of {min_score}")]
    BelowThreshold {
        score: u8,
        min_score: u8,
        snippet: String,
        best_match: String,
    },

    #[error("ambiguous: the matching text occurs {occurrences} times")]
    Ambiguous {
        occurrences: usize,
        snippet: String,
        best_match: String,
    },
}

impl EditError {
    /// Render the error together with the attempted snippet and the closest
    /// actual content, for display to the operator and the model.
    pub fn diagnostic(&self) -> String {
        match self {
            EditError::NotFound { snippet } => {
                format!("{self}\n--- attempted ---\n{snippet}")
            }
            EditError::BelowThreshold {
                snippet,
                best_match,
                ..
            }
            | EditError::Ambiguous {
                snippet,
                best_match,
                ..
            } => format!(
                "{self}\n--- attempted ---\n{snippet}\n--- closest actual content ---\n{best_match}"
            ),
            EditError::EmptySnippet | EditError::ContentTooShort { .. } => self.to_string(),
        }
    }
}

/// Errors from the completion service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("completion service HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether retrying the same request may succeed (429, 5xx, connection
    /// resets and timeouts). Client errors (400, 401, 403, 404, 422) never are.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            ApiError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ApiError::Serialize(_) => false,
        }
    }
}

/// Errors from tools and their collaborators.
#[derive(Debug, Error)]
pub enum QuillError {
    #[error("invalid arguments: {0}")]
    Validation(String),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("{what} is {actual} bytes, exceeding the limit of {limit} bytes")]
    SizeLimit {
        what: String,
        actual: u64,
        limit: u64,
    },

    #[error("'{}' looks like a binary file", .path.display())]
    Binary { path: PathBuf },

    #[error("{collaborator} is unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: &'static str,
        reason: String,
    },

    #[error("{collaborator} failed: {message}")]
    CollaboratorFailed {
        collaborator: &'static str,
        message: String,
    },

    #[error("i/o error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl QuillError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        QuillError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = QuillError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_diagnostic_shows_both_sides() {
        let err = EditError::BelowThreshold {
            score: 40,
            min_score: 85,
            snippet: "x\ny".into(),
            best_match: "a\nb".into(),
        };
        let diag = err.diagnostic();
        assert!(diag.contains("scored 40"));
        assert!(diag.contains("--- attempted ---\nx\ny"));
        assert!(diag.contains("--- closest actual content ---\na\nb"));
    }

    #[test]
    fn http_status_classification() {
        let transient = ApiError::Http {
            status: 503,
            body: String::new(),
        };
        let permanent = ApiError::Http {
            status: 401,
            body: "unauthorized".into(),
        };
        assert!(transient.is_transient());
        assert!(!permanent.is_transient());
    }

    #[test]
    fn path_errors_convert_into_quill_error() {
        let err: QuillError = PathError::HomeReference { path: "~/x".into() }.into();
        assert!(err.to_string().contains("home directory"));
    }
}
