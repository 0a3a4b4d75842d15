//! Approximate matching for file names and file content.
//!
//! Backed by the `similar` crate behind the default `fuzzy` feature. Without
//! the feature [`default_scorer`] returns `None`: [`FileFinder`] finds
//! nothing and [`SnippetEditor`] only accepts exact snippets.

pub mod editor;
pub mod finder;
pub mod scorer;

pub use editor::{DEFAULT_MIN_SNIPPET_SCORE, SnippetEditor};
pub use finder::{DEFAULT_MIN_FILE_SCORE, FileFinder};
pub use scorer::{Scorer, default_scorer, is_available};
