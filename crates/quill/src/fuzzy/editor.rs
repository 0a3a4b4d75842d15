//! Snippet replacement with a fuzzy line-window fallback.

use super::scorer::{Scorer, default_scorer};
use crate::error::EditError;
use tracing::debug;

/// Default minimum score for a fuzzy snippet match.
pub const DEFAULT_MIN_SNIPPET_SCORE: u8 = 85;

/// Replaces a snippet of file content with new text.
///
/// A snippet that occurs exactly once is replaced directly. Otherwise every
/// run of consecutive lines as long as the snippet is scored against it, and
/// the best window is replaced if it reaches the minimum score and its text
/// is not repeated among the windows. Pure: no I/O.
#[derive(Clone)]
pub struct SnippetEditor {
    scorer: Option<&'static dyn Scorer>,
    min_score: u8,
}

impl std::fmt::Debug for SnippetEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnippetEditor")
            .field("fuzzy", &self.scorer.is_some())
            .field("min_score", &self.min_score)
            .finish()
    }
}

impl Default for SnippetEditor {
    fn default() -> Self {
        Self {
            scorer: default_scorer(),
            min_score: DEFAULT_MIN_SNIPPET_SCORE,
        }
    }
}

impl SnippetEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_score(mut self, min_score: u8) -> Self {
        self.min_score = min_score;
        self
    }

    /// Replace the scorer; `None` restricts the editor to exact matches.
    pub fn with_scorer(mut self, scorer: Option<&'static dyn Scorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn is_fuzzy(&self) -> bool {
        self.scorer.is_some()
    }

    pub fn min_score(&self) -> u8 {
        self.min_score
    }

    pub fn apply(&self, content: &str, original: &str, new: &str) -> Result<String, EditError> {
        if original.is_empty() {
            return Err(EditError::EmptySnippet);
        }

        if content.matches(original).count() == 1 {
            return Ok(content.replacen(original, new, 1));
        }

        let Some(scorer) = self.scorer else {
            return Err(EditError::NotFound {
                snippet: original.to_string(),
            });
        };

        let lines: Vec<&str> = content.split('\n').collect();
        let k = original.split('\n').count();
        if lines.len() < k {
            return Err(EditError::ContentTooShort {
                snippet_lines: k,
                content_lines: lines.len(),
            });
        }

        let windows: Vec<String> = lines.windows(k).map(|w| w.join("\n")).collect();
        let mut best_index = 0;
        let mut best_score = 0u8;
        for (i, window) in windows.iter().enumerate() {
            let score = scorer.ratio(original, window);
            if i == 0 || score > best_score {
                best_index = i;
                best_score = score;
            }
        }
        let best = &windows[best_index];
        debug!(
            score = best_score,
            min_score = self.min_score,
            window = best_index,
            "fuzzy snippet match"
        );

        if best_score < self.min_score {
            return Err(EditError::BelowThreshold {
                score: best_score,
                min_score: self.min_score,
                snippet: original.to_string(),
                best_match: best.clone(),
            });
        }

        let duplicates = windows.iter().filter(|w| *w == best).count();
        if duplicates > 1 {
            return Err(EditError::Ambiguous {
                occurrences: duplicates,
                snippet: original.to_string(),
                best_match: best.clone(),
            });
        }

        Ok(content.replacen(best.as_str(), new, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_single_occurrence_is_replaced() {
        let content = "fn a() {}\nfn b() {}\n";
        let out = SnippetEditor::new()
            .apply(content, "fn b() {}", "fn b() { todo!() }")
            .unwrap();
        assert_eq!(out, "fn a() {}\nfn b() { todo!() }\n");
    }

    #[test]
    fn exact_match_works_without_scorer() {
        let editor = SnippetEditor::new().with_scorer(None);
        assert_eq!(editor.apply("x = 1", "1", "2").unwrap(), "x = 2");
    }

    #[test]
    fn empty_snippet_is_rejected() {
        assert_eq!(
            SnippetEditor::new().apply("abc", "", "x"),
            Err(EditError::EmptySnippet)
        );
    }

    #[cfg(feature = "fuzzy")]
    #[test]
    fn repeated_exact_snippet_is_ambiguous() {
        let err = SnippetEditor::new()
            .apply("let x = 1;\nlet x = 1;\n", "let x = 1;", "let y = 2;")
            .unwrap_err();
        assert_eq!(
            err,
            EditError::Ambiguous {
                occurrences: 2,
                snippet: "let x = 1;".into(),
                best_match: "let x = 1;".into(),
            }
        );
    }

    #[cfg(feature = "fuzzy")]
    #[test]
    fn repeated_substring_with_one_whole_line_is_replaced() {
        let out = SnippetEditor::new()
            .apply("let x = 1;\nlet x = 1; // b\n", "let x = 1;", "let y = 2;")
            .unwrap();
        assert_eq!(out, "let y = 2;\nlet x = 1; // b\n");
    }

    #[test]
    fn repeated_snippet_without_scorer_is_not_found() {
        let editor = SnippetEditor::new().with_scorer(None);
        let err = editor.apply("ab ab", "ab", "c").unwrap_err();
        assert_eq!(err, EditError::NotFound { snippet: "ab".into() });
    }

    #[cfg(feature = "fuzzy")]
    #[test]
    fn snippet_with_trailing_newline_spans_whole_lines() {
        let content = "fn b() {\n    two();\n}\nfn a() {\n    one();\n}\n";
        let snippet = "fn a() {\n    onee();\n}\n";
        let out = SnippetEditor::new()
            .apply(content, snippet, "fn a() {\n    three();\n}\n")
            .unwrap();
        assert_eq!(out, "fn b() {\n    two();\n}\nfn a() {\n    three();\n}\n");
    }

    #[test]
    fn missing_snippet_without_scorer_is_not_found() {
        let editor = SnippetEditor::new().with_scorer(None);
        let err = editor.apply("abc", "xyz", "q").unwrap_err();
        assert_eq!(
            err,
            EditError::NotFound {
                snippet: "xyz".into()
            }
        );
    }

    #[cfg(feature = "fuzzy")]
    #[test]
    fn fuzzy_replaces_close_window() {
        let content = "def greet(name):\n    print('hello', name)\n    return None\n";
        let snippet = "def greet(name):\n    print('helo', name)";
        let out = SnippetEditor::new()
            .apply(content, snippet, "def greet(name):\n    print('hi', name)")
            .unwrap();
        assert_eq!(out, "def greet(name):\n    print('hi', name)\n    return None\n");
    }

    #[cfg(feature = "fuzzy")]
    #[test]
    fn unrelated_snippet_is_below_threshold() {
        let err = SnippetEditor::new()
            .apply("a\nb\nc\nd", "x\ny", "z")
            .unwrap_err();
        match err {
            EditError::BelowThreshold {
                score,
                min_score,
                snippet,
                best_match,
            } => {
                assert!(score < 85);
                assert_eq!(min_score, 85);
                assert_eq!(snippet, "x\ny");
                assert_eq!(best_match, "a\nb");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(feature = "fuzzy")]
    #[test]
    fn duplicated_best_window_is_ambiguous() {
        let content = "if ok {\n    run();\n}\nif ok {\n    run();\n}";
        let err = SnippetEditor::new()
            .apply(content, "if ok {\n    runn();", "x")
            .unwrap_err();
        match err {
            EditError::Ambiguous {
                occurrences,
                best_match,
                ..
            } => {
                assert_eq!(occurrences, 2);
                assert_eq!(best_match, "if ok {\n    run();");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(feature = "fuzzy")]
    #[test]
    fn snippet_longer_than_content_is_too_short() {
        let err = SnippetEditor::new()
            .apply("one line", "a\nb\nc", "x")
            .unwrap_err();
        assert_eq!(
            err,
            EditError::ContentTooShort {
                snippet_lines: 3,
                content_lines: 1
            }
        );
    }
}
