//! Similarity scoring on a 0 to 100 scale.

/// Normalized edit-distance similarity between two strings.
///
/// Scores are case-sensitive; callers that want case-insensitive matching
/// (file names) lowercase both sides first.
pub trait Scorer: Send + Sync {
    /// Similarity of `a` and `b`, where 100 means identical.
    fn ratio(&self, a: &str, b: &str) -> u8;
}

/// Character-level diff ratio from the `similar` crate.
#[cfg(feature = "fuzzy")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarScorer;

#[cfg(feature = "fuzzy")]
impl Scorer for SimilarScorer {
    fn ratio(&self, a: &str, b: &str) -> u8 {
        if a == b {
            return 100;
        }
        let ratio = similar::TextDiff::from_chars(a, b).ratio();
        (ratio * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

/// The scorer compiled into this build, if any.
pub fn default_scorer() -> Option<&'static dyn Scorer> {
    #[cfg(feature = "fuzzy")]
    {
        static SCORER: SimilarScorer = SimilarScorer;
        Some(&SCORER)
    }
    #[cfg(not(feature = "fuzzy"))]
    {
        None
    }
}

/// Whether fuzzy matching is available in this build.
pub fn is_available() -> bool {
    default_scorer().is_some()
}
