//! Approximate file lookup by name.

use super::scorer::{Scorer, default_scorer};
use crate::workspace::Exclusions;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default minimum score for a fuzzy file match.
pub const DEFAULT_MIN_FILE_SCORE: u8 = 80;

/// Bonus for candidates directly inside the search root.
pub const ROOT_LEVEL_BONUS: u16 = 10;

/// Finds the file whose name best matches an approximate path.
///
/// Only the final path component is compared, lowercased on both sides.
/// Hidden and excluded entries are never visited. Traversal is sorted by
/// file name, so the first candidate seen wins ties.
#[derive(Clone)]
pub struct FileFinder {
    scorer: Option<&'static dyn Scorer>,
    exclusions: Exclusions,
    min_score: u8,
}

impl std::fmt::Debug for FileFinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileFinder")
            .field("fuzzy", &self.scorer.is_some())
            .field("min_score", &self.min_score)
            .finish()
    }
}

impl Default for FileFinder {
    fn default() -> Self {
        Self::new(Exclusions::default())
    }
}

impl FileFinder {
    pub fn new(exclusions: Exclusions) -> Self {
        Self {
            scorer: default_scorer(),
            exclusions,
            min_score: DEFAULT_MIN_FILE_SCORE,
        }
    }

    pub fn with_min_score(mut self, min_score: u8) -> Self {
        self.min_score = min_score;
        self
    }

    /// Replace the scorer; `None` disables fuzzy lookup.
    pub fn with_scorer(mut self, scorer: Option<&'static dyn Scorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn is_available(&self) -> bool {
        self.scorer.is_some()
    }

    pub fn min_score(&self) -> u8 {
        self.min_score
    }

    /// Best-matching file under `root`, if it reaches the minimum score.
    pub fn find(&self, root: &Path, approximate: &str) -> Option<PathBuf> {
        self.find_scored(root, approximate).map(|(path, _)| path)
    }

    /// Like [`find`](Self::find), also returning the boosted score.
    pub fn find_scored(&self, root: &Path, approximate: &str) -> Option<(PathBuf, u16)> {
        let scorer = self.scorer?;
        let target = Path::new(approximate)
            .file_name()?
            .to_string_lossy()
            .to_lowercase();

        let mut best: Option<(PathBuf, u16)> = None;
        for entry in self.exclusions.walk(root) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            let mut score = u16::from(scorer.ratio(&target, &name));
            if entry.path().parent() == Some(root) {
                score += ROOT_LEVEL_BONUS;
            }
            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                best = Some((entry.into_path(), score));
            }
        }

        let (path, score) = best?;
        debug!(approximate, path = %path.display(), score, "fuzzy file candidate");
        (score >= u16::from(self.min_score)).then_some((path, score))
    }
}

#[cfg(all(test, feature = "fuzzy"))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, "").unwrap();
    }

    #[test]
    fn finds_misspelled_name() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "src/config.rs");
        touch(dir.path(), "src/lib.rs");
        let found = FileFinder::default().find(dir.path(), "src/confg.rs");
        assert_eq!(found, Some(dir.path().join("src/config.rs")));
    }

    #[test]
    fn match_is_case_insensitive() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "README.md");
        let found = FileFinder::default().find(dir.path(), "readme.md");
        assert_eq!(found, Some(dir.path().join("README.md")));
    }

    #[test]
    fn root_level_files_win_ties() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "a/notes.txt");
        touch(dir.path(), "notes.txt");
        let (path, score) = FileFinder::default()
            .find_scored(dir.path(), "notes.txt")
            .unwrap();
        assert_eq!(path, dir.path().join("notes.txt"));
        assert_eq!(score, 110);
    }

    #[test]
    fn below_threshold_returns_none() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "alpha.rs");
        touch(dir.path(), "beta.rs");
        assert_eq!(FileFinder::default().find(dir.path(), "zzzzzz.txt"), None);
    }

    #[test]
    fn skips_hidden_and_excluded() {
        let dir = tempdir().unwrap();
        touch(dir.path(), ".git/config");
        touch(dir.path(), "node_modules/config");
        assert_eq!(FileFinder::default().find(dir.path(), "config"), None);
    }

    #[test]
    fn disabled_scorer_finds_nothing() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "main.py");
        let finder = FileFinder::default().with_scorer(None);
        assert!(!finder.is_available());
        assert_eq!(finder.find(dir.path(), "main.py"), None);
    }
}
