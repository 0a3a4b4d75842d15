//! Base-directory sandbox for filesystem access.
//!
//! Every path a tool or command touches goes through [`Workspace::resolve`]
//! first: it is joined onto the base directory, normalized lexically, and
//! refused with a [`PathError`] if it escapes the base, either lexically or
//! through a symlink. Only then is the filesystem called.

use crate::error::{PathError, QuillError, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Bytes sniffed for NUL when deciding whether a file is binary.
const BINARY_SNIFF_BYTES: usize = 1024;

/// File and directory names skipped by directory walks and fuzzy search.
pub const DEFAULT_EXCLUDED_NAMES: &[&str] = &[
    ".DS_Store",
    "Thumbs.db",
    ".gitignore",
    ".python-version",
    "uv.lock",
    ".uv",
    "uvenv",
    ".uvenv",
    ".venv",
    "venv",
    "__pycache__",
    ".pytest_cache",
    ".coverage",
    ".mypy_cache",
    "node_modules",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    ".next",
    ".nuxt",
    "dist",
    "build",
    ".cache",
    ".parcel-cache",
    ".turbo",
    ".vercel",
    ".output",
    ".contentlayer",
    "out",
    "coverage",
    ".nyc_output",
    "storybook-static",
    ".env",
    ".env.local",
    ".env.development",
    ".env.production",
    ".git",
    ".svn",
    ".hg",
    "CVS",
    "target",
];

/// File suffixes skipped by directory walks and fuzzy search.
pub const DEFAULT_EXCLUDED_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".ico", ".svg", ".webp", ".avif", ".mp4", ".webm", ".mov",
    ".mp3", ".wav", ".ogg", ".zip", ".tar", ".gz", ".7z", ".rar", ".exe", ".dll", ".so", ".dylib",
    ".bin", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".pyc", ".pyo", ".pyd",
    ".egg", ".whl", ".db", ".sqlite", ".sqlite3", ".log", ".map", ".min.js", ".min.css",
    ".bundle.js", ".bundle.css", ".chunk.js", ".chunk.css", ".tmp", ".temp", ".ttf", ".otf",
    ".woff", ".woff2", ".eot",
];

// ── Exclusions ──────────────────────────────────────────────────────

/// Name and suffix filter shared by [`Workspace::walk`] and
/// [`FileFinder`](crate::fuzzy::FileFinder). Hidden entries (leading `.`) are
/// always excluded.
#[derive(Debug, Clone)]
pub struct Exclusions {
    names: Vec<String>,
    extensions: Vec<String>,
}

impl Default for Exclusions {
    fn default() -> Self {
        Self::new(
            DEFAULT_EXCLUDED_NAMES.iter().map(|s| (*s).to_string()),
            DEFAULT_EXCLUDED_EXTENSIONS.iter().map(|s| (*s).to_string()),
        )
    }
}

impl Exclusions {
    pub fn new(
        names: impl IntoIterator<Item = String>,
        extensions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            names: names.into_iter().collect(),
            extensions: extensions
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }

    /// Whether an entry with this file name should be skipped.
    pub fn is_excluded(&self, name: &str) -> bool {
        if name.starts_with('.') || self.names.iter().any(|n| n == name) {
            return true;
        }
        let lower = name.to_lowercase();
        self.extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
    }

    /// Recursive walk under `root` that prunes excluded entries. The root
    /// itself is never filtered, so walking a hidden temp dir still works.
    /// Entries are visited in file-name order within each directory.
    pub fn walk<'a>(&'a self, root: &Path) -> impl Iterator<Item = walkdir::DirEntry> + 'a {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                entry.depth() == 0 || !self.is_excluded(&entry.file_name().to_string_lossy())
            })
            .filter_map(|entry| entry.ok())
    }
}

// ── Workspace ───────────────────────────────────────────────────────

/// Files grouped by their parent directory, as produced by [`Workspace::walk`].
pub type DirListing = Vec<(PathBuf, Vec<PathBuf>)>;

/// The filesystem collaborator, rooted at a base directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    base: PathBuf,
}

impl Workspace {
    /// Create a workspace rooted at `base`. Relative bases are made absolute
    /// against the current directory; an existing base is canonicalized.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        let absolute = std::path::absolute(&base).unwrap_or(base);
        let base = fs::canonicalize(&absolute).unwrap_or_else(|_| normalize_lexically(&absolute));
        Self { base }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Normalize `path` against the base directory and refuse anything that
    /// escapes it or points into the home directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> std::result::Result<PathBuf, PathError> {
        let path = path.as_ref();
        let display = path.to_string_lossy().trim().to_string();
        if display.is_empty() {
            return Err(PathError::Empty);
        }
        if path
            .components()
            .next()
            .is_some_and(|c| c.as_os_str().to_string_lossy().starts_with('~'))
        {
            return Err(PathError::HomeReference { path: display });
        }

        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        };
        let normalized = normalize_lexically(&joined);
        let outside = || PathError::OutsideBase {
            path: display.clone(),
            base: self.base.clone(),
        };
        if !normalized.starts_with(&self.base) {
            return Err(outside());
        }
        match resolve_links(&normalized) {
            Some(real) if real.starts_with(&self.base) => Ok(normalized),
            _ => Err(outside()),
        }
    }

    /// Path relative to the base directory, for display.
    pub fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.base)
            .unwrap_or(path)
            .display()
            .to_string()
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Result<String> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full).map_err(|e| QuillError::io(full, e))
    }

    /// Read a file, refusing it if it is larger than `max_bytes` or binary.
    pub fn read_text_limited(&self, path: impl AsRef<Path>, max_bytes: u64) -> Result<String> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).map_err(|e| QuillError::io(&full, e))?;
        if meta.len() > max_bytes {
            return Err(QuillError::SizeLimit {
                what: self.display_path(&full),
                actual: meta.len(),
                limit: max_bytes,
            });
        }
        if self.is_binary(&full)? {
            return Err(QuillError::Binary { path: full });
        }
        fs::read_to_string(&full).map_err(|e| QuillError::io(full, e))
    }

    /// Write `content`, creating parent directories. Returns the resolved path.
    pub fn write(&self, path: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| QuillError::io(parent, e))?;
        }
        fs::write(&full, content).map_err(|e| QuillError::io(&full, e))?;
        Ok(full)
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> Result<bool> {
        Ok(self.resolve(path)?.exists())
    }

    pub fn is_dir(&self, path: impl AsRef<Path>) -> Result<bool> {
        Ok(self.resolve(path)?.is_dir())
    }

    /// Whether the first bytes of the file contain a NUL byte.
    pub fn is_binary(&self, path: impl AsRef<Path>) -> Result<bool> {
        let full = self.resolve(path)?;
        let mut file = fs::File::open(&full).map_err(|e| QuillError::io(&full, e))?;
        let mut buf = [0u8; BINARY_SNIFF_BYTES];
        let n = file.read(&mut buf).map_err(|e| QuillError::io(&full, e))?;
        Ok(buf.iter().take(n).any(|b| *b == 0))
    }

    /// Walk `root` recursively, skipping excluded entries, and group the
    /// files by directory. Directories appear in traversal order.
    pub fn walk(&self, root: impl AsRef<Path>, exclusions: &Exclusions) -> Result<DirListing> {
        let root = self.resolve(root)?;
        let mut groups: BTreeMap<usize, (PathBuf, Vec<PathBuf>)> = BTreeMap::new();
        let mut order: Vec<PathBuf> = Vec::new();

        for entry in exclusions.walk(&root) {
            if entry.file_type().is_dir() {
                order.push(entry.path().to_path_buf());
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(parent) = entry.path().parent() else {
                continue;
            };
            let slot = order
                .iter()
                .position(|d| d == parent)
                .unwrap_or(order.len());
            groups
                .entry(slot)
                .or_insert_with(|| (parent.to_path_buf(), Vec::new()))
                .1
                .push(entry.path().to_path_buf());
        }
        Ok(groups.into_values().collect())
    }

    /// Check that the directory exists and is writable by creating and
    /// removing a probe file.
    pub fn probe_writable(dir: &Path) -> Result<()> {
        let probe = dir.join(".quill-write-probe");
        fs::write(&probe, b"").map_err(|e| QuillError::io(&probe, e))?;
        fs::remove_file(&probe).map_err(|e| QuillError::io(&probe, e))
    }
}

/// Resolve `.` and `..` components without touching the filesystem. `..`
/// never climbs above the root.
/// Follow symlinks through the deepest existing ancestor of `path` and append
/// the components that do not exist yet. `None` when an existing entry cannot
/// be resolved, such as a dangling link.
fn resolve_links(path: &Path) -> Option<PathBuf> {
    for ancestor in path.ancestors() {
        match fs::canonicalize(ancestor) {
            Ok(real) => {
                let rest = path.strip_prefix(ancestor).ok()?;
                return Some(real.join(rest));
            }
            Err(_) if fs::symlink_metadata(ancestor).is_ok() => return None,
            Err(_) => {}
        }
    }
    Some(path.to_path_buf())
}

pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
