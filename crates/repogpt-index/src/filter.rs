//! Path deny-list filtering applied before any content is fetched.

use std::collections::HashSet;

/// Directory names that never contain hand-written source.
pub const DEFAULT_EXCLUDED_FOLDERS: &[&str] = &[
    "node_modules",
    "__pycache__",
    "venv",
    "dist",
    "build",
    "target",
    "bin",
    "obj",
    "coverage",
    "debug",
    "release",
    ".idea",
    ".vscode",
    "tmp",
    "deploy",
    ".git",
    ".svn",
    ".hg",
    ".cache",
    ".gradle",
    ".maven",
    ".npm",
    ".sass-cache",
    "bower_components",
    ".next",
    ".nuxt",
    "vendor",
];

/// File-name suffixes for binaries, archives, media, lock files and build output.
pub const DEFAULT_EXCLUDED_SUFFIXES: &[&str] = &[
    ".log",
    ".bak",
    ".swp",
    ".swo",
    ".zip",
    ".tar.gz",
    ".tar.bz2",
    ".tar",
    ".exe",
    ".dll",
    ".so",
    ".pdb",
    ".pyc",
    ".pyo",
    ".class",
    ".obj",
    ".out",
    ".a",
    ".o",
    ".db",
    ".dat",
    ".iml",
    ".sublime-workspace",
    ".sublime-project",
    ".woff",
    ".ico",
    ".png",
    ".jpg",
    ".jpeg",
    ".mkv",
    ".mp4",
    ".mp3",
    ".min.js",
    ".min.css",
    ".map",
    ".gif",
    ".svg",
    ".pdf",
    ".doc",
    ".docx",
    ".xls",
    ".xlsx",
    ".ppt",
    ".pptx",
    "package-lock.json",
    "yarn.lock",
    ".iso",
    ".bin",
    ".jar",
    ".war",
    ".ear",
];

/// Classifies repository paths as includable or excluded.
#[derive(Debug, Clone)]
pub struct PathFilter {
    folders: HashSet<String>,
    suffixes: Vec<String>,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self::new(
            DEFAULT_EXCLUDED_FOLDERS.iter().copied(),
            DEFAULT_EXCLUDED_SUFFIXES.iter().copied(),
        )
    }
}

impl PathFilter {
    /// Build a filter from folder names and file suffixes.
    ///
    /// Suffixes are matched case-insensitively; a leading `*` glob marker is
    /// accepted and ignored.
    pub fn new<F, S>(folders: F, suffixes: S) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let folders = folders
            .into_iter()
            .map(Into::into)
            .filter(|f: &String| !f.is_empty())
            .collect();
        let suffixes = suffixes
            .into_iter()
            .map(|s| s.as_ref().trim_start_matches('*').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self { folders, suffixes }
    }

    /// Add extra deny entries on top of the current ones.
    #[must_use]
    pub fn extend<F, S>(mut self, folders: F, suffixes: S) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let extra = Self::new(folders, suffixes);
        self.folders.extend(extra.folders);
        self.suffixes.extend(extra.suffixes);
        self
    }

    #[must_use]
    pub fn is_included(&self, path: &str) -> bool {
        if path.split('/').any(|segment| self.folders.contains(segment)) {
            return false;
        }

        let file_name = path.rsplit('/').next().unwrap_or(path).to_lowercase();
        !self
            .suffixes
            .iter()
            .any(|suffix| file_name.ends_with(suffix.as_str()))
    }
}
