//! Pre-LLM file filtering.
//!
//! Keeps only changed files whose extension is on the review allow-list and
//! drops lock files, vendored dependencies, and paths matching custom glob
//! patterns before any tokens are spent on them.

use std::fmt;

use diffscribe_core::{ChangedFile, DiffscribeError, ReviewConfig};

/// Decides which changed files are worth sending to the LLM.
///
/// # Examples
///
/// ```
/// use diffscribe_difflens::filter::FileFilter;
///
/// let filter = FileFilter::with_extensions(&["py", "rs"]);
/// assert!(!filter.should_skip("src/main.rs"));
/// assert!(filter.should_skip("README.md"));
/// assert!(filter.should_skip("Cargo.lock"));
/// ```
pub struct FileFilter {
    extensions: Vec<String>,
    skip_patterns: Vec<glob::Pattern>,
}

impl FileFilter {
    /// A filter that only applies the built-in lock-file and vendor rules.
    pub fn allow_all() -> Self {
        Self {
            extensions: Vec::new(),
            skip_patterns: Vec::new(),
        }
    }

    /// A filter restricted to the given extensions (with or without a leading dot).
    pub fn with_extensions(extensions: &[&str]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| normalize_ext(e)).collect(),
            skip_patterns: Vec::new(),
        }
    }

    /// Create a filter from review configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DiffscribeError::Config`] if a skip pattern is not a valid glob.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscribe_core::ReviewConfig;
    /// use diffscribe_difflens::filter::FileFilter;
    ///
    /// let config = ReviewConfig {
    ///     skip_patterns: vec!["migrations/**".into()],
    ///     ..ReviewConfig::default()
    /// };
    /// let filter = FileFilter::from_config(&config).unwrap();
    /// assert!(filter.should_skip("migrations/0001_init.py"));
    /// assert!(!filter.should_skip("app/models.py"));
    /// ```
    pub fn from_config(config: &ReviewConfig) -> Result<Self, DiffscribeError> {
        let mut skip_patterns = Vec::with_capacity(config.skip_patterns.len());
        for pat in &config.skip_patterns {
            let compiled = glob::Pattern::new(pat).map_err(|e| {
                DiffscribeError::Config(format!("invalid skip pattern '{pat}': {e}"))
            })?;
            skip_patterns.push(compiled);
        }

        Ok(Self {
            extensions: config.extensions.iter().map(|e| normalize_ext(e)).collect(),
            skip_patterns,
        })
    }

    /// Check if a single path should be skipped.
    pub fn should_skip(&self, path: &str) -> bool {
        self.check(path).is_some()
    }

    /// Return why `path` would be skipped, or `None` if it is reviewable.
    pub fn check(&self, path: &str) -> Option<SkipReason> {
        if path.trim().is_empty() {
            return Some(SkipReason::EmptyFilename);
        }

        let file_name = path.rsplit('/').next().unwrap_or(path);

        if is_lock_file(file_name) {
            return Some(SkipReason::LockFile);
        }

        if is_vendored(path) {
            return Some(SkipReason::VendoredCode);
        }

        for pat in &self.skip_patterns {
            if pat.matches(path) {
                return Some(SkipReason::PatternMatch(pat.to_string()));
            }
        }

        if !self.extensions.is_empty() {
            let ext = extension_of(file_name).map(str::to_ascii_lowercase);
            match ext {
                Some(ext) if self.extensions.contains(&ext) => {}
                other => return Some(SkipReason::Extension(other)),
            }
        }

        None
    }

    /// Split changed files into reviewable and skipped ones, keeping order.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscribe_core::ChangedFile;
    /// use diffscribe_difflens::filter::FileFilter;
    ///
    /// let files = vec![
    ///     ChangedFile::new("app.py", Some("@@ -0,0 +1 @@\n+x".into())),
    ///     ChangedFile::new("logo.svg", None),
    /// ];
    /// let result = FileFilter::with_extensions(&["py"]).filter(files);
    /// assert_eq!(result.kept.len(), 1);
    /// assert_eq!(result.skipped[0].filename, "logo.svg");
    /// ```
    pub fn filter(&self, files: Vec<ChangedFile>) -> FilterResult {
        let mut kept = Vec::new();
        let mut skipped = Vec::new();

        for file in files {
            match self.check(&file.filename) {
                Some(reason) => skipped.push(SkippedFile {
                    filename: file.filename,
                    reason,
                }),
                None => kept.push(file),
            }
        }

        FilterResult { kept, skipped }
    }
}

/// Result of filtering changed files.
#[derive(Debug, Clone, Default)]
pub struct FilterResult {
    /// Files that passed the filter.
    pub kept: Vec<ChangedFile>,
    /// Files that were skipped with reasons.
    pub skipped: Vec<SkippedFile>,
}

/// A file that was skipped during filtering.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    /// Path of the skipped file.
    pub filename: String,
    /// Why the file was skipped.
    #[serde(serialize_with = "serialize_display")]
    pub reason: SkipReason,
}

fn serialize_display<S: serde::Serializer>(reason: &SkipReason, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(reason)
}

/// Reason a file was skipped.
///
/// # Examples
///
/// ```
/// use diffscribe_difflens::filter::SkipReason;
///
/// assert_eq!(SkipReason::LockFile.to_string(), "lock file");
/// assert_eq!(SkipReason::Extension(Some("md".into())).to_string(), "extension .md not reviewed");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The API returned an entry without a filename.
    EmptyFilename,
    /// Package manager lock file.
    LockFile,
    /// Third-party vendored code.
    VendoredCode,
    /// Extension not on the allow-list (`None` for files without one).
    Extension(Option<String>),
    /// Matched a custom skip pattern.
    PatternMatch(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptyFilename => write!(f, "empty filename"),
            SkipReason::LockFile => write!(f, "lock file"),
            SkipReason::VendoredCode => write!(f, "vendored code"),
            SkipReason::Extension(Some(ext)) => write!(f, "extension .{ext} not reviewed"),
            SkipReason::Extension(None) => write!(f, "no file extension"),
            SkipReason::PatternMatch(pat) => write!(f, "pattern: {pat}"),
        }
    }
}

const LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "Cargo.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "Gemfile.lock",
    "composer.lock",
    "go.sum",
];

fn is_lock_file(file_name: &str) -> bool {
    LOCK_FILES.contains(&file_name)
}

fn is_vendored(path: &str) -> bool {
    path.split('/')
        .any(|part| part == "vendor" || part == "third_party" || part == "node_modules")
}

fn extension_of(file_name: &str) -> Option<&str> {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

fn normalize_ext(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> ChangedFile {
        ChangedFile::new(name, Some("@@ -0,0 +1 @@\n+x".into()))
    }

    #[test]
    fn lock_files_skipped_even_when_extension_allowed() {
        let filter = FileFilter::with_extensions(&["json", "lock", "yaml", "sum"]);
        for name in LOCK_FILES {
            assert_eq!(filter.check(name), Some(SkipReason::LockFile), "{name}");
        }
    }

    #[test]
    fn vendored_code_skipped() {
        let filter = FileFilter::allow_all();
        for path in ["vendor/lib.go", "a/third_party/dep.rs", "node_modules/pkg/index.js"] {
            assert_eq!(filter.check(path), Some(SkipReason::VendoredCode), "{path}");
        }
    }

    #[test]
    fn extension_allow_list_is_case_insensitive_and_dot_tolerant() {
        let filter = FileFilter::with_extensions(&[".PY", "ts"]);
        assert!(!filter.should_skip("pkg/Module.py"));
        assert!(!filter.should_skip("web/App.TS"));
        assert_eq!(
            filter.check("docs/guide.md"),
            Some(SkipReason::Extension(Some("md".into())))
        );
        assert_eq!(filter.check("Makefile"), Some(SkipReason::Extension(None)));
        assert_eq!(filter.check(".env"), Some(SkipReason::Extension(None)));
    }

    #[test]
    fn empty_allow_list_keeps_every_extension() {
        let filter = FileFilter::allow_all();
        assert!(!filter.should_skip("docs/guide.md"));
        assert!(!filter.should_skip("Makefile"));
    }

    #[test]
    fn empty_filename_is_skipped() {
        assert_eq!(
            FileFilter::allow_all().check(""),
            Some(SkipReason::EmptyFilename)
        );
    }

    #[test]
    fn custom_patterns_from_config() {
        let config = ReviewConfig {
            skip_patterns: vec!["*.test.ts".into(), "fixtures/**".into()],
            ..ReviewConfig::default()
        };
        let filter = FileFilter::from_config(&config).unwrap();
        assert!(matches!(
            filter.check("auth.test.ts"),
            Some(SkipReason::PatternMatch(_))
        ));
        assert!(filter.should_skip("fixtures/data/a.py"));
        assert!(!filter.should_skip("src/auth.ts"));
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let config = ReviewConfig {
            skip_patterns: vec!["src/[ab.rs".into()],
            ..ReviewConfig::default()
        };
        assert!(matches!(
            FileFilter::from_config(&config),
            Err(DiffscribeError::Config(_))
        ));
    }

    #[test]
    fn filter_preserves_order_and_reasons() {
        let filter = FileFilter::with_extensions(&["py"]);
        let result = filter.filter(vec![
            file("b.py"),
            file("yarn.lock"),
            file("a.py"),
            file("notes.txt"),
        ]);
        let kept: Vec<_> = result.kept.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(kept, vec!["b.py", "a.py"]);
        assert_eq!(result.skipped.len(), 2);
        assert_eq!(result.skipped[0].reason, SkipReason::LockFile);
    }

    #[test]
    fn skipped_file_serializes_reason_as_text() {
        let skipped = SkippedFile {
            filename: "go.sum".into(),
            reason: SkipReason::LockFile,
        };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["reason"], "lock file");
    }
}
