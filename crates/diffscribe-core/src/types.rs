use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A file changed by a pull request, as listed by the GitHub
/// "list pull request files" endpoint.
///
/// Field names follow the GitHub payload so entries deserialize verbatim.
///
/// # Examples
///
/// ```
/// use diffscribe_core::{ChangedFile, FileStatus};
///
/// let json = r#"{"filename":"src/app.py","status":"modified","additions":3,"deletions":1,"patch":"@@ -1 +1 @@\n-a\n+b"}"#;
/// let file: ChangedFile = serde_json::from_str(json).unwrap();
/// assert_eq!(file.status, FileStatus::Modified);
/// assert!(file.has_patch());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Path of the file relative to the repository root.
    pub filename: String,
    /// How the file changed.
    #[serde(default)]
    pub status: FileStatus,
    /// Number of added lines.
    #[serde(default)]
    pub additions: u64,
    /// Number of removed lines.
    #[serde(default)]
    pub deletions: u64,
    /// Unified-diff hunks for the file. GitHub omits this for binary files
    /// and for diffs that are too large.
    #[serde(default)]
    pub patch: Option<String>,
}

impl ChangedFile {
    /// Create a modified-file record with the given patch.
    pub fn new(filename: impl Into<String>, patch: Option<String>) -> Self {
        Self {
            filename: filename.into(),
            status: FileStatus::Modified,
            additions: 0,
            deletions: 0,
            patch,
        }
    }

    /// Returns `true` when there is non-blank patch text to review.
    pub fn has_patch(&self) -> bool {
        self.patch.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    /// File extension without the leading dot, if any.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscribe_core::ChangedFile;
    ///
    /// assert_eq!(ChangedFile::new("lib/a.rs", None).extension(), Some("rs"));
    /// assert_eq!(ChangedFile::new("Makefile", None).extension(), None);
    /// ```
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
    }
}

/// Change status reported by GitHub for a pull request file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    Removed,
    #[default]
    Modified,
    Renamed,
    Copied,
    Changed,
    Unchanged,
    /// Any status this version does not know about.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileStatus::Added => "added",
            FileStatus::Removed => "removed",
            FileStatus::Modified => "modified",
            FileStatus::Renamed => "renamed",
            FileStatus::Copied => "copied",
            FileStatus::Changed => "changed",
            FileStatus::Unchanged => "unchanged",
            FileStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Granularity at which diffs are sent to the LLM.
///
/// # Examples
///
/// ```
/// use diffscribe_core::ReviewMode;
///
/// let mode: ReviewMode = "blocks".parse().unwrap();
/// assert_eq!(mode, ReviewMode::Blocks);
/// assert_eq!(ReviewMode::default(), ReviewMode::File);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    /// One LLM call and one comment per changed file.
    #[default]
    File,
    /// One LLM call and one comment per block of added code.
    Blocks,
}

impl fmt::Display for ReviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewMode::File => write!(f, "file"),
            ReviewMode::Blocks => write!(f, "blocks"),
        }
    }
}

impl FromStr for ReviewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" | "files" => Ok(ReviewMode::File),
            "block" | "blocks" => Ok(ReviewMode::Blocks),
            other => Err(format!("unknown review mode: {other}")),
        }
    }
}

/// Output format for the run summary.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use diffscribe_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
