use std::path::PathBuf;

/// Errors that can occur across the diffscribe crates.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary reports it through `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use diffscribe_core::DiffscribeError;
///
/// let err = DiffscribeError::Config("GITHUB_TOKEN is not set".into());
/// assert!(err.to_string().contains("GITHUB_TOKEN"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DiffscribeError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(diffscribe::config),
        help("required values can be set through the environment or CLI flags; run `diffscribe doctor`")
    )]
    Config(String),

    /// The pull request event payload is missing or malformed.
    #[error("event payload error: {0}")]
    #[diagnostic(code(diffscribe::event))]
    Event(String),

    /// GitHub API failure.
    #[error("GitHub error: {0}")]
    #[diagnostic(code(diffscribe::github))]
    GitHub(String),

    /// LLM API or response error.
    #[error("LLM error: {0}")]
    #[diagnostic(code(diffscribe::llm))]
    Llm(String),

    /// The LLM kept answering 429 until the retry budget ran out.
    #[error("LLM rate limit still exceeded after {attempts} attempts")]
    #[diagnostic(
        code(diffscribe::rate_limited),
        help("lower MAX_BLOCKS or raise the batch delay")
    )]
    RateLimited {
        /// Total number of requests sent, including the first one.
        attempts: u32,
    },

    /// Patch text could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl DiffscribeError {
    /// Whether the error came from exhausting the rate-limit retry budget.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DiffscribeError::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: DiffscribeError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = DiffscribeError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn rate_limited_reports_attempts() {
        let err = DiffscribeError::RateLimited { attempts: 4 };
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("4 attempts"));
        assert!(!DiffscribeError::Llm("boom".into()).is_rate_limited());
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = DiffscribeError::FileNotFound(PathBuf::from("/tmp/event.json"));
        assert!(err.to_string().contains("/tmp/event.json"));
    }
}
