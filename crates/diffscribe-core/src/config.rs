use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DiffscribeError;
use crate::types::ReviewMode;

/// Top-level configuration loaded from `.diffscribe.toml`.
///
/// Supports layered resolution: CLI flags > env vars > config file > defaults.
///
/// # Examples
///
/// ```
/// use diffscribe_core::DiffscribeConfig;
///
/// let config = DiffscribeConfig::default();
/// assert_eq!(config.review.max_items, 5);
/// assert_eq!(config.llm.model, "gpt-4o-mini");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffscribeConfig {
    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// What gets reviewed and how fast.
    #[serde(default)]
    pub review: ReviewConfig,
    /// Rate-limit retry policy for LLM calls.
    #[serde(default)]
    pub retry: RetryConfig,
    /// GitHub API settings.
    #[serde(default)]
    pub github: GitHubConfig,
}

impl DiffscribeConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DiffscribeError::Io`] if the file cannot be read, or
    /// [`DiffscribeError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use diffscribe_core::DiffscribeConfig;
    /// use std::path::Path;
    ///
    /// let config = DiffscribeConfig::from_file(Path::new(".diffscribe.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, DiffscribeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DiffscribeError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscribe_core::DiffscribeConfig;
    ///
    /// let toml = r#"
    /// [review]
    /// max_items = 10
    /// "#;
    /// let config = DiffscribeConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.review.max_items, 10);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, DiffscribeError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Overlay values from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`DiffscribeError::Config`] if a variable is set to an
    /// unparsable value.
    pub fn apply_env(&mut self) -> Result<(), DiffscribeError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup.
    ///
    /// Recognized variables: `MAX_BLOCKS`, `DIFFSCRIBE_MODE`,
    /// `DIFFSCRIBE_BATCH_SIZE`, `DIFFSCRIBE_BATCH_DELAY_SECS`,
    /// `DIFFSCRIBE_MAX_RETRIES`, `OPENAI_MODEL`, `OPENAI_BASE_URL` and
    /// `GITHUB_API_URL`. Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DiffscribeError::Config`] if a numeric or enum variable
    /// cannot be parsed.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscribe_core::{DiffscribeConfig, ReviewMode};
    ///
    /// let mut config = DiffscribeConfig::default();
    /// config
    ///     .apply_env_with(|key| match key {
    ///         "MAX_BLOCKS" => Some("2".into()),
    ///         "DIFFSCRIBE_MODE" => Some("blocks".into()),
    ///         _ => None,
    ///     })
    ///     .unwrap();
    /// assert_eq!(config.review.max_items, 2);
    /// assert_eq!(config.review.mode, ReviewMode::Blocks);
    /// ```
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), DiffscribeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("MAX_BLOCKS") {
            self.review.max_items = parse_env("MAX_BLOCKS", &v)?;
        }
        if let Some(v) = get("DIFFSCRIBE_MODE") {
            self.review.mode = v
                .parse()
                .map_err(|e| DiffscribeError::Config(format!("DIFFSCRIBE_MODE: {e}")))?;
        }
        if let Some(v) = get("DIFFSCRIBE_BATCH_SIZE") {
            self.review.batch_size = parse_env("DIFFSCRIBE_BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("DIFFSCRIBE_BATCH_DELAY_SECS") {
            self.review.batch_delay_secs = parse_env("DIFFSCRIBE_BATCH_DELAY_SECS", &v)?;
        }
        if let Some(v) = get("DIFFSCRIBE_MAX_RETRIES") {
            self.retry.max_retries = parse_env("DIFFSCRIBE_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = get("GITHUB_API_URL") {
            self.github.api_url = Some(v);
        }
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`DiffscribeError::Config`] describing the first violation.
    pub fn validate(&self) -> Result<(), DiffscribeError> {
        if self.review.batch_size == 0 {
            return Err(DiffscribeError::Config(
                "review.batch_size must be at least 1".into(),
            ));
        }
        if self.llm.max_tokens == 0 {
            return Err(DiffscribeError::Config(
                "llm.max_tokens must be at least 1".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(DiffscribeError::Config(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DiffscribeError> {
    value.trim().parse().map_err(|_| {
        DiffscribeError::Config(format!("{key} must be a non-negative integer, got '{value}'"))
    })
}

/// LLM provider configuration.
///
/// # Examples
///
/// ```
/// use diffscribe_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "gpt-4o-mini");
/// assert_eq!(config.max_tokens, 400);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Custom base URL for an OpenAI-compatible endpoint.
    pub base_url: Option<String>,
    /// Completion token limit per request.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

fn default_max_tokens() -> u32 {
    400
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Review behavior configuration.
///
/// # Examples
///
/// ```
/// use diffscribe_core::{ReviewConfig, ReviewMode};
///
/// let config = ReviewConfig::default();
/// assert_eq!(config.mode, ReviewMode::File);
/// assert_eq!(config.max_items, 5);
/// assert_eq!(config.batch_size, 3);
/// assert_eq!(config.batch_delay_secs, 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Review whole files or individual blocks of added code.
    #[serde(default)]
    pub mode: ReviewMode,
    /// Cap on files (file mode) or blocks (block mode) processed per run.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Items processed between pauses.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between batches, in seconds.
    #[serde(default = "default_batch_delay_secs")]
    pub batch_delay_secs: u64,
    /// Blocks with fewer non-blank lines are not sent.
    #[serde(default = "default_min_block_lines")]
    pub min_block_lines: usize,
    /// File extensions to review. Empty means every extension.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Glob patterns for paths that are never reviewed.
    #[serde(default)]
    pub skip_patterns: Vec<String>,
}

fn default_max_items() -> usize {
    5
}

fn default_batch_size() -> usize {
    3
}

fn default_batch_delay_secs() -> u64 {
    20
}

fn default_min_block_lines() -> usize {
    1
}

fn default_extensions() -> Vec<String> {
    [
        "py", "js", "ts", "tsx", "jsx", "rs", "go", "java", "kt", "c", "h", "cpp", "hpp", "cs",
        "rb", "php", "swift", "scala", "sh",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

impl ReviewConfig {
    /// Pause between batches as a [`Duration`].
    pub fn batch_delay(&self) -> Duration {
        Duration::from_secs(self.batch_delay_secs)
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            mode: ReviewMode::default(),
            max_items: default_max_items(),
            batch_size: default_batch_size(),
            batch_delay_secs: default_batch_delay_secs(),
            min_block_lines: default_min_block_lines(),
            extensions: default_extensions(),
            skip_patterns: Vec::new(),
        }
    }
}

/// Retry policy for rate-limited LLM calls.
///
/// The wait before retry `n` (1-based) is `n * base_delay_secs`.
///
/// # Examples
///
/// ```
/// use diffscribe_core::RetryConfig;
///
/// let config = RetryConfig::default();
/// assert_eq!(config.max_retries, 3);
/// assert_eq!(config.base_delay_secs, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first 429 response.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Linear backoff step, in seconds.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_secs() -> u64 {
    10
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay_secs(),
        }
    }
}

/// GitHub API configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// API base URL for GitHub Enterprise Server. Defaults to `https://api.github.com`.
    pub api_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_string())
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = DiffscribeConfig::default();
        assert_eq!(config.review.max_items, 5);
        assert_eq!(config.review.batch_size, 3);
        assert_eq!(config.review.batch_delay_secs, 20);
        assert_eq!(config.review.min_block_lines, 1);
        assert!(config.review.extensions.contains(&"py".to_string()));
        assert!(config.review.skip_patterns.is_empty());
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 400);
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay_secs, 10);
        assert!(config.github.api_url.is_none());
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[llm]
model = "gpt-4o"
base_url = "http://localhost:11434"
max_tokens = 800
temperature = 0.0

[review]
mode = "blocks"
max_items = 12
batch_size = 4
batch_delay_secs = 5
extensions = ["rs"]
skip_patterns = ["migrations/**"]

[retry]
max_retries = 5
base_delay_secs = 2

[github]
api_url = "https://ghe.example.com/api/v3"
"#;
        let config = DiffscribeConfig::from_toml(toml).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.max_tokens, 800);
        assert_eq!(config.review.mode, ReviewMode::Blocks);
        assert_eq!(config.review.max_items, 12);
        assert_eq!(config.review.extensions, vec!["rs"]);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(
            config.github.api_url.as_deref(),
            Some("https://ghe.example.com/api/v3")
        );
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = DiffscribeConfig::from_toml("").unwrap();
        assert_eq!(config.review.max_items, 5);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = DiffscribeConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = DiffscribeConfig::from_toml("[review]\nmax_items = 9\n").unwrap();
        config
            .apply_env_with(lookup(&[
                ("MAX_BLOCKS", "3"),
                ("OPENAI_BASE_URL", "http://127.0.0.1:8080"),
                ("DIFFSCRIBE_MAX_RETRIES", "1"),
            ]))
            .unwrap();
        assert_eq!(config.review.max_items, 3);
        assert_eq!(config.llm.base_url.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(config.retry.max_retries, 1);
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut config = DiffscribeConfig::default();
        config
            .apply_env_with(lookup(&[("MAX_BLOCKS", ""), ("OPENAI_MODEL", "  ")]))
            .unwrap();
        assert_eq!(config.review.max_items, 5);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn non_numeric_max_blocks_is_config_error() {
        let mut config = DiffscribeConfig::default();
        let err = config
            .apply_env_with(lookup(&[("MAX_BLOCKS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, DiffscribeError::Config(_)));
        assert!(err.to_string().contains("MAX_BLOCKS"));
    }

    #[test]
    fn zero_batch_size_fails_validation() {
        let mut config = DiffscribeConfig::default();
        config.review.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_temperature_fails_validation() {
        let mut config = DiffscribeConfig::default();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_validates() {
        assert!(DiffscribeConfig::default().validate().is_ok());
    }
}
