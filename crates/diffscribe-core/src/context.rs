//! Run context: which pull request to comment on, and the credentials
//! needed to do it.
//!
//! Values come from the GitHub Actions environment (`GITHUB_REPOSITORY`,
//! `GITHUB_TOKEN`, `OPENAI_API_KEY`, `GITHUB_EVENT_PATH`) and may be
//! overridden from the command line before [`ContextInputs::resolve`] runs.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::DiffscribeError;

/// Raw, possibly incomplete inputs for building a [`RunContext`].
///
/// # Examples
///
/// ```
/// use diffscribe_core::ContextInputs;
///
/// let inputs = ContextInputs {
///     repository: Some("octocat/hello-world".into()),
///     github_token: Some("ghp_xxx".into()),
///     openai_api_key: Some("sk-xxx".into()),
///     pr_number: Some(7),
///     ..ContextInputs::default()
/// };
/// let ctx = inputs.resolve().unwrap();
/// assert_eq!(ctx.owner, "octocat");
/// assert_eq!(ctx.pr_number, 7);
/// ```
#[derive(Clone, Default)]
pub struct ContextInputs {
    /// `owner/repo` slug.
    pub repository: Option<String>,
    /// Token for the GitHub API.
    pub github_token: Option<String>,
    /// Key for the LLM API.
    pub openai_api_key: Option<String>,
    /// Path to the JSON event payload.
    pub event_path: Option<PathBuf>,
    /// Explicit pull request number; takes precedence over the event payload.
    pub pr_number: Option<u64>,
}

impl ContextInputs {
    /// Read inputs from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read inputs from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            repository: get("GITHUB_REPOSITORY"),
            github_token: get("GITHUB_TOKEN").or_else(|| get("GH_TOKEN")),
            openai_api_key: get("OPENAI_API_KEY"),
            event_path: get("GITHUB_EVENT_PATH").map(PathBuf::from),
            pr_number: None,
        }
    }

    /// Validate the inputs and produce a complete [`RunContext`].
    ///
    /// Every missing value is reported in a single error.
    ///
    /// # Errors
    ///
    /// Returns [`DiffscribeError::Config`] listing missing variables,
    /// [`DiffscribeError::FileNotFound`] if the event payload path does not
    /// exist, or [`DiffscribeError::Event`] if the payload has no pull request
    /// number.
    pub fn resolve(self) -> Result<RunContext, DiffscribeError> {
        let mut missing = Vec::new();
        if self.repository.is_none() {
            missing.push("GITHUB_REPOSITORY");
        }
        if self.github_token.is_none() {
            missing.push("GITHUB_TOKEN");
        }
        if self.openai_api_key.is_none() {
            missing.push("OPENAI_API_KEY");
        }
        if self.pr_number.is_none() && self.event_path.is_none() {
            missing.push("GITHUB_EVENT_PATH");
        }
        let missing_error = || {
            DiffscribeError::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            ))
        };

        let (Some(repository), Some(github_token), Some(openai_api_key)) =
            (self.repository, self.github_token, self.openai_api_key)
        else {
            return Err(missing_error());
        };
        let pr_number = match (self.pr_number, self.event_path) {
            (Some(n), _) => n,
            (None, Some(path)) => pr_number_from_event(&path)?,
            (None, None) => return Err(missing_error()),
        };
        let (owner, repo) = parse_repo_slug(&repository)?;

        Ok(RunContext {
            owner,
            repo,
            pr_number,
            github_token,
            openai_api_key,
        })
    }
}

impl fmt::Debug for ContextInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextInputs")
            .field("repository", &self.repository)
            .field("github_token", &self.github_token.as_ref().map(|_| "<set>"))
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<set>"))
            .field("event_path", &self.event_path)
            .field("pr_number", &self.pr_number)
            .finish()
    }
}

/// Everything a live run needs to know about its target pull request.
#[derive(Clone)]
pub struct RunContext {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Pull request number.
    pub pr_number: u64,
    /// Token for the GitHub API.
    pub github_token: String,
    /// Key for the LLM API.
    pub openai_api_key: String,
}

impl RunContext {
    /// `owner/repo#number`, for log lines.
    pub fn pr_reference(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repo, self.pr_number)
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("pr_number", &self.pr_number)
            .field("github_token", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .finish()
    }
}

/// Split an `owner/repo` slug into its components.
///
/// # Errors
///
/// Returns [`DiffscribeError::Config`] if the slug is not of the form `owner/repo`.
///
/// # Examples
///
/// ```
/// use diffscribe_core::parse_repo_slug;
///
/// let (owner, repo) = parse_repo_slug("rust-lang/rust").unwrap();
/// assert_eq!(owner, "rust-lang");
/// assert_eq!(repo, "rust");
/// assert!(parse_repo_slug("rust").is_err());
/// ```
pub fn parse_repo_slug(slug: &str) -> Result<(String, String), DiffscribeError> {
    let invalid = || {
        DiffscribeError::Config(format!(
            "invalid repository '{slug}', expected owner/repo"
        ))
    };
    let (owner, repo) = slug.trim().split_once('/').ok_or_else(invalid)?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return Err(invalid());
    }
    Ok((owner.to_string(), repo.to_string()))
}

#[derive(Deserialize)]
struct EventPayload {
    pull_request: Option<PullRequestRef>,
    number: Option<u64>,
}

#[derive(Deserialize)]
struct PullRequestRef {
    number: u64,
}

/// Read the pull request number from a GitHub event payload file.
///
/// # Errors
///
/// Returns [`DiffscribeError::FileNotFound`] if `path` does not exist,
/// [`DiffscribeError::Io`] if it cannot be read, or the errors of
/// [`pr_number_from_payload`].
pub fn pr_number_from_event(path: &Path) -> Result<u64, DiffscribeError> {
    if !path.exists() {
        return Err(DiffscribeError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    pr_number_from_payload(&content)
}

/// Extract the pull request number from event payload JSON.
///
/// `pull_request.number` is preferred; a top-level `number` is accepted
/// as a fallback.
///
/// # Errors
///
/// Returns [`DiffscribeError::Serialization`] for invalid JSON, or
/// [`DiffscribeError::Event`] when the payload carries no number.
///
/// # Examples
///
/// ```
/// use diffscribe_core::pr_number_from_payload;
///
/// let n = pr_number_from_payload(r#"{"action":"opened","pull_request":{"number":42}}"#).unwrap();
/// assert_eq!(n, 42);
/// ```
pub fn pr_number_from_payload(json: &str) -> Result<u64, DiffscribeError> {
    let payload: EventPayload = serde_json::from_str(json)?;
    payload
        .pull_request
        .map(|pr| pr.number)
        .or(payload.number)
        .ok_or_else(|| {
            DiffscribeError::Event("payload has no pull_request.number; not a pull request event?".into())
        })
}
