use async_trait::async_trait;
use diffscribe_core::{ChangedFile, DiffscribeError, RunContext};
use serde::Serialize;
use tracing::debug;

use crate::backend::PullRequestHost;

/// GitHub caps `per_page` at 100 for the pull request files endpoint.
const PER_PAGE: u8 = 100;
/// The files endpoint returns at most 3000 files.
const MAX_PAGES: u32 = 30;

#[derive(Serialize)]
struct PageParams {
    per_page: u8,
    page: u32,
}

/// Thin GitHub REST client for the two endpoints a review needs.
///
/// # Examples
///
/// ```no_run
/// # async fn demo() -> Result<(), diffscribe_core::DiffscribeError> {
/// use diffscribe_review::github::GitHubClient;
///
/// let client = GitHubClient::new("ghp_xxxx", None)?;
/// let files = client.list_pr_files("octocat", "hello-world", 42).await?;
/// println!("{} files changed", files.len());
/// # Ok(())
/// # }
/// ```
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
}

impl GitHubClient {
    /// Create a client authenticated with `token`.
    ///
    /// `api_url` overrides `https://api.github.com`, for GitHub Enterprise
    /// Server or tests.
    ///
    /// # Errors
    ///
    /// Returns [`DiffscribeError::Config`] if `api_url` is not a valid URI, or
    /// [`DiffscribeError::GitHub`] if the client cannot be built.
    pub fn new(token: &str, api_url: Option<&str>) -> Result<Self, DiffscribeError> {
        let mut builder = octocrab::Octocrab::builder().personal_token(token.to_string());
        if let Some(url) = api_url {
            builder = builder.base_uri(url).map_err(|e| {
                DiffscribeError::Config(format!("invalid GitHub API URL '{url}': {e}"))
            })?;
        }
        let octocrab = builder
            .build()
            .map_err(|e| DiffscribeError::GitHub(format!("failed to create GitHub client: {e}")))?;

        Ok(Self { octocrab })
    }

    /// List every file changed by a pull request, following pagination.
    ///
    /// # Errors
    ///
    /// Returns [`DiffscribeError::GitHub`] on network or API errors.
    pub async fn list_pr_files(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
    ) -> Result<Vec<ChangedFile>, DiffscribeError> {
        let route = format!("/repos/{owner}/{repo}/pulls/{pr_number}/files");
        let mut files = Vec::new();

        for page in 1..=MAX_PAGES {
            let params = PageParams {
                per_page: PER_PAGE,
                page,
            };
            let batch: Vec<ChangedFile> = self
                .octocrab
                .get(&route, Some(&params))
                .await
                .map_err(|e| {
                    DiffscribeError::GitHub(format!("failed to list files of PR #{pr_number}: {e}"))
                })?;

            let last = batch.len() < usize::from(PER_PAGE);
            debug!(page, count = batch.len(), "fetched pull request files");
            files.extend(batch);
            if last {
                break;
            }
        }

        Ok(files)
    }

    /// Post a top-level comment on a pull request conversation.
    ///
    /// Pull requests share the issue comment endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`DiffscribeError::GitHub`] on API errors.
    pub async fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        pr_number: u64,
        body: &str,
    ) -> Result<(), DiffscribeError> {
        let route = format!("/repos/{owner}/{repo}/issues/{pr_number}/comments");
        let payload = serde_json::json!({ "body": body });

        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&payload))
            .await
            .map_err(|e| {
                DiffscribeError::GitHub(format!("failed to comment on PR #{pr_number}: {e}"))
            })?;

        Ok(())
    }
}

/// One pull request on GitHub, as seen by the review pipeline.
pub struct GitHubPullRequest {
    client: GitHubClient,
    owner: String,
    repo: String,
    number: u64,
}

impl GitHubPullRequest {
    pub fn new(
        client: GitHubClient,
        owner: impl Into<String>,
        repo: impl Into<String>,
        number: u64,
    ) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
            number,
        }
    }

    /// Build a client for the pull request described by `ctx`.
    ///
    /// # Errors
    ///
    /// Same as [`GitHubClient::new`].
    pub fn from_context(ctx: &RunContext, api_url: Option<&str>) -> Result<Self, DiffscribeError> {
        let client = GitHubClient::new(&ctx.github_token, api_url)?;
        Ok(Self::new(client, &ctx.owner, &ctx.repo, ctx.pr_number))
    }
}

#[async_trait]
impl PullRequestHost for GitHubPullRequest {
    async fn changed_files(&self) -> Result<Vec<ChangedFile>, DiffscribeError> {
        self.client
            .list_pr_files(&self.owner, &self.repo, self.number)
            .await
    }

    async fn post_comment(&self, body: &str) -> Result<(), DiffscribeError> {
        self.client
            .create_issue_comment(&self.owner, &self.repo, self.number, body)
            .await
    }

    fn reference(&self) -> String {
        format!("{}/{}#{}", self.owner, self.repo, self.number)
    }
}
