//! Seams between the review pipeline and the outside world.
//!
//! The pipeline only talks to a [`PullRequestHost`] and a
//! [`CompletionBackend`], so live runs, simulated runs and tests share the
//! same orchestration code.

use async_trait::async_trait;
use diffscribe_core::{ChangedFile, DiffscribeError};

use crate::llm::ChatMessage;

/// Source of changed files and sink for review comments on one pull request.
#[async_trait]
pub trait PullRequestHost: Send + Sync {
    /// List every file changed by the pull request, in API order.
    async fn changed_files(&self) -> Result<Vec<ChangedFile>, DiffscribeError>;

    /// Post one top-level comment on the pull request conversation.
    async fn post_comment(&self, body: &str) -> Result<(), DiffscribeError>;

    /// Human readable `owner/repo#number` for logs and summaries.
    fn reference(&self) -> String;
}

/// Something that turns chat messages into review text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Return the assistant reply, trimmed. An empty string means the model
    /// had nothing to say.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, DiffscribeError>;

    /// Model identifier reported in summaries.
    fn model(&self) -> &str;

    /// Total rate-limit retries spent so far.
    fn rate_limit_retries(&self) -> u32 {
        0
    }
}
