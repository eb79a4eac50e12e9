//! Offline stand-ins for GitHub and the LLM.
//!
//! A simulated run walks the full pipeline against a fabricated pull request
//! and logs every comment it would post. Nothing touches the network.

use std::sync::Mutex;

use async_trait::async_trait;
use diffscribe_core::{ChangedFile, DiffscribeError, FileStatus};
use tracing::info;

use crate::backend::{CompletionBackend, PullRequestHost};
use crate::llm::ChatMessage;

/// A fake pull request with a fixed set of changed files.
///
/// # Examples
///
/// ```
/// use diffscribe_review::backend::PullRequestHost;
/// use diffscribe_review::simulate::SimulatedHost;
///
/// let host = SimulatedHost::new();
/// assert_eq!(host.reference(), "simulated/repo#0");
/// assert!(host.posted().is_empty());
/// ```
pub struct SimulatedHost {
    files: Vec<ChangedFile>,
    posted: Mutex<Vec<String>>,
}

impl SimulatedHost {
    /// A host serving [`sample_files`].
    pub fn new() -> Self {
        Self::with_files(sample_files())
    }

    /// A host serving the given files.
    pub fn with_files(files: Vec<ChangedFile>) -> Self {
        Self {
            files,
            posted: Mutex::new(Vec::new()),
        }
    }

    /// Comments that would have been posted, in order.
    pub fn posted(&self) -> Vec<String> {
        self.posted
            .lock()
            .map(|posted| posted.clone())
            .unwrap_or_default()
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PullRequestHost for SimulatedHost {
    async fn changed_files(&self) -> Result<Vec<ChangedFile>, DiffscribeError> {
        info!(count = self.files.len(), "[simulate] listing changed files");
        Ok(self.files.clone())
    }

    async fn post_comment(&self, body: &str) -> Result<(), DiffscribeError> {
        info!(chars = body.len(), "[simulate] would post comment:\n{body}");
        self.posted
            .lock()
            .map_err(|_| DiffscribeError::GitHub("simulated comment log poisoned".into()))?
            .push(body.to_string());
        Ok(())
    }

    fn reference(&self) -> String {
        "simulated/repo#0".to_string()
    }
}

/// An LLM that answers every prompt with the same canned review.
pub struct SimulatedLlm {
    reply: String,
}

impl SimulatedLlm {
    pub fn new() -> Self {
        Self::with_reply(
            "This is a simulated review.\n\
             - The change is small and readable.\n\
             - Consider adding a test for the new branch.",
        )
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl Default for SimulatedLlm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionBackend for SimulatedLlm {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, DiffscribeError> {
        let prompt_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        info!(prompt_chars, "[simulate] would call the LLM");
        Ok(self.reply.trim().to_string())
    }

    fn model(&self) -> &str {
        "simulated"
    }
}

/// The fabricated change set used by simulated runs.
///
/// Covers each path through the pipeline: reviewable files, a file with two
/// blocks of added code, a lock file the filter drops, and a file whose
/// diff was too large for GitHub to include a patch.
pub fn sample_files() -> Vec<ChangedFile> {
    vec![
        ChangedFile {
            status: FileStatus::Modified,
            additions: 3,
            deletions: 1,
            ..ChangedFile::new(
                "src/app.py",
                Some(
                    "@@ -1,4 +1,6 @@\n import os\n-print('hi')\n+def greet(name):\n+    return f'hello {name}'\n+\n+print(greet(os.getlogin()))\n"
                        .into(),
                ),
            )
        },
        ChangedFile {
            status: FileStatus::Added,
            additions: 2,
            ..ChangedFile::new(
                "src/util.rs",
                Some("@@ -0,0 +1,2 @@\n+pub fn double(x: i32) -> i32 {\n+    x * 2 }\n".into()),
            )
        },
        ChangedFile {
            status: FileStatus::Modified,
            additions: 40,
            deletions: 12,
            ..ChangedFile::new("Cargo.lock", Some("@@ -1 +1 @@\n-a\n+b\n".into()))
        },
        ChangedFile {
            status: FileStatus::Added,
            additions: 5000,
            ..ChangedFile::new("src/generated_tables.py", None)
        },
    ]
}
