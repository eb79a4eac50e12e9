use std::fmt;
use std::sync::Arc;

use diffscribe_core::{ChangedFile, DiffscribeError, ReviewConfig, ReviewMode};
use diffscribe_difflens::blocks::{extract_blocks, CodeBlock};
use diffscribe_difflens::filter::{FileFilter, SkippedFile};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::{CompletionBackend, PullRequestHost};
use crate::llm::ChatMessage;
use crate::prompt;

/// One unit of work sent to the LLM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewItem {
    /// A whole file patch.
    File { filename: String, patch: String },
    /// One block of added code.
    Block(CodeBlock),
}

impl ReviewItem {
    pub fn filename(&self) -> &str {
        match self {
            ReviewItem::File { filename, .. } => filename,
            ReviewItem::Block(block) => &block.filename,
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> String {
        match self {
            ReviewItem::File { filename, .. } => filename.clone(),
            ReviewItem::Block(block) => format!(
                "{}:{}-{}",
                block.filename,
                block.start_line,
                block.end_line()
            ),
        }
    }

    fn messages(&self) -> Vec<ChatMessage> {
        let text = match self {
            ReviewItem::File { filename, patch } => prompt::build_file_prompt(filename, patch),
            ReviewItem::Block(block) => prompt::build_block_prompt(block),
        };
        prompt::to_messages(text)
    }

    fn comment(&self, review: &str) -> String {
        match self {
            ReviewItem::File { filename, .. } => prompt::format_file_comment(filename, review),
            ReviewItem::Block(block) => prompt::format_block_comment(block, review),
        }
    }
}

/// Counters describing one review run.
///
/// # Examples
///
/// ```
/// use diffscribe_review::pipeline::RunSummary;
///
/// let summary = RunSummary {
///     pr: "octo/app#1".into(),
///     model: "gpt-4o-mini".into(),
///     comments_posted: 2,
///     ..RunSummary::default()
/// };
/// assert!(summary.to_string().contains("Comments posted: 2"));
/// ```
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// `owner/repo#number` of the reviewed pull request.
    pub pr: String,
    pub mode: ReviewMode,
    pub model: String,
    /// Whether the run used the offline stand-ins.
    pub simulated: bool,
    /// Files listed by the API.
    pub files_changed: usize,
    /// Files dropped by the filter, with reasons.
    pub files_skipped: Vec<SkippedFile>,
    /// Files kept by the filter that had no patch to review.
    pub files_without_patch: Vec<String>,
    /// Review items available before the cap was applied.
    pub items_found: usize,
    /// Items sent to the LLM.
    pub items_processed: usize,
    pub comments_posted: usize,
    /// Items for which the LLM returned nothing.
    pub empty_responses: usize,
    pub batches: usize,
    pub rate_limit_retries: u32,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.simulated {
            "Review Run (simulated)"
        } else {
            "Review Run"
        };
        writeln!(f, "{title}")?;
        writeln!(f, "{}", "=".repeat(title.len()))?;
        writeln!(
            f,
            "PR: {} | Mode: {} | Model: {}",
            self.pr, self.mode, self.model
        )?;
        writeln!(
            f,
            "Files: {} changed, {} skipped, {} without patch",
            self.files_changed,
            self.files_skipped.len(),
            self.files_without_patch.len()
        )?;
        writeln!(
            f,
            "Items: {} processed of {} found in {} batch(es)",
            self.items_processed, self.items_found, self.batches
        )?;
        writeln!(
            f,
            "Comments posted: {} | Empty responses: {} | Rate-limit retries: {}",
            self.comments_posted, self.empty_responses, self.rate_limit_retries
        )?;

        if !self.files_skipped.is_empty() {
            writeln!(f)?;
            writeln!(f, "Skipped:")?;
            for s in &self.files_skipped {
                writeln!(f, "  {} ({})", s.filename, s.reason)?;
            }
        }

        Ok(())
    }
}

impl RunSummary {
    /// Render the summary as markdown, e.g. for `$GITHUB_STEP_SUMMARY`.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscribe_review::pipeline::RunSummary;
    ///
    /// let md = RunSummary::default().to_markdown();
    /// assert!(md.starts_with("# Review Run"));
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Review Run");
        if self.simulated {
            out.push_str(" (simulated)");
        }
        out.push_str("\n\n");
        out.push_str(&format!(
            "**PR:** {} | **Mode:** {} | **Model:** {}\n\n",
            self.pr, self.mode, self.model
        ));
        out.push_str("| | count |\n|---|---|\n");
        for (label, count) in [
            ("Files changed", self.files_changed),
            ("Files skipped", self.files_skipped.len()),
            ("Files without patch", self.files_without_patch.len()),
            ("Items processed", self.items_processed),
            ("Comments posted", self.comments_posted),
            ("Empty responses", self.empty_responses),
            ("Batches", self.batches),
            ("Rate-limit retries", self.rate_limit_retries as usize),
        ] {
            out.push_str(&format!("| {label} | {count} |\n"));
        }

        if !self.files_skipped.is_empty() {
            out.push_str("\n## Skipped files\n\n");
            for s in &self.files_skipped {
                out.push_str(&format!("- `{}`: {}\n", s.filename, s.reason));
            }
        }
        out
    }
}

/// Drives a review: fetch files, filter, split into items, call the LLM in
/// rate-limited batches, and post one comment per non-empty reply.
///
/// Processing is strictly sequential. The first error from GitHub or the
/// LLM stops the run; comments already posted stay posted.
pub struct ReviewPipeline {
    host: Arc<dyn PullRequestHost>,
    llm: Arc<dyn CompletionBackend>,
    config: ReviewConfig,
    filter: FileFilter,
    simulated: bool,
}

impl ReviewPipeline {
    /// Create a pipeline over the given host and LLM backend.
    ///
    /// # Errors
    ///
    /// Returns [`DiffscribeError::Config`] if a configured skip pattern is
    /// not a valid glob.
    pub fn new(
        host: Arc<dyn PullRequestHost>,
        llm: Arc<dyn CompletionBackend>,
        config: ReviewConfig,
    ) -> Result<Self, DiffscribeError> {
        let filter = FileFilter::from_config(&config)?;
        Ok(Self {
            host,
            llm,
            config,
            filter,
            simulated: false,
        })
    }

    /// Mark the run as simulated in the summary.
    pub fn simulated(mut self, simulated: bool) -> Self {
        self.simulated = simulated;
        self
    }

    /// Run the review end to end.
    ///
    /// # Errors
    ///
    /// Propagates the first GitHub or LLM error, including
    /// [`DiffscribeError::RateLimited`] once retries are exhausted.
    pub async fn run(&self) -> Result<RunSummary, DiffscribeError> {
        let mut summary = RunSummary {
            pr: self.host.reference(),
            mode: self.config.mode,
            model: self.llm.model().to_string(),
            simulated: self.simulated,
            ..RunSummary::default()
        };

        let files = self.host.changed_files().await?;
        summary.files_changed = files.len();
        info!(pr = %summary.pr, files = files.len(), "fetched changed files");

        let filtered = self.filter.filter(files);
        for skipped in &filtered.skipped {
            if skipped.filename.trim().is_empty() {
                warn!("skipping changed file entry without a filename");
            } else {
                debug!(file = %skipped.filename, reason = %skipped.reason, "skipping file");
            }
        }
        summary.files_skipped = filtered.skipped;

        let mut kept = filtered.kept;
        if self.config.mode == ReviewMode::File {
            // Files without a patch still take one of the capped slots.
            summary.items_found = kept.len();
            if kept.len() > self.config.max_items {
                info!(
                    found = kept.len(),
                    max = self.config.max_items,
                    "capping review items"
                );
                kept.truncate(self.config.max_items);
            }
        }

        let mut items = self.collect_items(kept, &mut summary);
        if self.config.mode == ReviewMode::Blocks {
            summary.items_found = items.len();
        }
        if items.len() > self.config.max_items {
            info!(
                found = items.len(),
                max = self.config.max_items,
                "capping review items"
            );
            items.truncate(self.config.max_items);
        }

        let batch_size = self.config.batch_size.max(1);
        let delay = self.config.batch_delay();
        for (index, batch) in items.chunks(batch_size).enumerate() {
            if index > 0 && !delay.is_zero() {
                info!(wait_secs = delay.as_secs(), "waiting before next batch");
                tokio::time::sleep(delay).await;
            }
            summary.batches += 1;
            debug!(batch = index + 1, size = batch.len(), "processing batch");

            for item in batch {
                self.review_item(item, &mut summary).await?;
            }
        }

        summary.rate_limit_retries = self.llm.rate_limit_retries();
        info!(
            comments = summary.comments_posted,
            items = summary.items_processed,
            "review finished"
        );
        Ok(summary)
    }

    fn collect_items(&self, files: Vec<ChangedFile>, summary: &mut RunSummary) -> Vec<ReviewItem> {
        let mut items = Vec::new();
        for file in files {
            if !file.has_patch() {
                warn!(file = %file.filename, "no patch available, nothing to review");
                summary.files_without_patch.push(file.filename);
                continue;
            }
            let Some(patch) = file.patch else { continue };

            match self.config.mode {
                ReviewMode::File => items.push(ReviewItem::File {
                    filename: file.filename,
                    patch,
                }),
                ReviewMode::Blocks => {
                    match extract_blocks(&file.filename, &patch, self.config.min_block_lines) {
                        Ok(blocks) => {
                            debug!(file = %file.filename, blocks = blocks.len(), "split into blocks");
                            items.extend(blocks.into_iter().map(ReviewItem::Block));
                        }
                        Err(e) => {
                            warn!(file = %file.filename, error = %e, "could not split patch, skipping file");
                        }
                    }
                }
            }
        }
        items
    }

    async fn review_item(
        &self,
        item: &ReviewItem,
        summary: &mut RunSummary,
    ) -> Result<(), DiffscribeError> {
        info!(item = %item.label(), "requesting review");
        let review = self.llm.complete(&item.messages()).await?;
        summary.items_processed += 1;

        if review.trim().is_empty() {
            warn!(item = %item.label(), "empty review from the model, not commenting");
            summary.empty_responses += 1;
            return Ok(());
        }

        self.host.post_comment(&item.comment(&review)).await?;
        summary.comments_posted += 1;
        info!(file = %item.filename(), "posted review comment");
        Ok(())
    }
}
