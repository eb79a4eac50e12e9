//! Pull request review orchestration.
//!
//! Fetches changed files from GitHub, asks an OpenAI-compatible model to
//! explain each file or block of added code, and posts the replies back as
//! pull request comments. Offline stand-ins in [`simulate`] let the same
//! pipeline run without any network access.

pub mod backend;
pub mod github;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod retry;
pub mod simulate;
