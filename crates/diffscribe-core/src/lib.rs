//! Core types, configuration, run context, and error handling for diffscribe.
//!
//! This crate provides the shared foundation used by the other crates:
//! - [`DiffscribeError`]: unified error type using `thiserror`
//! - [`DiffscribeConfig`]: configuration loaded from `.diffscribe.toml` and the environment
//! - [`ContextInputs`] / [`RunContext`]: pull request target and credentials
//! - Shared types: [`ChangedFile`], [`FileStatus`], [`ReviewMode`], [`OutputFormat`]

mod config;
mod context;
mod error;
mod types;

pub use config::{DiffscribeConfig, GitHubConfig, LlmConfig, RetryConfig, ReviewConfig};
pub use context::{
    parse_repo_slug, pr_number_from_event, pr_number_from_payload, ContextInputs, RunContext,
};
pub use error::DiffscribeError;
pub use types::{ChangedFile, FileStatus, OutputFormat, ReviewMode};

/// A convenience `Result` type for diffscribe operations.
pub type Result<T> = std::result::Result<T, DiffscribeError>;
