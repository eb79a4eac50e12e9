//! Patch analysis: hunk parsing, added-code block extraction, and pre-LLM
//! file filtering.

pub mod blocks;
pub mod filter;
pub mod parser;
