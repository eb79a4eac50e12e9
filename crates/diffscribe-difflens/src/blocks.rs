//! Split a file patch into blocks of added code.
//!
//! A block is a run of consecutive added lines. Blank added lines, context
//! lines, removed lines and hunk boundaries all end the current block, so
//! a block usually corresponds to one function, statement group, or
//! paragraph of new code.

use diffscribe_core::DiffscribeError;
use serde::Serialize;

use crate::parser::{parse_patch, PatchLine};

/// A contiguous run of added lines from one file.
///
/// # Examples
///
/// ```
/// use diffscribe_difflens::blocks::extract_blocks;
///
/// let patch = "@@ -1,1 +1,5 @@\n ctx\n+a = 1\n+b = 2\n+\n+c = 3";
/// let blocks = extract_blocks("m.py", patch, 1).unwrap();
/// assert_eq!(blocks.len(), 2);
/// assert_eq!(blocks[0].code, "a = 1\nb = 2");
/// assert_eq!(blocks[0].start_line, 2);
/// assert_eq!(blocks[1].start_line, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    /// File the block was taken from.
    pub filename: String,
    /// 1-based position of the block within its file.
    pub index: usize,
    /// Line number of the first line of the block in the new file.
    pub start_line: u32,
    /// Added lines without their `+` marker, joined by `\n`.
    pub code: String,
}

impl CodeBlock {
    /// Number of lines in the block.
    pub fn line_count(&self) -> usize {
        self.code.lines().count()
    }

    /// Line number of the last line of the block in the new file.
    pub fn end_line(&self) -> u32 {
        let extra = u32::try_from(self.line_count().saturating_sub(1)).unwrap_or(u32::MAX);
        self.start_line.saturating_add(extra)
    }
}

/// Extract blocks of added code from `patch`.
///
/// Blocks with fewer than `min_lines` lines are dropped; `min_lines` of 0
/// behaves like 1.
///
/// # Errors
///
/// Returns [`DiffscribeError::Parse`] if the patch has a malformed hunk header.
pub fn extract_blocks(
    filename: &str,
    patch: &str,
    min_lines: usize,
) -> Result<Vec<CodeBlock>, DiffscribeError> {
    let hunks = parse_patch(patch)?;
    let mut builder = BlockBuilder::new(filename, min_lines.max(1));

    for hunk in &hunks {
        builder.close();
        let mut new_line = hunk.new_start;
        for line in &hunk.lines {
            match line {
                PatchLine::Added(text) => {
                    if text.trim().is_empty() {
                        builder.close();
                    } else {
                        builder.push(new_line, text);
                    }
                    new_line = new_line.saturating_add(1);
                }
                PatchLine::Context(_) => {
                    builder.close();
                    new_line = new_line.saturating_add(1);
                }
                PatchLine::Removed(_) => builder.close(),
            }
        }
    }
    builder.close();

    Ok(builder.blocks)
}

struct BlockBuilder<'a> {
    filename: &'a str,
    min_lines: usize,
    start_line: u32,
    lines: Vec<&'a str>,
    blocks: Vec<CodeBlock>,
}

impl<'a> BlockBuilder<'a> {
    fn new(filename: &'a str, min_lines: usize) -> Self {
        Self {
            filename,
            min_lines,
            start_line: 0,
            lines: Vec::new(),
            blocks: Vec::new(),
        }
    }

    fn push(&mut self, line_no: u32, text: &'a str) {
        if self.lines.is_empty() {
            self.start_line = line_no;
        }
        self.lines.push(text);
    }

    fn close(&mut self) {
        if self.lines.is_empty() {
            return;
        }
        if self.lines.len() >= self.min_lines {
            self.blocks.push(CodeBlock {
                filename: self.filename.to_string(),
                index: self.blocks.len() + 1,
                start_line: self.start_line,
                code: self.lines.join("\n"),
            });
        }
        self.lines.clear();
    }
}
