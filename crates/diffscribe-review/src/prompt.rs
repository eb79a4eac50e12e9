use diffscribe_difflens::blocks::CodeBlock;

use crate::llm::ChatMessage;

/// Build the review prompt for a whole file patch.
///
/// # Examples
///
/// ```
/// use diffscribe_review::prompt::build_file_prompt;
///
/// let prompt = build_file_prompt("app.py", "@@ -1 +1 @@\n-a\n+b");
/// assert!(prompt.starts_with("You are a senior code reviewer."));
/// assert!(prompt.contains("`app.py`"));
/// assert!(prompt.ends_with("+b\n"));
/// ```
pub fn build_file_prompt(filename: &str, patch: &str) -> String {
    format!(
        "You are a senior code reviewer.\n\
         Review the changes made in the file `{filename}` below and write 4\u{2013}6 helpful, concise review comments.\n\
         Focus on explaining what the code does and suggesting improvements if needed.\n\
         \n\
         Code diff:\n\
         {patch}\n"
    )
}

/// Build the review prompt for a single block of added code.
///
/// # Examples
///
/// ```
/// use diffscribe_difflens::blocks::CodeBlock;
/// use diffscribe_review::prompt::build_block_prompt;
///
/// let block = CodeBlock {
///     filename: "app.py".into(),
///     index: 1,
///     start_line: 10,
///     code: "x = 1\ny = 2".into(),
/// };
/// let prompt = build_block_prompt(&block);
/// assert!(prompt.contains("lines 10-11"));
/// ```
pub fn build_block_prompt(block: &CodeBlock) -> String {
    format!(
        "You are a senior code reviewer.\n\
         The following block of code was added to the file `{filename}` (lines {start}-{end}).\n\
         Explain briefly what it does and write 2\u{2013}3 concise review comments, suggesting improvements if needed.\n\
         \n\
         Code block:\n\
         {code}\n",
        filename = block.filename,
        start = block.start_line,
        end = block.end_line(),
        code = block.code,
    )
}

/// Wrap a prompt into the message list sent to the model.
pub fn to_messages(prompt: String) -> Vec<ChatMessage> {
    vec![ChatMessage::user(prompt)]
}

/// Format the comment posted for a reviewed file.
///
/// # Examples
///
/// ```
/// use diffscribe_review::prompt::format_file_comment;
///
/// let body = format_file_comment("src/lib.rs", "Looks fine.");
/// assert_eq!(body, "**\u{1f916} AI Review for `src/lib.rs`:**\n\nLooks fine.");
/// ```
pub fn format_file_comment(filename: &str, review: &str) -> String {
    format!("**\u{1f916} AI Review for `{filename}`:**\n\n{review}")
}

/// Format the comment posted for a reviewed code block.
///
/// The block is quoted in a fenced code block so the comment stands on its
/// own in the pull request conversation.
pub fn format_block_comment(block: &CodeBlock, review: &str) -> String {
    let fence = fence_for(&block.code);
    format!(
        "**\u{1f916} AI Review for `{filename}` (block {index}, line {start}):**\n\n\
         {fence}\n{code}\n{fence}\n\n{review}",
        filename = block.filename,
        index = block.index,
        start = block.start_line,
        code = block.code,
    )
}

/// A backtick fence longer than any backtick run inside `code`.
fn fence_for(code: &str) -> String {
    let longest = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}
