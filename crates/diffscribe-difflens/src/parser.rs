use std::fmt;

use diffscribe_core::DiffscribeError;
use serde::Serialize;

/// One line of a hunk body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum PatchLine {
    /// Unchanged line shown for context.
    Context(String),
    /// Line present only in the new version.
    Added(String),
    /// Line present only in the old version.
    Removed(String),
}

/// A single hunk of a file patch.
///
/// # Examples
///
/// ```
/// use diffscribe_difflens::parser::{parse_patch, PatchLine};
///
/// let hunks = parse_patch("@@ -1,2 +1,3 @@\n a\n+b\n c").unwrap();
/// assert_eq!(hunks.len(), 1);
/// assert_eq!(hunks[0].new_start, 1);
/// assert_eq!(hunks[0].lines[1], PatchLine::Added("b".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hunk {
    /// Starting line in the old version.
    pub old_start: u32,
    /// Number of lines in the old version.
    pub old_lines: u32,
    /// Starting line in the new version.
    pub new_start: u32,
    /// Number of lines in the new version.
    pub new_lines: u32,
    /// Hunk body in patch order.
    pub lines: Vec<PatchLine>,
}

impl Hunk {
    /// Number of added lines in this hunk.
    pub fn added(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, PatchLine::Added(_)))
            .count()
    }

    /// Number of removed lines in this hunk.
    pub fn removed(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, PatchLine::Removed(_)))
            .count()
    }
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@@ -{},{} +{},{} @@ (+{} -{})",
            self.old_start,
            self.old_lines,
            self.new_start,
            self.new_lines,
            self.added(),
            self.removed()
        )
    }
}

/// Parse the patch text of one file into hunks.
///
/// Accepts the hunk-only fragments GitHub returns in the `patch` field of
/// pull request files, and also tolerates a leading `diff --git` / `---` /
/// `+++` header. Anything before the first hunk header is ignored.
///
/// # Errors
///
/// Returns [`DiffscribeError::Parse`] if a hunk header is malformed.
///
/// # Examples
///
/// ```
/// use diffscribe_difflens::parser::parse_patch;
///
/// assert!(parse_patch("").unwrap().is_empty());
/// ```
pub fn parse_patch(patch: &str) -> Result<Vec<Hunk>, DiffscribeError> {
    let mut hunks: Vec<Hunk> = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in patch.lines() {
        if line.starts_with("@@ ") {
            if let Some(h) = current.take() {
                hunks.push(h);
            }
            let (old_start, old_lines, new_start, new_lines) = parse_hunk_header(line)?;
            current = Some(Hunk {
                old_start,
                old_lines,
                new_start,
                new_lines,
                lines: Vec::new(),
            });
            continue;
        }

        if line.starts_with("diff --git ") {
            if let Some(h) = current.take() {
                hunks.push(h);
            }
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            continue;
        };

        if line.starts_with('\\') {
            // "\ No newline at end of file"
            continue;
        }

        if let Some(rest) = line.strip_prefix('+') {
            hunk.lines.push(PatchLine::Added(rest.to_string()));
        } else if let Some(rest) = line.strip_prefix('-') {
            hunk.lines.push(PatchLine::Removed(rest.to_string()));
        } else if let Some(rest) = line.strip_prefix(' ') {
            hunk.lines.push(PatchLine::Context(rest.to_string()));
        } else if line.is_empty() {
            // Some tools strip the leading space of blank context lines.
            hunk.lines.push(PatchLine::Context(String::new()));
        }
    }

    if let Some(h) = current.take() {
        hunks.push(h);
    }

    Ok(hunks)
}

fn parse_hunk_header(line: &str) -> Result<(u32, u32, u32, u32), DiffscribeError> {
    let inner = line
        .strip_prefix("@@ ")
        .and_then(|s| {
            let end = s.find(" @@")?;
            Some(&s[..end])
        })
        .ok_or_else(|| DiffscribeError::Parse(format!("invalid hunk header: {line}")))?;

    let parts: Vec<&str> = inner.split(' ').collect();
    if parts.len() != 2 {
        return Err(DiffscribeError::Parse(format!("invalid hunk header: {line}")));
    }

    let old = parts[0]
        .strip_prefix('-')
        .ok_or_else(|| DiffscribeError::Parse(format!("invalid old range in hunk: {line}")))?;
    let new = parts[1]
        .strip_prefix('+')
        .ok_or_else(|| DiffscribeError::Parse(format!("invalid new range in hunk: {line}")))?;

    let (old_start, old_lines) = parse_range(old, line)?;
    let (new_start, new_lines) = parse_range(new, line)?;

    Ok((old_start, old_lines, new_start, new_lines))
}

fn parse_range(range: &str, context: &str) -> Result<(u32, u32), DiffscribeError> {
    let invalid = || DiffscribeError::Parse(format!("invalid range in: {context}"));
    if let Some((start, count)) = range.split_once(',') {
        let s = start.parse().map_err(|_| invalid())?;
        let c = count.parse().map_err(|_| invalid())?;
        Ok((s, c))
    } else {
        let s = range.parse().map_err(|_| invalid())?;
        Ok((s, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_returns_empty_vec() {
        assert!(parse_patch("").unwrap().is_empty());
    }

    #[test]
    fn github_fragment_single_hunk() {
        let patch = "\
@@ -1,3 +1,4 @@
 def main():
+    print(\"hello\")
     x = 1
-    y = 2
+    y = 3";
        let hunks = parse_patch(patch).unwrap();
        assert_eq!(hunks.len(), 1);
        let h = &hunks[0];
        assert_eq!((h.old_start, h.old_lines, h.new_start, h.new_lines), (1, 3, 1, 4));
        assert_eq!(h.added(), 2);
        assert_eq!(h.removed(), 1);
        assert_eq!(h.lines[0], PatchLine::Context("def main():".into()));
    }

    #[test]
    fn multiple_hunks_with_section_headings() {
        let patch = "\
@@ -1,2 +1,3 @@ fn foo() {
 a
+b
@@ -10,2 +11,3 @@ fn bar() {
 c
+d";
        let hunks = parse_patch(patch).unwrap();
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[1].old_start, 10);
        assert_eq!(hunks[1].new_start, 11);
    }

    #[test]
    fn full_git_header_is_skipped() {
        let patch = "\
diff --git a/lib.rs b/lib.rs
index abc..def 100644
--- a/lib.rs
+++ b/lib.rs
@@ -1 +1,2 @@
 line1
+line2
";
        let hunks = parse_patch(patch).unwrap();
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].lines.len(), 2);
        assert_eq!(hunks[0].added(), 1);
    }

    #[test]
    fn single_number_range_means_one_line() {
        let hunks = parse_patch("@@ -5 +5 @@\n-old\n+new").unwrap();
        assert_eq!(hunks[0].old_lines, 1);
        assert_eq!(hunks[0].new_lines, 1);
    }

    #[test]
    fn no_newline_marker_is_dropped() {
        let patch = "@@ -1 +1 @@\n-old\n\\ No newline at end of file\n+new\n\\ No newline at end of file";
        let hunks = parse_patch(patch).unwrap();
        assert_eq!(
            hunks[0].lines,
            vec![PatchLine::Removed("old".into()), PatchLine::Added("new".into())]
        );
    }

    #[test]
    fn added_line_starting_with_plus_is_kept() {
        let hunks = parse_patch("@@ -0,0 +1,1 @@\n+++counter;").unwrap();
        assert_eq!(hunks[0].lines, vec![PatchLine::Added("++counter;".into())]);
    }

    #[test]
    fn malformed_header_is_parse_error() {
        let err = parse_patch("@@ garbage @@\n+x").unwrap_err();
        assert!(matches!(err, DiffscribeError::Parse(_)));
        assert!(parse_patch("@@ -a,b +1 @@").is_err());
    }

    #[test]
    fn hunk_display_summarizes_counts() {
        let hunks = parse_patch("@@ -1,2 +1,2 @@\n-a\n+b\n c").unwrap();
        assert_eq!(hunks[0].to_string(), "@@ -1,2 +1,2 @@ (+1 -1)");
    }
}
