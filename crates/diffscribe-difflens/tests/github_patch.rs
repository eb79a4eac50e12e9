use diffscribe_core::{ChangedFile, ReviewConfig};
use diffscribe_difflens::blocks::extract_blocks;
use diffscribe_difflens::filter::FileFilter;
use diffscribe_difflens::parser::parse_patch;

// Patch text as returned by GET /repos/{owner}/{repo}/pulls/{n}/files.
const PATCH: &str = "@@ -1,6 +1,14 @@\n import os\n+import json\n \n def load(path):\n-    return open(path).read()\n+    with open(path) as fh:\n+        return fh.read()\n+\n+\n+def save(path, data):\n+    with open(path, \"w\") as fh:\n+        json.dump(data, fh)\n \n def main():\n     pass";

#[test]
fn parse_github_patch_without_file_header() {
    let hunks = parse_patch(PATCH).unwrap();
    assert_eq!(hunks.len(), 1);
    assert_eq!(hunks[0].new_start, 1);
    assert_eq!(hunks[0].added(), 8);
    assert_eq!(hunks[0].removed(), 1);
}

#[test]
fn blocks_follow_new_file_line_numbers() {
    let blocks = extract_blocks("util.py", PATCH, 1).unwrap();
    let summary: Vec<(u32, usize)> = blocks
        .iter()
        .map(|b| (b.start_line, b.line_count()))
        .collect();
    assert_eq!(summary, vec![(2, 1), (5, 2), (9, 3)]);
    assert!(blocks[2].code.starts_with("def save"));
    assert!(blocks.iter().all(|b| b.filename == "util.py"));
}

#[test]
fn default_config_filters_then_splits() {
    let filter = FileFilter::from_config(&ReviewConfig::default()).unwrap();
    let files = vec![
        ChangedFile::new("util.py", Some(PATCH.into())),
        ChangedFile::new("poetry.lock", Some("@@ -1 +1 @@\n-a\n+b".into())),
        ChangedFile::new("CHANGELOG.md", Some("@@ -1 +1,2 @@\n x\n+y".into())),
    ];
    let result = filter.filter(files);
    assert_eq!(result.kept.len(), 1);
    assert_eq!(result.skipped.len(), 2);

    let file = &result.kept[0];
    let blocks = extract_blocks(&file.filename, file.patch.as_deref().unwrap(), 2).unwrap();
    assert_eq!(blocks.len(), 2);
}
