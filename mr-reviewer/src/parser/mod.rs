//! Unified-diff parser for a single file.
//!
//! Turns one file's diff text into line-addressable [`LineChange`]s:
//! - `add` carries only `new_line`, `delete` only `old_line`, `context` both.
//! - Works on hunks-only input; `diff --git`/`index` preamble is skipped.
//! - `---`/`+++` header lines are skipped unless they fall inside a hunk body
//!   (a removed `-- comment` line stays a deletion).
//! - `\ No newline at end of file` markers are ignored.
//!
//! A hunk header that does not parse resets both cursors to 0 and parsing
//! goes on; the following lines get numbers counted from 0.

use std::collections::VecDeque;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Context lines kept per view, newest last.
pub const CONTEXT_LIMIT: usize = 20;

lazy_static! {
    static ref HUNK_HEADER: Regex =
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk header regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Delete,
    Context,
}

/// One diff line with its position in the old and/or new file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
    pub content: String,
}

/// Surrounding code for the prompt, each line as `old -> new: content`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContext {
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFileChange {
    pub path: String,
    pub old_path: Option<String>,
    pub changes: Vec<LineChange>,
    pub context: FileContext,
    /// Number of `add` + `delete` entries.
    pub lines_changed: usize,
}

impl ParsedFileChange {
    pub fn additions(&self) -> impl Iterator<Item = &LineChange> {
        self.changes.iter().filter(|c| c.kind == ChangeKind::Add)
    }

    pub fn deletions(&self) -> impl Iterator<Item = &LineChange> {
        self.changes.iter().filter(|c| c.kind == ChangeKind::Delete)
    }
}

/// Line counts still expected by the current hunk, when its header parsed.
#[derive(Debug, Clone, Copy)]
struct HunkBudget {
    old: u32,
    new: u32,
}

impl HunkBudget {
    fn open(&self) -> bool {
        self.old > 0 || self.new > 0
    }
}

/// Parses one file's unified diff. Never fails; an empty diff yields no changes.
pub fn parse(diff_text: &str, new_path: &str, old_path: Option<&str>) -> ParsedFileChange {
    let mut changes: Vec<LineChange> = Vec::new();
    let mut context: VecDeque<String> = VecDeque::with_capacity(CONTEXT_LIMIT + 1);

    let mut old_cursor = 0u32;
    let mut new_cursor = 0u32;
    let mut budget: Option<HunkBudget> = None;
    let mut in_hunk = false;

    for line in diff_text.lines() {
        if line.starts_with("@@") {
            in_hunk = true;
            match parse_hunk_header(line) {
                Some((old_start, old_len, new_start, new_len)) => {
                    old_cursor = old_start;
                    new_cursor = new_start;
                    budget = Some(HunkBudget {
                        old: old_len,
                        new: new_len,
                    });
                }
                None => {
                    debug!("parser: malformed hunk header {:?} in {}", line, new_path);
                    old_cursor = 0;
                    new_cursor = 0;
                    budget = None;
                }
            }
            continue;
        }

        if !in_hunk || line.starts_with('\\') {
            continue;
        }

        let body_open = budget.is_some_and(|b| b.open());
        if !body_open && (line.starts_with("--- ") || line.starts_with("+++ ")) {
            continue;
        }

        if let Some(rest) = line.strip_prefix('+') {
            changes.push(LineChange {
                kind: ChangeKind::Add,
                old_line: None,
                new_line: Some(new_cursor),
                content: rest.to_string(),
            });
            new_cursor = new_cursor.saturating_add(1);
            if let Some(b) = budget.as_mut() {
                b.new = b.new.saturating_sub(1);
            }
        } else if let Some(rest) = line.strip_prefix('-') {
            changes.push(LineChange {
                kind: ChangeKind::Delete,
                old_line: Some(old_cursor),
                new_line: None,
                content: rest.to_string(),
            });
            old_cursor = old_cursor.saturating_add(1);
            if let Some(b) = budget.as_mut() {
                b.old = b.old.saturating_sub(1);
            }
        } else {
            let content = line.strip_prefix(' ').unwrap_or(line);
            context.push_back(format!("{old_cursor} -> {new_cursor}: {content}"));
            if context.len() > CONTEXT_LIMIT {
                context.pop_front();
            }
            changes.push(LineChange {
                kind: ChangeKind::Context,
                old_line: Some(old_cursor),
                new_line: Some(new_cursor),
                content: content.to_string(),
            });
            old_cursor = old_cursor.saturating_add(1);
            new_cursor = new_cursor.saturating_add(1);
            if let Some(b) = budget.as_mut() {
                b.old = b.old.saturating_sub(1);
                b.new = b.new.saturating_sub(1);
            }
        }
    }

    let lines_changed = changes
        .iter()
        .filter(|c| c.kind != ChangeKind::Context)
        .count();
    let joined = context.into_iter().collect::<Vec<_>>().join("\n");

    ParsedFileChange {
        path: new_path.to_string(),
        old_path: old_path.map(str::to_string),
        changes,
        context: FileContext {
            old: joined.clone(),
            new: joined,
        },
        lines_changed,
    }
}

/// `(old_start, old_len, new_start, new_len)`; an omitted length means 1.
fn parse_hunk_header(line: &str) -> Option<(u32, u32, u32, u32)> {
    let caps = HUNK_HEADER.captures(line)?;
    let num = |i: usize, default: u32| -> Option<u32> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };
    Some((num(1, 0)?, num(2, 1)?, num(3, 0)?, num(4, 1)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIFF: &str = "\
diff --git a/app.py b/app.py
index 83db48f..bf269f4 100644
--- a/app.py
+++ b/app.py
@@ -1,4 +1,5 @@
 import os
-import sys
+import json
+import re

 def main():
@@ -20,2 +21,2 @@ def helper():
-    return 1
+    return 2
     # end
\\ No newline at end of file
";

    fn assert_line_fields(p: &ParsedFileChange) {
        for c in &p.changes {
            match c.kind {
                ChangeKind::Add => assert!(c.new_line.is_some() && c.old_line.is_none()),
                ChangeKind::Delete => assert!(c.old_line.is_some() && c.new_line.is_none()),
                ChangeKind::Context => assert!(c.old_line.is_some() && c.new_line.is_some()),
            }
        }
    }

    #[test]
    fn numbers_lines_per_hunk() {
        let p = parse(DIFF, "app.py", Some("app.py"));
        assert_line_fields(&p);
        assert_eq!(p.lines_changed, 5);
        assert_eq!(p.lines_changed, p.additions().count() + p.deletions().count());

        let adds: Vec<_> = p.additions().map(|c| (c.new_line, c.content.as_str())).collect();
        assert_eq!(
            adds,
            vec![
                (Some(2), "import json"),
                (Some(3), "import re"),
                (Some(21), "    return 2")
            ]
        );
        let dels: Vec<_> = p.deletions().map(|c| c.old_line).collect();
        assert_eq!(dels, vec![Some(2), Some(20)]);
    }

    #[test]
    fn context_is_annotated_and_blank_lines_count() {
        let p = parse(DIFF, "app.py", None);
        let lines: Vec<&str> = p.context.new.lines().collect();
        assert_eq!(
            lines,
            vec![
                "1 -> 1: import os",
                "3 -> 4: ",
                "4 -> 5: def main():",
                "21 -> 22:     # end"
            ]
        );
        assert_eq!(p.context.old, p.context.new);
        assert_eq!(p.old_path, None);
    }

    #[test]
    fn context_keeps_last_twenty() {
        let mut diff = String::from("@@ -1,30 +1,30 @@\n");
        for i in 1..=30 {
            diff.push_str(&format!(" line{i}\n"));
        }
        let p = parse(&diff, "a.py", None);
        let lines: Vec<&str> = p.context.old.lines().collect();
        assert_eq!(lines.len(), CONTEXT_LIMIT);
        assert_eq!(lines[0], "11 -> 11: line11");
        assert_eq!(lines[19], "30 -> 30: line30");
        assert_eq!(p.lines_changed, 0);
    }

    #[test]
    fn empty_diff_is_not_an_error() {
        let p = parse("", "a.py", None);
        assert!(p.changes.is_empty());
        assert_eq!(p.lines_changed, 0);
        assert_eq!(p.context, FileContext::default());
    }

    #[test]
    fn header_like_lines_inside_hunk_are_changes() {
        let diff = "@@ -1,2 +1,2 @@\n--- old sql comment\n+++ new counter\n x\n";
        let p = parse(diff, "q.sql", None);
        assert_eq!(p.lines_changed, 2);
        assert_eq!(p.deletions().next().unwrap().content, "-- old sql comment");
        assert_eq!(p.additions().next().unwrap().content, "++ new counter");
    }

    #[test]
    fn omitted_hunk_lengths_default_to_one() {
        let p = parse("@@ -7 +7 @@\n-a\n+b\n", "a.py", None);
        assert_eq!(p.deletions().next().unwrap().old_line, Some(7));
        assert_eq!(p.additions().next().unwrap().new_line, Some(7));
    }

    /// Open question kept for compatibility: a malformed hunk header zeroes
    /// both cursors instead of failing the file, so the following lines are
    /// numbered from 0 and cannot be anchored on the host.
    #[test]
    fn malformed_hunk_header_zeroes_cursors() {
        let diff = "@@ -10,2 +10,2 @@\n-a\n+b\n@@ garbage @@\n-c\n+d\n";
        let p = parse(diff, "a.py", None);
        assert_line_fields(&p);
        let dels: Vec<_> = p.deletions().map(|c| c.old_line).collect();
        let adds: Vec<_> = p.additions().map(|c| c.new_line).collect();
        assert_eq!(dels, vec![Some(10), Some(0)]);
        assert_eq!(adds, vec![Some(10), Some(0)]);
        assert_eq!(p.lines_changed, 4);
    }

    #[test]
    fn huge_hunk_start_saturates() {
        let p = parse("@@ -1 +4294967295,2 @@\n+a\n+b\n \n", "a.py", None);
        let adds: Vec<_> = p.additions().map(|c| c.new_line).collect();
        assert_eq!(adds, vec![Some(u32::MAX), Some(u32::MAX)]);
        assert_eq!(p.lines_changed, 2);
    }

    #[test]
    fn serializes_kind_as_type() {
        let p = parse("@@ -1 +1 @@\n+x\n", "a.py", None);
        let v = serde_json::to_value(&p.changes[0]).unwrap();
        assert_eq!(v["type"], "add");
        assert!(v["old_line"].is_null());
        assert_eq!(v["new_line"], 1);
    }
}
