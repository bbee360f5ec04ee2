//! Prompt builders for the summary review, the multi-batch merge and the
//! line-level review.
//!
//! Every builder returns `(system, user)`: the system text goes to the
//! completion service as the auxiliary instruction, the user text as the
//! prompt.

use std::str::FromStr;

/// Tone of the generated review (`REVIEW_STYLE`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReviewStyle {
    #[default]
    Professional,
    Sarcastic,
    Gentle,
    Humorous,
}

impl ReviewStyle {
    fn tone(&self) -> &'static str {
        match self {
            ReviewStyle::Professional => {
                "Write in a professional, concise tone. Use precise technical terms."
            }
            ReviewStyle::Sarcastic => {
                "Write with dry sarcasm, but keep every remark technically accurate and useful."
            }
            ReviewStyle::Gentle => {
                "Write gently and encouragingly. Phrase problems as suggestions (\"consider\", \"it may help to\")."
            }
            ReviewStyle::Humorous => {
                "Write with light humor and the occasional emoji, without hiding the technical point."
            }
        }
    }
}

impl FromStr for ReviewStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "professional" | "" => Ok(Self::Professional),
            "sarcastic" => Ok(Self::Sarcastic),
            "gentle" => Ok(Self::Gentle),
            "humorous" => Ok(Self::Humorous),
            other => Err(format!("unknown review style: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewPrompts {
    pub style: ReviewStyle,
}

impl ReviewPrompts {
    pub fn new(style: ReviewStyle) -> Self {
        Self { style }
    }

    /// Summary review of one batch of changes.
    pub fn batch_review(&self, changes: &str, commit_summary: &str) -> (String, String) {
        let mut sys = String::new();
        sys.push_str("You are a senior software engineer reviewing a merge request.\n");
        sys.push_str("Review the changed code for correctness, security, performance, readability and maintainability.\n");
        sys.push_str(self.style.tone());
        sys.push_str("\n\n# Output format (Markdown)\n");
        sys.push_str("### Problems\n- file and line, what is wrong, how to fix it\n");
        sys.push_str("### Scores\n- Correctness (40), Security (20), Performance (15), Readability (15), Commit messages (10)\n");
        sys.push_str("### Total score\nEnd the review with a line `Total score: N` where N is 0-100.\n");

        let mut user = String::new();
        user.push_str("# Changes (JSON list of per-file unified diffs)\n```json\n");
        user.push_str(changes);
        user.push_str("\n```\n");
        if !commit_summary.trim().is_empty() {
            user.push_str("\n# Commit messages\n");
            user.push_str(commit_summary);
            user.push('\n');
        }
        (sys, user)
    }

    /// Merge of per-batch partial reviews into one report.
    pub fn merge(&self, sections: &str, commit_summary: &str) -> (String, String) {
        let mut sys = String::new();
        sys.push_str("You merge several partial code reviews of the same merge request into one report.\n");
        sys.push_str("Deduplicate findings, keep file and line references, drop nothing important.\n");
        sys.push_str("Sections marked `batch failed` had no review; mention which files were not reviewed.\n");
        sys.push_str(self.style.tone());
        sys.push_str("\nUse the same Markdown layout as the partial reviews and end with a single `Total score: N` line.\n");

        let mut user = String::new();
        user.push_str("# Partial reviews\n\n");
        user.push_str(sections);
        if !commit_summary.trim().is_empty() {
            user.push_str("\n\n# Commit messages\n");
            user.push_str(commit_summary);
        }
        user.push('\n');
        (sys, user)
    }

    /// Line-level review of one parsed file (`file_meta` + `changes` JSON).
    pub fn line_review(&self, file_json: &str) -> (String, String) {
        let mut sys = String::new();
        sys.push_str("You review one changed file and report problems attached to exact lines.\n");
        sys.push_str("Input: `file_meta` (path, old_path, lines_changed, context) and `changes` ");
        sys.push_str("(type add|delete|context, old_line, new_line, content).\n");
        sys.push_str("Answer with a JSON array only, no prose. Each item:\n");
        sys.push_str(
            "{\"file\": path, \"line_number\": new_line (or old_line for deleted lines), \
             \"old_line\": old_line or null, \"severity\": \"critical|warning|suggestion|info\", \
             \"category\": short tag, \"analysis\": what is wrong, \"suggestion\": how to fix}\n",
        );
        sys.push_str("Return [] when nothing needs attention.\n");
        sys.push_str(self.style.tone());

        let user = format!("```json\n{file_json}\n```\n");
        (sys, user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_parsing() {
        assert_eq!("Gentle".parse::<ReviewStyle>().unwrap(), ReviewStyle::Gentle);
        assert_eq!("".parse::<ReviewStyle>().unwrap(), ReviewStyle::Professional);
        assert!("rude".parse::<ReviewStyle>().is_err());
    }

    #[test]
    fn batch_prompt_embeds_changes_and_commits() {
        let p = ReviewPrompts::default();
        let (sys, user) = p.batch_review("[{\"new_path\":\"a.py\"}]", "fix a;add b");
        assert!(sys.contains("Total score"));
        assert!(user.contains("a.py"));
        assert!(user.contains("fix a;add b"));

        let (_, user) = p.batch_review("[]", "  ");
        assert!(!user.contains("Commit messages"));
    }
}
