//! Token budget: counting, truncation and batching of eligible changes.
//!
//! `split` partitions the change list into contiguous groups of
//! `files_per_batch` (the last may be smaller), serializes each group as
//! pretty JSON and truncates each batch text on its own when it exceeds
//! `max_tokens`.

pub mod tokenizer;

use serde::Serialize;
use tracing::{debug, warn};

use crate::filter::EligibleChange;

/// One group of files reviewed in a single completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewBatch {
    /// Zero-based position in the run.
    pub index: usize,
    /// Paths of the files in this batch, in input order.
    pub files: Vec<String>,
    /// Serialized batch, possibly truncated.
    pub text: String,
    pub truncated: bool,
}

impl ReviewBatch {
    /// `Batch N (files: a, b)` with a one-based N.
    pub fn label(&self) -> String {
        format!("Batch {} (files: {})", self.index + 1, self.files.join(", "))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TokenBudget {
    pub max_tokens: usize,
}

impl TokenBudget {
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    pub fn count(&self, text: &str) -> usize {
        tokenizer::count(text)
    }

    /// Prefix of `text` holding at most `max_tokens` tokens; unchanged when
    /// already within budget.
    pub fn truncate<'a>(&self, text: &'a str, max_tokens: usize) -> &'a str {
        tokenizer::truncate(text, max_tokens)
    }

    /// Ordered, exhaustive, non-overlapping batches. A `files_per_batch` of 0
    /// is treated as 1.
    pub fn split(&self, changes: &[EligibleChange], files_per_batch: usize) -> Vec<ReviewBatch> {
        let per_batch = files_per_batch.max(1);
        let batches: Vec<ReviewBatch> = changes
            .chunks(per_batch)
            .enumerate()
            .map(|(index, group)| self.build_batch(index, group))
            .collect();
        debug!(
            "batch: {} files -> {} batches (per_batch={}, max_tokens={})",
            changes.len(),
            batches.len(),
            per_batch,
            self.max_tokens
        );
        batches
    }

    fn build_batch(&self, index: usize, group: &[EligibleChange]) -> ReviewBatch {
        let files = group.iter().map(|c| c.new_path.clone()).collect();
        let full = serialize_group(group);
        let kept = self.truncate(&full, self.max_tokens);
        let truncated = kept.len() < full.len();
        if truncated {
            debug!(
                "batch: #{} truncated to {} tokens (was {})",
                index + 1,
                self.max_tokens,
                self.count(&full)
            );
        }
        ReviewBatch {
            index,
            files,
            text: kept.to_string(),
            truncated,
        }
    }
}

fn serialize_group(group: &[EligibleChange]) -> String {
    match serde_json::to_string_pretty(group) {
        Ok(s) => s,
        Err(e) => {
            warn!("batch: json serialization failed ({}), using raw diffs", e);
            group
                .iter()
                .map(|c| format!("{}\n{}", c.new_path, c.diff_text))
                .collect::<Vec<_>>()
                .join("\n\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(i: usize) -> EligibleChange {
        EligibleChange {
            diff_text: format!("@@ -1 +1 @@\n-old {i}\n+new {i}\n"),
            new_path: format!("src/file{i}.py"),
            additions: 1,
            deletions: 1,
        }
    }

    #[test]
    fn split_is_ordered_and_exhaustive() {
        let budget = TokenBudget::new(10_000);
        for n in 0..12 {
            let changes: Vec<_> = (0..n).map(change).collect();
            for k in 1..5 {
                let batches = budget.split(&changes, k);
                assert_eq!(batches.len(), n.div_ceil(k));
                let flat: Vec<String> = batches.iter().flat_map(|b| b.files.clone()).collect();
                let expected: Vec<String> = changes.iter().map(|c| c.new_path.clone()).collect();
                assert_eq!(flat, expected);
                for (i, b) in batches.iter().enumerate() {
                    assert_eq!(b.index, i);
                    if i + 1 < batches.len() {
                        assert_eq!(b.files.len(), k);
                    }
                }
            }
        }
    }

    #[test]
    fn zero_per_batch_means_one() {
        let changes: Vec<_> = (0..3).map(change).collect();
        assert_eq!(TokenBudget::new(100).split(&changes, 0).len(), 3);
    }

    #[test]
    fn batches_truncate_independently() {
        let mut big = change(0);
        big.diff_text = "+ lots of added text here\n".repeat(200);
        let changes = vec![big, change(1)];
        let budget = TokenBudget::new(150);
        let batches = budget.split(&changes, 1);

        assert!(batches[0].truncated);
        assert!(budget.count(&batches[0].text) <= 150);
        assert!(!batches[1].truncated);
        assert_eq!(batches[1].text, serialize_group(&changes[1..]));
    }

    #[test]
    fn batch_text_is_json_of_the_group() {
        let changes: Vec<_> = (0..2).map(change).collect();
        let batches = TokenBudget::new(10_000).split(&changes, 2);
        let v: serde_json::Value = serde_json::from_str(&batches[0].text).unwrap();
        assert_eq!(v[1]["new_path"], "src/file1.py");
        assert_eq!(batches[0].label(), "Batch 1 (files: src/file0.py, src/file1.py)");
    }
}
