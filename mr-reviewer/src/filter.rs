//! Selection of review-eligible changes.
//!
//! Policy, in order: drop deleted files, drop paths the ignore matcher
//! excludes, keep only allowed extensions (case-sensitive suffix), then count
//! `+`/`-` lines and keep just what the reviewer needs.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::git_providers::RawChange;
use crate::ignore::IgnoreMatcher;

/// A change that survived filtering; the payload sent downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleChange {
    pub diff_text: String,
    pub new_path: String,
    pub additions: usize,
    pub deletions: usize,
}

/// Aggregate counts of a change-set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTotals {
    pub files: usize,
    pub additions: usize,
    pub deletions: usize,
}

impl ChangeTotals {
    pub fn of(changes: &[EligibleChange]) -> Self {
        changes.iter().fold(Self::default(), |acc, c| Self {
            files: acc.files + 1,
            additions: acc.additions + c.additions,
            deletions: acc.deletions + c.deletions,
        })
    }
}

/// Applies the eligibility policy, preserving input order.
pub fn filter_changes(
    raw_changes: &[RawChange],
    allowed_extensions: &[String],
    ignore: Option<&IgnoreMatcher>,
) -> Vec<EligibleChange> {
    let mut out = Vec::with_capacity(raw_changes.len());

    for change in raw_changes {
        if change.deleted {
            debug!("filter: skip deleted {}", change.new_path);
            continue;
        }

        if let Some(matcher) = ignore {
            match matcher.try_is_ignored(&change.new_path) {
                Ok(true) => {
                    debug!("filter: skip ignored {}", change.new_path);
                    continue;
                }
                Ok(false) => {}
                Err(e) => warn!("filter: keep {} (ignore check failed: {})", change.new_path, e),
            }
        }

        if !has_allowed_extension(&change.new_path, allowed_extensions) {
            debug!("filter: skip unsupported extension {}", change.new_path);
            continue;
        }

        let (additions, deletions) = count_line_changes(&change.diff_text);
        out.push(EligibleChange {
            diff_text: change.diff_text.clone(),
            new_path: change.new_path.clone(),
            additions,
            deletions,
        });
    }

    debug!("filter: {} of {} changes eligible", out.len(), raw_changes.len());
    out
}

fn has_allowed_extension(path: &str, allowed: &[String]) -> bool {
    allowed
        .iter()
        .filter(|ext| !ext.is_empty())
        .any(|ext| path.ends_with(ext.as_str()))
}

/// `(additions, deletions)`: `+`/`-` lines excluding `+++`/`---` headers.
pub fn count_line_changes(diff_text: &str) -> (usize, usize) {
    diff_text
        .lines()
        .fold((0, 0), |(adds, dels), line| {
            if line.starts_with('+') && !line.starts_with("+++") {
                (adds + 1, dels)
            } else if line.starts_with('-') && !line.starts_with("---") {
                (adds, dels + 1)
            } else {
                (adds, dels)
            }
        })
}
