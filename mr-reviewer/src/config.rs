//! Review configuration.
//!
//! Read once at startup and passed into the pipeline; nothing here is global.
//!
//! | Variable | Default |
//! |---|---|
//! | `SUPPORTED_EXTENSIONS` | `.java,.py,.php` |
//! | `REVIEW_MAX_TOKENS` | `10000` |
//! | `REVIEW_FILES_PER_BATCH` | `10` |
//! | `AI_IGNORE_FILE` | `.aiignore` (optional when not set explicitly) |
//! | `MERGE_REQUEST_LINE_REVIEW_ENABLED` | `false` |
//! | `REVIEW_STYLE` | `professional` |

use std::path::Path;

use tracing::{debug, warn};

use crate::errors::{ConfigError, MrResult};
use crate::ignore::IgnoreMatcher;
use crate::review::prompt::ReviewStyle;

const DEFAULT_EXTENSIONS: &str = ".java,.py,.php";
const DEFAULT_IGNORE_FILE: &str = ".aiignore";

#[derive(Debug, Clone)]
pub struct ReviewConfig {
    /// Case-sensitive path suffixes eligible for review.
    pub allowed_extensions: Vec<String>,
    /// Token budget of one batch text.
    pub max_tokens: usize,
    pub files_per_batch: usize,
    pub ignore: Option<IgnoreMatcher>,
    pub line_review_enabled: bool,
    pub review_style: ReviewStyle,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: split_list(DEFAULT_EXTENSIONS),
            max_tokens: 10_000,
            files_per_batch: 10,
            ignore: None,
            line_review_enabled: false,
            review_style: ReviewStyle::Professional,
        }
    }
}

impl ReviewConfig {
    pub fn from_env() -> MrResult<Self> {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    /// Builds the config from any variable lookup.
    pub fn from_vars<F>(get: F) -> MrResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();

        let allowed_extensions = get("SUPPORTED_EXTENSIONS")
            .map(|v| split_list(&v))
            .filter(|v| !v.is_empty())
            .unwrap_or(d.allowed_extensions);

        let max_tokens = parse_usize("REVIEW_MAX_TOKENS", get("REVIEW_MAX_TOKENS"), d.max_tokens)?;
        let files_per_batch = parse_usize(
            "REVIEW_FILES_PER_BATCH",
            get("REVIEW_FILES_PER_BATCH"),
            d.files_per_batch,
        )?;

        let ignore = match get("AI_IGNORE_FILE").filter(|v| !v.trim().is_empty()) {
            Some(path) => Some(IgnoreMatcher::from_file(path.trim())?),
            None if Path::new(DEFAULT_IGNORE_FILE).is_file() => {
                Some(IgnoreMatcher::from_file(DEFAULT_IGNORE_FILE)?)
            }
            None => None,
        };

        let line_review_enabled = get("MERGE_REQUEST_LINE_REVIEW_ENABLED")
            .map(|v| parse_bool(&v))
            .unwrap_or(d.line_review_enabled);

        let review_style = match get("REVIEW_STYLE") {
            Some(v) => v.parse().unwrap_or_else(|e| {
                warn!("config: {}, using professional", e);
                ReviewStyle::Professional
            }),
            None => d.review_style,
        };

        let cfg = Self {
            allowed_extensions,
            max_tokens,
            files_per_batch,
            ignore,
            line_review_enabled,
            review_style,
        };
        cfg.validate()?;
        debug!(
            "config: extensions={:?} max_tokens={} files_per_batch={} ignore_rules={} line_review={}",
            cfg.allowed_extensions,
            cfg.max_tokens,
            cfg.files_per_batch,
            cfg.ignore.as_ref().map_or(0, |m| m.rules().len()),
            cfg.line_review_enabled
        );
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "REVIEW_MAX_TOKENS",
            });
        }
        if self.files_per_batch == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "REVIEW_FILES_PER_BATCH",
            });
        }
        Ok(())
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(v: &str) -> bool {
    matches!(
        v.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_usize(var: &'static str, raw: Option<String>, default: usize) -> MrResult<usize> {
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => s.parse().map_err(|_| {
            ConfigError::InvalidNumber {
                var,
                value: s.to_string(),
            }
            .into()
        }),
    }
}

/// Reads a `usize` variable; unset or blank gives `default`.
pub(crate) fn env_usize(var: &'static str, default: usize) -> MrResult<usize> {
    parse_usize(var, std::env::var(var).ok(), default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(vars: &[(&str, &str)]) -> MrResult<ReviewConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ReviewConfig::from_vars(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        let c = cfg(&[]).unwrap();
        assert_eq!(c.allowed_extensions, vec![".java", ".py", ".php"]);
        assert_eq!(c.max_tokens, 10_000);
        assert_eq!(c.files_per_batch, 10);
        assert!(!c.line_review_enabled);
        assert_eq!(c.review_style, ReviewStyle::Professional);
    }

    #[test]
    fn reads_overrides() {
        let c = cfg(&[
            ("SUPPORTED_EXTENSIONS", " .rs, .go ,,"),
            ("REVIEW_MAX_TOKENS", "2000"),
            ("REVIEW_FILES_PER_BATCH", "3"),
            ("MERGE_REQUEST_LINE_REVIEW_ENABLED", "TRUE"),
            ("REVIEW_STYLE", "humorous"),
        ])
        .unwrap();
        assert_eq!(c.allowed_extensions, vec![".rs", ".go"]);
        assert_eq!((c.max_tokens, c.files_per_batch), (2000, 3));
        assert!(c.line_review_enabled);
        assert_eq!(c.review_style, ReviewStyle::Humorous);
    }

    #[test]
    fn rejects_bad_limits() {
        assert!(cfg(&[("REVIEW_FILES_PER_BATCH", "0")]).is_err());
        assert!(cfg(&[("REVIEW_MAX_TOKENS", "0")]).is_err());
        assert!(matches!(
            cfg(&[("REVIEW_MAX_TOKENS", "lots")]),
            Err(crate::errors::Error::Config(ConfigError::InvalidNumber { .. }))
        ));
    }

    #[test]
    fn explicit_ignore_file_must_exist() {
        assert!(cfg(&[("AI_IGNORE_FILE", "/nonexistent/.aiignore")]).is_err());
    }
}
