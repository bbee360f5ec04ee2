//! `.aiignore` matcher with `.gitignore`-compatible syntax.
//!
//! Each rule compiles to one regex evaluated with search semantics against a
//! root-relative, `/`-separated path. Rules are checked in declared order and
//! the last matching rule decides (`!` rules un-ignore).
//!
//! Supported syntax: `#` comments, blank lines, `!` negation, trailing `/`
//! (directory only), leading `/` (root anchor), `*`, `**`, `?`, `[...]`
//! classes (`[!...]` negates) and `\` escapes.

use std::path::{Component, Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::errors::{ConfigError, IgnoreError, MrResult};

/// One compiled ignore pattern.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    /// `!pattern`: a match un-ignores the path.
    pub negated: bool,
    /// Pattern body without `!`, leading `/` and trailing `/`.
    pub pattern: String,
    /// `pattern/`: only directories (and so everything below them) match.
    pub is_directory: bool,
    /// `/pattern`: matches from the root only.
    pub anchored: bool,
    regex: Regex,
}

impl IgnoreRule {
    /// Parses one line of an ignore file. `None` for blanks, comments and
    /// patterns that do not compile.
    pub fn parse(line: &str) -> Option<Self> {
        let mut s = line.trim();
        if s.is_empty() || s.starts_with('#') {
            return None;
        }

        let mut negated = false;
        if let Some(rest) = s.strip_prefix('!') {
            negated = true;
            s = rest;
        } else if s.starts_with("\\!") || s.starts_with("\\#") {
            s = &s[1..];
        }

        let mut is_directory = false;
        if let Some(rest) = s.strip_suffix('/') {
            is_directory = true;
            s = rest;
        }

        let mut anchored = false;
        if let Some(rest) = s.strip_prefix('/') {
            anchored = true;
            s = rest;
        }

        if s.is_empty() {
            debug!("ignore: skip empty pattern {:?}", line);
            return None;
        }

        let body = glob_to_regex(s);
        let lead = if anchored { "^" } else { "(?:^|/)" };
        // A directory rule needs a `/` after the match: the path lies below it.
        let tail = if is_directory { "/" } else { "(?:/.*)?$" };
        let source = format!("{lead}{body}{tail}");

        match Regex::new(&source) {
            Ok(regex) => Some(Self {
                negated,
                pattern: s.to_string(),
                is_directory,
                anchored,
                regex,
            }),
            Err(e) => {
                debug!("ignore: skip malformed pattern {:?}: {}", line, e);
                None
            }
        }
    }

    /// Whether this rule matches a normalized, root-relative path.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.regex.is_match(rel_path)
    }
}

/// Translates a glob body into regex source (no anchors).
fn glob_to_regex(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::with_capacity(glob.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:[^/]+/)*");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i + 1..end]));
                    i = end + 1;
                    continue;
                }
                None => out.push_str("\\["),
            },
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    out.push_str(&regex::escape(&next.to_string()));
                    i += 2;
                    continue;
                }
                out.push_str("\\\\");
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }
    out
}

/// Index of the `]` closing the class opened at `open`. A `]` right after
/// `[` or `[!` is a literal member.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut j = open + 1;
    if matches!(chars.get(j), Some('!') | Some('^')) {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() {
        if chars[j] == ']' {
            return Some(j);
        }
        j += 1;
    }
    None
}

fn translate_class(inner: &[char]) -> String {
    let mut out = String::from("[");
    let rest = match inner.split_first() {
        Some(('!' | '^', tail)) => {
            out.push('^');
            tail
        }
        _ => inner,
    };
    for &c in rest {
        match c {
            '\\' | '[' | ']' | '&' | '~' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out.push(']');
    out
}

/// Ordered rule list plus the directory the rules are relative to.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    root: Option<PathBuf>,
    rules: Vec<IgnoreRule>,
}

impl IgnoreMatcher {
    /// Compiles pattern lines in order; unusable lines are skipped.
    pub fn compile<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let rules: Vec<IgnoreRule> = patterns
            .into_iter()
            .filter_map(|p| IgnoreRule::parse(p.as_ref()))
            .collect();
        debug!("ignore: compiled {} rules", rules.len());
        Self { root: None, rules }
    }

    /// Compiles the text of an ignore file.
    pub fn from_content(text: &str) -> Self {
        Self::compile(text.lines())
    }

    /// Reads an ignore file; its parent directory becomes the matcher root.
    pub fn from_file(path: impl AsRef<Path>) -> MrResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::IgnoreFile {
            path: path.display().to_string(),
            source,
        })?;
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);
        Ok(Self::from_content(&text).with_root_opt(root))
    }

    /// Absolute paths are evaluated relative to `root`; others are assumed
    /// relative already.
    pub fn with_root(self, root: impl Into<PathBuf>) -> Self {
        self.with_root_opt(Some(root.into()))
    }

    fn with_root_opt(mut self, root: Option<PathBuf>) -> Self {
        self.root = root;
        self
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Last matching rule wins. Paths that cannot be evaluated are not ignored.
    pub fn is_ignored(&self, path: &str) -> bool {
        self.try_is_ignored(path).unwrap_or(false)
    }

    /// Like [`is_ignored`](Self::is_ignored) but reports paths that climb
    /// above the root through `..`.
    pub fn try_is_ignored(&self, path: &str) -> Result<bool, IgnoreError> {
        if self.rules.is_empty() {
            return Ok(false);
        }
        let Some(rel) = self.relative(path)? else {
            return Ok(false);
        };
        if rel.is_empty() {
            return Ok(false);
        }

        let mut matched = false;
        for rule in &self.rules {
            if rule.matches(&rel) {
                matched = !rule.negated;
            }
        }
        Ok(matched)
    }

    /// Normalized root-relative path; `None` when an absolute path lies
    /// outside the root.
    fn relative(&self, path: &str) -> Result<Option<String>, IgnoreError> {
        let unified = path.replace('\\', "/");
        let p = Path::new(&unified);

        let rel: &Path = if p.is_absolute() {
            match self.root.as_deref().and_then(|r| p.strip_prefix(r).ok()) {
                Some(r) => r,
                None => return Ok(None),
            }
        } else {
            p
        };

        let mut parts: Vec<String> = Vec::new();
        for comp in rel.components() {
            match comp {
                Component::Normal(s) => parts.push(s.to_string_lossy().into_owned()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(IgnoreError::EscapesRoot(path.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Ok(None),
            }
        }
        Ok(Some(parts.join("/")))
    }
}
