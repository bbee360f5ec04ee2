//! Line findings: the structured output of the line-level review.
//!
//! Completion output is free text that is supposed to be JSON. Decoding is
//! tolerant: a surrounding code fence is dropped, a bare list or an object
//! holding a list under any key is accepted, and field names of both the
//! `{file_path, line_number, comment}` and the
//! `{file, lines, analysis, suggestion}` shapes are understood.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::errors::FindingsError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Suggestion,
    #[default]
    Info,
}

impl Severity {
    /// Lenient name mapping; unknown names are `Info`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" | "blocker" | "high" | "error" => Severity::Critical,
            "warning" | "warn" | "major" | "medium" => Severity::Warning,
            "suggestion" | "minor" | "low" | "nit" => Severity::Suggestion,
            _ => Severity::Info,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Critical => "🚨",
            Severity::Warning => "⚠️",
            Severity::Suggestion => "💡",
            Severity::Info => "ℹ️",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::Warning => "Warning",
            Severity::Suggestion => "Suggestion",
            Severity::Info => "Info",
        }
    }
}

/// A review remark attached to one line. Fields the model may omit are
/// optional; positioning skips findings that lack them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineFinding {
    pub file_path: Option<String>,
    pub line_number: Option<u32>,
    pub old_line: Option<u32>,
    pub comment: Option<String>,
    pub severity: Severity,
}

/// Decodes completion output for the file at `reviewed_path`.
///
/// Items that are not objects are dropped. A finding naming another file is
/// corrected to `reviewed_path`.
pub fn parse_findings(output: &str, reviewed_path: &str) -> Result<Vec<LineFinding>, FindingsError> {
    let body = strip_code_fence(output);
    let value: Value = serde_json::from_str(body)?;

    let items: Vec<Value> = match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            let listed = map.iter().find_map(|(key, v)| match v {
                Value::Array(items) if is_finding_list(key, items) => {
                    debug!("findings: list found under key {:?}", key);
                    Some(items.clone())
                }
                _ => None,
            });
            listed.unwrap_or_else(|| vec![Value::Object(map)])
        }
        _ => return Err(FindingsError::NoList),
    };

    let findings = items
        .iter()
        .filter_map(|item| match item {
            Value::Object(obj) => Some(to_finding(obj, reviewed_path)),
            other => {
                warn!("findings: skip non-object item {}", other);
                None
            }
        })
        .collect();
    Ok(findings)
}

/// Keys models commonly wrap the findings in.
const LIST_KEYS: &[&str] = &["findings", "reviews", "comments", "issues", "results"];

/// An array is the finding list when it sits under a list key or holds
/// objects only; `{"lines": [40, 42]}` is a single finding.
fn is_finding_list(key: &str, items: &[Value]) -> bool {
    LIST_KEYS.contains(&key) || (!items.is_empty() && items.iter().all(Value::is_object))
}

fn to_finding(obj: &Map<String, Value>, reviewed_path: &str) -> LineFinding {
    let file_path = match first_str(obj, &["file_path", "file", "path"]) {
        Some(p) if p != reviewed_path => {
            warn!("findings: correct file {:?} -> {:?}", p, reviewed_path);
            reviewed_path.to_string()
        }
        Some(p) => p,
        None => reviewed_path.to_string(),
    };

    let line_number = ["line_number", "line", "new_line", "lines"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(first_line_number));
    let old_line = obj.get("old_line").and_then(first_line_number);

    let severity = first_str(obj, &["severity", "level"])
        .map(|s| Severity::parse(&s))
        .unwrap_or_default();

    LineFinding {
        file_path: Some(file_path),
        line_number,
        old_line,
        comment: comment_of(obj),
        severity,
    }
}

fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `12`, `"12"`, `"12-15"`, `[12, 15]` and `{"start": 12}` all give 12.
fn first_line_number(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => {
            let digits: String = s
                .trim_start()
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(char::is_ascii_digit)
                .collect();
            digits.parse().ok()
        }
        Value::Array(items) => items.first().and_then(first_line_number),
        Value::Object(o) => o.get("start").and_then(first_line_number),
        _ => None,
    }
}

fn comment_of(obj: &Map<String, Value>) -> Option<String> {
    if let Some(c) = first_str(obj, &["comment", "body", "message"]) {
        return Some(c);
    }
    let analysis = first_str(obj, &["analysis", "description", "issue"]);
    let suggestion = first_str(obj, &["suggestion", "fix"]);
    let category = first_str(obj, &["category"]);

    let mut out = String::new();
    if let Some(cat) = category {
        out.push_str(&format!("[{cat}] "));
    }
    if let Some(a) = analysis {
        out.push_str(&a);
    }
    if let Some(s) = suggestion {
        if !out.trim().is_empty() {
            out.push_str("\n\n");
        }
        out.push_str("Suggestion: ");
        out.push_str(&s);
    }
    Some(out.trim().to_string()).filter(|s| !s.is_empty())
}

/// Drops a surrounding ```` ``` ```` fence with any language tag.
fn strip_code_fence(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return t;
    };
    match inner.split_once('\n') {
        Some((_tag, body)) => body.trim(),
        None => inner.trim(),
    }
}
