//! Deterministic, offline token estimator.
//!
//! Text is pre-split the way BPE tokenizers split words (contractions,
//! optional leading space + letters, up to 3 digits, punctuation runs,
//! whitespace runs), then every piece longer than [`MAX_PIECE_CHARS`] is cut
//! into chunks of that many chars. The pieces cover the text contiguously, so
//! a prefix ending on a piece boundary is a token-boundary truncation.

use std::ops::Range;

use lazy_static::lazy_static;
use regex::Regex;

/// Upper bound of chars per token.
pub const MAX_PIECE_CHARS: usize = 4;

lazy_static! {
    static ref PRE_TOKEN: Regex =
        Regex::new(r"'(?:s|t|re|ve|m|ll|d)| ?\p{L}+| ?\p{N}{1,3}| ?[^\s\p{L}\p{N}]+|\s+")
            .expect("pre-token regex");
}

/// Byte ranges of the tokens of `text`, in order.
pub fn token_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    for m in PRE_TOKEN.find_iter(text) {
        push_chunks(text, m.range(), &mut spans);
    }
    spans
}

fn push_chunks(text: &str, piece: Range<usize>, out: &mut Vec<Range<usize>>) {
    let mut start = piece.start;
    let mut chars = 0;
    for (offset, _) in text[piece.clone()].char_indices() {
        if chars == MAX_PIECE_CHARS {
            out.push(start..piece.start + offset);
            start = piece.start + offset;
            chars = 0;
        }
        chars += 1;
    }
    if start < piece.end {
        out.push(start..piece.end);
    }
}

pub fn count(text: &str) -> usize {
    token_spans(text).len()
}

/// Longest prefix of `text` holding at most `max_tokens` tokens.
pub fn truncate(text: &str, max_tokens: usize) -> &str {
    let spans = token_spans(text);
    if spans.len() <= max_tokens {
        return text;
    }
    match max_tokens.checked_sub(1).and_then(|i| spans.get(i)) {
        Some(last) => &text[..last.end],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_cover_text_contiguously() {
        let text = "fn main() {\n    let café = 12345; // it's ok\n}";
        let spans = token_spans(text);
        let mut pos = 0;
        for s in &spans {
            assert_eq!(s.start, pos);
            assert!(text[s.clone()].chars().count() <= MAX_PIECE_CHARS);
            pos = s.end;
        }
        assert_eq!(pos, text.len());
    }

    #[test]
    fn counting_is_stable() {
        let text = "def handler(event):\n    return event['body']\n";
        assert_eq!(count(text), count(text));
        assert_eq!(count(""), 0);
        assert_eq!(count("hello"), 2); // "hell" + "o"
        assert_eq!(count(" is"), 1);
        assert_eq!(count("123456"), 2);
    }

    #[test]
    fn truncation_respects_budget() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
        for budget in [0, 1, 7, 50, 1000] {
            let t = truncate(&text, budget);
            assert!(count(t) <= budget);
            assert!(text.starts_with(t));
            assert_eq!(truncate(t, budget), t);
        }
        assert_eq!(truncate(&text, 10_000), text);
    }

    #[test]
    fn truncation_keeps_utf8_boundaries() {
        let text = "überprüfung überprüfung";
        let t = truncate(text, 3);
        assert!(text.starts_with(t));
        assert_eq!(count(t), 3);
    }
}
