pub mod filter;
pub mod line;
pub mod name;
pub mod price;
pub mod units;

pub use filter::*;
pub use line::*;
pub use name::*;
pub use price::*;
pub use units::*;

use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

// Bullets, arrows, check marks and list numbering in front of a line.
static LINE_MARKER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[\s\-*•·▪▫►▶➤➡✔✅☑🔹🔸🔥⚡💥🟢🔴\u{FE0F}>]+|\d{1,2}[.)]\s+)+")
        .expect("Invalid line marker regex")
});

/// A token found in a line together with the byte range it occupied.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenMatch<T> {
    pub value: T,
    pub span: Range<usize>,
}

/// Clean and normalize text by removing extra whitespace and decoding HTML entities
pub fn clean_text(text: &str) -> String {
    let decoded = decode_html_entities(text);
    decoded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Strip bullet/marker prefixes brokers put in front of list lines.
pub fn strip_line_marker(line: &str) -> &str {
    match LINE_MARKER_REGEX.find(line) {
        Some(m) => line[m.end()..].trim(),
        None => line.trim(),
    }
}

/// True when the character starting at byte `end` is a letter.
pub(crate) fn letter_follows(text: &str, end: usize) -> bool {
    text[end..]
        .chars()
        .next()
        .map_or(false, |c| c.is_alphabetic())
}

/// True when the first non-space character from byte `end` is `/`.
pub(crate) fn slash_follows(text: &str, end: usize) -> bool {
    text[end..].trim_start().starts_with('/')
}

/// True when the first non-space character from byte `end` is a digit.
pub(crate) fn digit_follows(text: &str, end: usize) -> bool {
    text[end..]
        .trim_start()
        .starts_with(|c: char| c.is_ascii_digit())
}

/// Replace every span with a single space.
pub fn excise(text: &str, spans: &[Range<usize>]) -> String {
    let mut sorted: Vec<Range<usize>> = spans.iter().filter(|s| s.start < s.end).cloned().collect();
    sorted.sort_by_key(|s| s.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in sorted {
        if span.end <= cursor {
            continue;
        }
        let start = span.start.max(cursor);
        out.push_str(&text[cursor..start]);
        out.push(' ');
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}
