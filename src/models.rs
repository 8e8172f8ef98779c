use crate::config::FIELD_DELIMITER;
use memchr::memmem;
use std::borrow::Cow;

/// A namespace-0 page as read from the dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub id: u32,
    pub title: String,
    pub is_redirect: bool,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRecord {
    pub source_title: String,
    pub raw_target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub source_page_id: u32,
    pub raw_target: String,
}

/// Resolved `(source_page_id, target_page_id)` pair. Duplicates and self loops are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: u32,
    pub target: u32,
}

/// Splits a stream line on the first `<|>`. Trailing newline characters are ignored.
pub fn split_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\n', '\r']);
    let pos = memmem::find(line.as_bytes(), FIELD_DELIMITER.as_bytes())?;
    Some((&line[..pos], &line[pos + FIELD_DELIMITER.len()..]))
}

/// Streams are one record per line, so embedded line breaks become spaces.
pub fn single_line(s: &str) -> Cow<'_, str> {
    if s.contains(['\n', '\r']) {
        Cow::Owned(s.replace(['\n', '\r'], " "))
    } else {
        Cow::Borrowed(s)
    }
}

impl RedirectRecord {
    pub fn parse(line: &str) -> Option<Self> {
        let (source, target) = split_line(line)?;
        Some(Self {
            source_title: source.to_string(),
            raw_target: target.to_string(),
        })
    }
}

impl LinkRecord {
    pub fn parse(line: &str) -> Option<Self> {
        let (id, target) = split_line(line)?;
        Some(Self {
            source_page_id: id.parse().ok()?,
            raw_target: target.to_string(),
        })
    }
}

/// Parses a pages-stream line into `(id, title)`.
pub fn parse_page_line(line: &str) -> Option<(u32, &str)> {
    let (id, title) = split_line(line)?;
    Some((id.parse().ok()?, title))
}
