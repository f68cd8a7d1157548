//! Hand-written SQL fragments.
//!
//! A [`Raw`] fragment carries literal SQL plus its own named parameters and
//! may be placed anywhere a value or column is accepted. Identifier markers
//! of the form `<name>` or `<table.column>` are rewritten into quoted
//! references when the fragment is spliced; a marker directly preceded by
//! `FROM`, `TABLE`, `INTO`, `UPDATE`, or `JOIN` is treated as a table
//! reference and receives the configured prefix. Text inside string quotes
//! is never rescanned or rewritten.

use crate::error::DbResult;
use crate::ident::Quoter;
use crate::value::{Map, Value};

/// A literal SQL fragment with its own named-parameter map.
///
/// Immutable once constructed; the compiler never retains one beyond the
/// call it was passed into.
///
/// # Example
/// ```
/// use querymap::Raw;
///
/// let fragment = Raw::new("<created_at> > NOW() - INTERVAL :days DAY")
///     .bind("days", 7);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Raw {
    text: String,
    params: Map,
}

impl Raw {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Map::new(),
        }
    }

    /// Attach a named parameter. `name` is the placeholder as it appears in
    /// the fragment text, with or without the leading colon.
    pub fn bind(mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        let name = name.as_ref().trim_start_matches(':').to_string();
        self.params.insert(name, value.into());
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &Map {
        &self.params
    }

    /// Resolve identifier markers against the connection's quoter.
    pub fn splice(&self, quoter: &Quoter) -> DbResult<String> {
        splice_markers(&self.text, quoter)
    }
}

/// Keywords whose following marker names a table rather than a column.
const TABLE_CONTEXT: [&str; 5] = ["FROM", "TABLE", "INTO", "UPDATE", "JOIN"];

fn splice_markers(text: &str, quoter: &Quoter) -> DbResult<String> {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices();
    // Some(c) while inside a literal opened with quote character c.
    let mut quote: Option<char> = None;

    while let Some((i, c)) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '\'' || c == '"' || c == '`' {
                    quote = Some(c);
                    out.push(c);
                } else if c == '<' {
                    match read_marker(bytes, i) {
                        Some(end) => {
                            let name = &text[i + 1..end];
                            let quoted = if table_context(&out) {
                                quoter.quote_table(name)?
                            } else {
                                quoter.quote_column(name)?
                            };
                            out.push_str(&quoted);
                            // Marker content is ASCII, so stepping by bytes
                            // lands on a char boundary.
                            while chars.next().is_some_and(|(j, _)| j < end) {}
                        }
                        None => out.push('<'),
                    }
                } else {
                    out.push(c);
                }
            }
        }
    }
    Ok(out)
}

/// If `bytes[start]` opens a well-formed marker, return the index of its
/// closing `>`. Markers contain one or two identifier segments; anything
/// else (a comparison like `a < b`) is left alone.
fn read_marker(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    let mut seen_dot = false;
    let mut segment_len = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'_' || b.is_ascii_alphanumeric() {
            segment_len += 1;
            i += 1;
        } else if b == b'.' && !seen_dot && segment_len > 0 {
            seen_dot = true;
            segment_len = 0;
            i += 1;
        } else if b == b'>' && segment_len > 0 {
            return Some(i);
        } else {
            return None;
        }
    }
    None
}

/// Whether the emitted text so far ends with a table-context keyword
/// (whitespace-tolerant, case-insensitive).
fn table_context(emitted: &str) -> bool {
    let trimmed = emitted.trim_end();
    let word = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphabetic())
        .last()
        .map(|(start, _)| &trimmed[start..])
        .unwrap_or("");
    TABLE_CONTEXT
        .iter()
        .any(|kw| word.eq_ignore_ascii_case(kw))
}
