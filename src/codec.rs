//! Snapshot file codec.
//!
//! Format (line oriented):
//!   <key>=\n<body...>
//! Entries are separated by exactly two blank lines ("\n\n\n"). An empty body is just
//! the header line. Encoding sorts by key (BTreeMap order) and ends with a single '\n';
//! an empty mapping encodes to "".
//!
//! Decoding:
//! - CRLF is accepted and normalized to LF;
//! - leading/trailing blank lines of the file are ignored (trailing newline optional);
//! - extra blank lines between entries are tolerated; encode always writes exactly two;
//! - the header line must end with '=' and the key must be non-empty, without
//!   surrounding whitespace; the key is everything before that final '=' (it may contain '=');
//! - duplicate keys are rejected.
//!
//! Bodies can't contain "\n\n\n" (that's the separator) and have trailing line breaks trimmed.

use std::collections::BTreeMap;
use std::fmt;

pub const ENTRY_SEPARATOR: &str = "\n\n\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecError {
    /// 1-based line number of the offending header.
    pub line: usize,
    pub message: String,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for CodecError {}

/// Trim trailing line breaks the way the store stores bodies.
pub fn normalize_body(body: &str) -> String {
    let unified = if body.contains('\r') {
        body.replace("\r\n", "\n")
    } else {
        body.to_string()
    };
    unified.trim_end_matches('\n').to_string()
}

pub fn decode(raw: &str) -> Result<BTreeMap<String, String>, CodecError> {
    let text = raw.replace("\r\n", "\n");

    // Line number of the first non-blank line; blank lines before it are skipped.
    let leading = text.len() - text.trim_start_matches('\n').len();
    let mut line_no = 1 + leading;
    let text = text.trim_matches('\n');

    let mut out = BTreeMap::new();
    if text.is_empty() {
        return Ok(out);
    }

    for raw_chunk in text.split(ENTRY_SEPARATOR) {
        // Hand-edited files may carry more than two blank lines between entries.
        let chunk = raw_chunk.trim_start_matches('\n');
        let header_line = line_no + (raw_chunk.len() - chunk.len());
        line_no += raw_chunk.matches('\n').count() + 3;
        if chunk.is_empty() {
            continue;
        }

        let (header, body) = match chunk.split_once('\n') {
            Some((h, b)) => (h, b),
            None => (chunk, ""),
        };
        let key = parse_header(header, header_line)?;
        if out.contains_key(key) {
            return Err(CodecError {
                line: header_line,
                message: format!("duplicate key '{key}'"),
            });
        }
        out.insert(key.to_string(), body.to_string());
    }
    Ok(out)
}

fn parse_header(header: &str, line: usize) -> Result<&str, CodecError> {
    let key = header.strip_suffix('=').ok_or_else(|| CodecError {
        line,
        message: format!("expected header '<key>=', got '{}'", preview(header)),
    })?;
    if key.is_empty() {
        return Err(CodecError {
            line,
            message: "empty snapshot key".to_string(),
        });
    }
    if key.trim() != key {
        return Err(CodecError {
            line,
            message: format!("snapshot key '{key}' has surrounding whitespace"),
        });
    }
    Ok(key)
}

fn preview(s: &str) -> String {
    const MAX: usize = 60;
    if s.chars().count() <= MAX {
        s.to_string()
    } else {
        let cut: String = s.chars().take(MAX).collect();
        format!("{cut}...")
    }
}

pub fn encode(entries: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (i, (key, body)) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(ENTRY_SEPARATOR);
        }
        out.push_str(key);
        out.push('=');
        if !body.is_empty() {
            out.push('\n');
            out.push_str(body);
        }
    }
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Why `body` would not survive an encode/decode cycle, if it wouldn't.
pub fn body_problem(body: &str) -> Option<&'static str> {
    if body.contains(ENTRY_SEPARATOR) {
        Some("it contains two consecutive blank lines (the entry separator)")
    } else if body.starts_with("\n\n") {
        Some("it starts with two line breaks")
    } else if body.contains('\r') {
        Some("it contains a carriage return")
    } else if body.ends_with('\n') {
        Some("it ends with a line break")
    } else {
        None
    }
}

/// True when `body` survives an encode/decode cycle unchanged.
pub fn is_encodable_body(body: &str) -> bool {
    body_problem(body).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn decodes_spec_example_with_trailing_blank_lines() {
        let m = decode("A.test1=\nfoo\n\n\n").unwrap();
        assert_eq!(m, map(&[("A.test1", "foo")]));
    }

    #[test]
    fn encodes_sorted_with_two_blank_lines() {
        let m = map(&[("b.t", "2"), ("a.t", "line1\nline2")]);
        assert_eq!(encode(&m), "a.t=\nline1\nline2\n\n\nb.t=\n2\n");
    }

    #[test]
    fn body_may_contain_equals_and_key_may_too() {
        let m = map(&[("k[x=1]", "a=b\n=c")]);
        let text = encode(&m);
        assert_eq!(decode(&text).unwrap(), m);
    }

    #[test]
    fn empty_body_round_trips() {
        let m = map(&[("a", ""), ("b", "x")]);
        let text = encode(&m);
        assert_eq!(text, "a=\n\n\nb=\nx\n");
        assert_eq!(decode(&text).unwrap(), m);
    }

    #[test]
    fn empty_file_and_empty_map() {
        assert!(decode("").unwrap().is_empty());
        assert!(decode("\n\n").unwrap().is_empty());
        assert_eq!(encode(&BTreeMap::new()), "");
    }

    #[test]
    fn crlf_is_accepted() {
        let m = decode("a=\r\nfoo\r\nbar\r\n\r\n\r\nb=\r\nbaz").unwrap();
        assert_eq!(m, map(&[("a", "foo\nbar"), ("b", "baz")]));
    }

    #[test]
    fn legacy_same_line_header_is_malformed() {
        let err = decode("a=foo\n").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("expected header"));
    }

    #[test]
    fn malformed_second_entry_reports_its_line() {
        let err = decode("\na=\nfoo\nbar\n\n\nnot a header\nbody").unwrap_err();
        assert_eq!(err.line, 7);
    }

    #[test]
    fn extra_blank_lines_between_entries_are_tolerated() {
        let m = decode("a=\n1\n\n\n\nb=\n2\n\n\n\n\n\nc=\n3\n").unwrap();
        assert_eq!(m, map(&[("a", "1"), ("b", "2"), ("c", "3")]));
        assert_eq!(encode(&m), "a=\n1\n\n\nb=\n2\n\n\nc=\n3\n");

        let err = decode("a=\n1\n\n\n\n\nnope\n").unwrap_err();
        assert_eq!(err.line, 7);
    }

    #[test]
    fn duplicate_key_is_malformed() {
        let err = decode("a=\n1\n\n\na=\n2").unwrap_err();
        assert!(err.message.contains("duplicate"));
    }

    #[test]
    fn normalize_trims_trailing_breaks_only() {
        assert_eq!(normalize_body("\nx\r\ny\n\n"), "\nx\ny");
        assert!(is_encodable_body("\nx\ny"));
        assert!(!is_encodable_body("a\n\n\nb"));
    }
}
