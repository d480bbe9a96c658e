//! Delimited-text dialect detection from a byte prefix.
//!
//! The sniffer only ever sees the first [`SNIFF_BYTES`] of a file. It is a
//! heuristic: single-column files and files whose first kilobyte is dominated
//! by one giant quoted field fall back to comma-separated defaults.

use super::{FormatDescriptor, Terminator};

/// Size of the prefix handed to [`sniff`].
pub const SNIFF_BYTES: usize = 1024;

/// Candidate delimiters in tie-break order.
const DELIMITERS: [u8; 5] = [b',', b'\t', b';', b'|', b':'];

/// How well one delimiter candidate explains the sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimiterScore {
    pub delimiter: u8,
    /// Occurrences on the first (header) line.
    pub per_line: usize,
    /// Lines with exactly `per_line` occurrences.
    pub consistent_lines: usize,
}

/// Infer the format of a file from its first bytes.
///
/// `truncated` tells the sniffer the sample was cut at [`SNIFF_BYTES`], in
/// which case the trailing partial line is ignored.
pub fn sniff(sample: &[u8], truncated: bool) -> FormatDescriptor {
    let decoded = String::from_utf8_lossy(sample);
    let mut text: &str = &decoded;
    if truncated {
        if let Some(cut) = text.rfind('\n') {
            text = &text[..cut];
        }
    }

    let terminator = if text.contains("\r\n") {
        Terminator::CrLf
    } else {
        Terminator::Lf
    };
    let quote = guess_quote(text);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let delimiter = best_delimiter(&lines, quote).map_or(b',', |s| s.delimiter);
    let escape = guess_escape(text, quote);

    FormatDescriptor {
        delimiter,
        quote,
        double_quote: escape.is_none(),
        escape,
        terminator,
    }
}

/// Score every candidate and return the winner, if any candidate appears at all.
pub fn best_delimiter(lines: &[&str], quote: u8) -> Option<DelimiterScore> {
    let first = lines.first()?;
    let mut best: Option<DelimiterScore> = None;
    for &delimiter in &DELIMITERS {
        let per_line = count_unquoted(first, delimiter, quote);
        if per_line == 0 {
            continue;
        }
        let consistent_lines = lines
            .iter()
            .filter(|l| count_unquoted(l, delimiter, quote) == per_line)
            .count();
        let candidate = DelimiterScore {
            delimiter,
            per_line,
            consistent_lines,
        };
        // strictly greater keeps the earlier candidate on ties
        if best.is_none_or(|b| candidate.consistent_lines > b.consistent_lines) {
            best = Some(candidate);
        }
    }
    best
}

fn count_unquoted(line: &str, delimiter: u8, quote: u8) -> usize {
    let mut in_quotes = false;
    let mut n = 0;
    for &b in line.as_bytes() {
        if b == quote {
            in_quotes = !in_quotes;
        } else if b == delimiter && !in_quotes {
            n += 1;
        }
    }
    n
}

/// `'` only wins when it quotes whole fields and `"` never does. A quote
/// counts only if it opens a field and closes right before a delimiter or
/// the end of the line, so a value like `'90s band` is plain text.
fn guess_quote(text: &str) -> u8 {
    let mut double = 0usize;
    let mut single = 0usize;
    for line in text.lines() {
        let bytes = line.as_bytes();
        for (i, &b) in bytes.iter().enumerate() {
            let at_field_start = i == 0 || DELIMITERS.contains(&bytes[i - 1]);
            let is_quote = b == b'"' || b == b'\'';
            if !at_field_start || !is_quote || !closes_field(&bytes[i + 1..], b) {
                continue;
            }
            match b {
                b'"' => double += 1,
                b'\'' => single += 1,
                _ => {}
            }
        }
    }
    if double == 0 && single > 0 { b'\'' } else { b'"' }
}

/// Whether `rest`, the bytes after an opening `quote`, holds a closing quote
/// followed by a delimiter candidate or the end of the line. Doubled and
/// backslash-escaped quotes stay inside the field.
fn closes_field(rest: &[u8], quote: u8) -> bool {
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            b'\\' => i += 2,
            b if b == quote => {
                if rest.get(i + 1) == Some(&quote) {
                    i += 2;
                    continue;
                }
                return rest.get(i + 1).is_none_or(|n| DELIMITERS.contains(n));
            }
            _ => i += 1,
        }
    }
    false
}

fn guess_escape(text: &str, quote: u8) -> Option<u8> {
    text.as_bytes()
        .windows(2)
        .any(|w| w[0] == b'\\' && w[1] == quote)
        .then_some(b'\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_default() {
        let f = sniff(b"id,name\n1,a\n2,b\n", false);
        assert_eq!(f.delimiter, b',');
        assert_eq!(f.quote, b'"');
        assert!(f.double_quote);
        assert_eq!(f.terminator, Terminator::Lf);
    }

    #[test]
    fn semicolon_tab_pipe() {
        assert_eq!(sniff(b"a;b\n1;2\n", false).delimiter, b';');
        assert_eq!(sniff(b"a\tb\n1\t2\n", false).delimiter, b'\t');
        assert_eq!(sniff(b"a|b\n1|2\n", false).delimiter, b'|');
    }

    #[test]
    fn quoted_commas_do_not_confuse_semicolon_files() {
        let f = sniff(b"id;note\n1;\"x, y, z\"\n2;\"a, b\"\n", false);
        assert_eq!(f.delimiter, b';');
    }

    #[test]
    fn consistency_beats_order() {
        // one comma on the header only, two semicolons everywhere
        let f = sniff(b"a;b,c;d\n1;2;3\n4;5;6\n", false);
        assert_eq!(f.delimiter, b';');
    }

    #[test]
    fn single_column_falls_back_to_comma() {
        let f = sniff(b"id\n1\n2\n", false);
        assert_eq!(f.delimiter, b',');
    }

    #[test]
    fn crlf_and_single_quote() {
        let f = sniff(b"'id','name'\r\n'1','a'\r\n", false);
        assert_eq!(f.terminator, Terminator::CrLf);
        assert_eq!(f.quote, b'\'');
    }

    #[test]
    fn leading_apostrophe_is_not_a_quote() {
        let f = sniff(b"id,name\n1,'90s band\n2,x\n3,y\n", false);
        assert_eq!(f.quote, b'"');
        let f = sniff(b"id,city\n1,'s-Hertogenbosch\n2,Rock 'n' roll\n", false);
        assert_eq!(f.quote, b'"');
    }

    #[test]
    fn quote_must_close_before_delimiter() {
        assert!(closes_field(b"a b',x", b'\''));
        assert!(closes_field(b"a''b'", b'\''));
        assert!(!closes_field(b"90s band", b'\''));
        assert!(!closes_field(b"s x'y,z", b'\''));
    }

    #[test]
    fn backslash_escape() {
        let f = sniff(b"id,txt\n1,\"say \\\"hi\\\"\"\n", false);
        assert_eq!(f.escape, Some(b'\\'));
        assert!(!f.double_quote);
    }

    #[test]
    fn truncated_tail_is_ignored() {
        // the partial last line would add a semicolon-heavy outlier
        let f = sniff(b"a,b\n1,2\n3;4;5;6", true);
        assert_eq!(f.delimiter, b',');
        let s = best_delimiter(&["a,b", "1,2"], b'"').unwrap();
        assert_eq!(s.consistent_lines, 2);
    }
}
