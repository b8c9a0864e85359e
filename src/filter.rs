//! Search filtering over buffered log lines.
//!
//! * Matching is a case-insensitive substring test
//! * The haystack is the ANSI-**stripped** text, never the raw line, so a
//!   query never matches the bytes of an escape sequence
//! * Only lines at or after the clear offset are considered
//! * A display cap keeps the most recent matches, never truncating new
//!   lines away while the user follows the tail

use crate::ansi;

/// Upper bound on lines handed to the view after filtering.
pub const DISPLAY_CAP: usize = 10_000;

pub fn search_lines<'a>(lines: &'a [String], start_offset: usize, query: &str) -> Vec<&'a str> {
    let visible = lines.get(start_offset..).unwrap_or(&[]);
    let needle = query.to_lowercase();

    let matched: Vec<&str> = visible
        .iter()
        .filter(|line| {
            needle.is_empty() || ansi::strip(line).to_lowercase().contains(&needle)
        })
        .map(String::as_str)
        .collect();

    if matched.len() > DISPLAY_CAP {
        matched[matched.len() - DISPLAY_CAP..].to_vec()
    } else {
        matched
    }
}
