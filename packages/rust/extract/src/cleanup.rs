//! Post-extraction cleanup pipeline for raw document text.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! PDF text layers come out with hard-wrapped hyphenation, trailing spaces,
//! and long runs of blank lines; these passes normalize all of that.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on raw extracted text.
pub(crate) fn run_pipeline(text: &str) -> String {
    let mut result = text.to_string();

    result = normalize_line_endings(&result);
    result = rejoin_hyphenated_words(&result);
    result = trim_trailing_spaces(&result);
    result = clean_blank_lines(&result);
    result = ensure_trailing_newline(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Line endings
// ---------------------------------------------------------------------------

/// Convert CRLF / CR line endings to LF and drop form feeds.
fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{c}', "\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Hyphenation
// ---------------------------------------------------------------------------

/// Join words split across a line break with a hyphen (`assign-\nment`).
///
/// Only lowercase continuations are joined so that list items such as
/// `Part A -\nB` stay intact.
fn rejoin_hyphenated_words(text: &str) -> String {
    static HYPHEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\p{L})-\n[ \t]*(\p{Ll})").expect("valid regex"));

    HYPHEN_RE.replace_all(text, "$1$2").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Trailing whitespace
// ---------------------------------------------------------------------------

fn trim_trailing_spaces(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 4: Blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 2+ blank lines into exactly one.
fn clean_blank_lines(text: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    MULTI_BLANK_RE
        .replace_all(text.trim_start_matches('\n'), "\n\n")
        .to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Trailing newline
// ---------------------------------------------------------------------------

fn ensure_trailing_newline(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return String::new();
    }
    format!("{trimmed}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejoin_hyphenated_words() {
        let input = "The final assign-\nment is due Friday.";
        assert_eq!(
            rejoin_hyphenated_words(input),
            "The final assignment is due Friday."
        );
    }

    #[test]
    fn test_hyphen_before_uppercase_is_kept() {
        let input = "Section A-\nB overview";
        assert_eq!(rejoin_hyphenated_words(input), input);
    }

    #[test]
    fn test_clean_blank_lines() {
        let input = "\n\nWeek 1\n\n\n\n\nWeek 2\n\nWeek 3";
        assert_eq!(clean_blank_lines(input), "Week 1\n\nWeek 2\n\nWeek 3");
    }

    #[test]
    fn test_full_pipeline() {
        let input = "Syllabus   \r\n\r\n\r\n\r\nMidterm exam-\r\nination on 2025-03-14  \u{c}Page two";
        let result = run_pipeline(input);
        assert_eq!(
            result,
            "Syllabus\n\nMidterm examination on 2025-03-14\nPage two\n"
        );
    }

    #[test]
    fn test_whitespace_only_becomes_empty() {
        assert_eq!(run_pipeline("  \n\n \t\n"), "");
    }
}
