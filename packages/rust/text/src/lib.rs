//! Input normalization for PRD text.
//!
//! Each pass is a function `&str -> String` applied in sequence. The pipeline
//! folds line endings, drops non-printable and non-ASCII characters, collapses
//! blank runs, and trims the result. The ASCII filter is lossy: accented and
//! non-Latin characters are removed, not transliterated.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Run the full normalization pipeline on raw PRD text.
///
/// Idempotent: applying it to its own output is a no-op.
pub fn normalize(raw: &str) -> String {
    let mut result = fold_line_endings(raw);
    result = drop_non_ascii(&result);
    result = collapse_blank_lines(&result);
    let result = result.trim().to_string();

    debug!(raw_len = raw.len(), normalized_len = result.len(), "normalized input text");
    result
}

// ---------------------------------------------------------------------------
// Pass 1: Fold line endings
// ---------------------------------------------------------------------------

/// Convert CRLF pairs to LF. Stray carriage returns fall to the ASCII pass.
fn fold_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Drop non-printable and non-ASCII characters
// ---------------------------------------------------------------------------

/// Keep printable ASCII (0x20 to 0x7E) and newlines; everything else is
/// removed. Tabs and control characters are dropped along with Unicode.
fn drop_non_ascii(text: &str) -> String {
    text.chars()
        .filter(|&c| c == '\n' || (' '..='~').contains(&c))
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 3: Collapse blank runs
// ---------------------------------------------------------------------------

/// Collapse runs of 2+ newlines into exactly one blank line.
fn collapse_blank_lines(text: &str) -> String {
    static MULTI_NEWLINE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

    MULTI_NEWLINE_RE.replace_all(text, "\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_line_endings_converts_crlf() {
        assert_eq!(fold_line_endings("a\r\nb\r\nc"), "a\nb\nc");
    }

    #[test]
    fn drop_non_ascii_removes_unicode() {
        assert_eq!(drop_non_ascii("café"), "caf");
        assert_eq!(drop_non_ascii("naïve — idea 🚀"), "nave  idea ");
    }

    #[test]
    fn drop_non_ascii_removes_tabs_and_controls() {
        assert_eq!(drop_non_ascii("a\tb\x07c"), "abc");
    }

    #[test]
    fn drop_non_ascii_keeps_newlines() {
        assert_eq!(drop_non_ascii("a\nb"), "a\nb");
    }

    #[test]
    fn collapse_blank_lines_keeps_double() {
        let input = "Line 1\n\nLine 2";
        assert_eq!(collapse_blank_lines(input), input);
    }

    #[test]
    fn collapse_blank_lines_collapses_excess() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn normalize_trims_edges() {
        assert_eq!(normalize("  \n  hello world \n\n "), "hello world");
    }

    #[test]
    fn normalize_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \r\n \t "), "");
    }

    #[test]
    fn normalize_full_pipeline() {
        let input = "Title\r\n\r\n\r\n\r\nRequirément #1 ✓\r\n\tdetails here\r\n";
        let result = normalize(input);
        assert_eq!(result, "Title\n\nRequirment #1 \ndetails here");
    }

    #[test]
    fn normalize_is_idempotent() {
        let messy = " PRD:\r\n\r\n\r\nBuild © a widget…\r\n\r\n\r\n\r\nwith käse\t\r\n ";
        let once = normalize(messy);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_preserves_plain_text() {
        let input = "A plain requirement.\n\nWith one blank line.";
        assert_eq!(normalize(input), input);
    }
}
