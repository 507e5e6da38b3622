//! PDF metadata extraction.

mod pdf;

pub use pdf::extract_metadata;

use crate::document::PREVIEW_MAX_CHARS;

/// Metadata extracted from an uploaded PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfSummary {
    pub page_count: u32,
    /// At most [`PREVIEW_MAX_CHARS`] characters, never containing NUL.
    pub text_preview: String,
}

/// Normalizes raw page text into a preview: trimmed, NUL-free and
/// truncated to [`PREVIEW_MAX_CHARS`] characters.
pub fn make_preview(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != '\0')
        .take(PREVIEW_MAX_CHARS)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_is_trimmed() {
        assert_eq!(make_preview("  hello world \n"), "hello world");
    }

    #[test]
    fn test_preview_strips_nul() {
        assert_eq!(make_preview("a\0b\0c"), "abc");
    }

    #[test]
    fn test_preview_is_bounded() {
        let long = "x".repeat(2_000);
        assert_eq!(make_preview(&long).chars().count(), PREVIEW_MAX_CHARS);
    }

    #[test]
    fn test_preview_counts_characters_not_bytes() {
        let long = "é".repeat(600);
        let preview = make_preview(&long);
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS);
        assert_eq!(preview.len(), PREVIEW_MAX_CHARS * 2);
    }
}
