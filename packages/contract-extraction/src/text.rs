//! Cleanup for text pulled out of contract PDFs.
//!
//! PDF text layers and OCR output carry page furniture (page numbers,
//! signature rules) and ragged whitespace. [`clean_text`] strips that while
//! keeping paragraph breaks, which the chunker splits on.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // "Page 3" or "3 Page" footers
    static ref PAGE_MARKER: Regex = Regex::new(r"\bPage\s\d+\b|\b\d+\sPage\b").expect("valid regex");

    // "----- Signature -----" rules
    static ref SIGNATURE_RULE: Regex =
        Regex::new(r"(?i)-+\s*signature\s*-+").expect("valid regex");

    // Any run of whitespace other than newlines
    static ref INLINE_SPACE: Regex = Regex::new(r"[^\S\n]+").expect("valid regex");

    static ref SPACE_AROUND_NEWLINE: Regex = Regex::new(r" ?\n ?").expect("valid regex");

    static ref BLANK_LINES: Regex = Regex::new(r"\n{3,}").expect("valid regex");
}

/// Normalize extracted contract text.
///
/// Removes page markers and signature rules, collapses whitespace runs to a
/// single space, and collapses runs of blank lines to one paragraph break.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = PAGE_MARKER.replace_all(&text, "");
    let text = SIGNATURE_RULE.replace_all(&text, "");
    let text = INLINE_SPACE.replace_all(&text, " ");
    let text = SPACE_AROUND_NEWLINE.replace_all(&text, "\n");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Number of paragraphs `clean_text` output will split into.
pub fn paragraph_count(text: &str) -> usize {
    text.split("\n\n").filter(|p| !p.trim().is_empty()).count()
}
