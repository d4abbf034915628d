//! Visible-text comparison used to accept or reject an optimized fragment.

use crate::html::Fragment;

/// Visible text of a markup string: every text run in document order, trimmed at the ends.
pub fn extract_text_content(html: &str) -> String {
    Fragment::parse(html).visible_text().trim().to_owned()
}

/// True when `optimized` shows exactly the same text as `original`.
///
/// Only the ends of the concatenated text are trimmed; whitespace between runs is compared
/// verbatim. Two empty fragments are equal.
pub fn validate_content_integrity(original: &str, optimized: &str) -> bool {
    let before = extract_text_content(original);
    let after = extract_text_content(optimized);
    if before != after {
        tracing::debug!(
            before_len = before.len(),
            after_len = after.len(),
            "visible text differs after optimization"
        );
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_trimmed_text_in_order() {
        let html = "\n <div><p>First <b>bold</b></p><p>second</p></div> \n";
        assert_eq!(extract_text_content(html), "First boldsecond");
    }

    #[test]
    fn structure_changes_with_same_text_are_valid() {
        assert!(validate_content_integrity(
            r#"<div><div class="a"><span></span>Same text</div></div>"#,
            r#"<div class="a">Same text</div>"#,
        ));
    }

    #[test]
    fn changed_text_is_invalid() {
        assert!(!validate_content_integrity("<p>Dose: 5 mg</p>", "<p>Dose: 50 mg</p>"));
    }

    #[test]
    fn interior_whitespace_is_significant() {
        assert!(!validate_content_integrity("<p>a<span> </span>b</p>", "<p>ab</p>"));
        assert!(validate_content_integrity("  <p>ab</p>", "<p>ab</p>\n"));
    }

    #[test]
    fn empty_fragments_are_valid() {
        assert!(validate_content_integrity("", ""));
        assert!(validate_content_integrity("  ", "<div><span></span></div>"));
        assert_eq!(extract_text_content(""), "");
    }
}
