//! Class usage extraction.

use crate::html::Fragment;
use std::collections::BTreeSet;

/// Every distinct class token used in a markup string.
///
/// Empty and unparsable markup yield the empty set.
pub fn extract_html_classes(html: &str) -> BTreeSet<String> {
    Fragment::parse(html).class_tokens()
}

/// Union of the class tokens used across several fragments.
pub fn extract_classes_from_all<'a, I>(fragments: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut classes = BTreeSet::new();
    for html in fragments {
        classes.extend(extract_html_classes(html));
    }
    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn collects_classes_from_every_element() {
        let html = r#"<div class="container highlight"><p class="highlight  intro">x</p><span class="note">y</span></div>"#;
        assert_eq!(
            extract_html_classes(html),
            set(&["container", "highlight", "intro", "note"])
        );
    }

    #[test]
    fn empty_or_classless_markup_yields_empty_set() {
        assert!(extract_html_classes("").is_empty());
        assert!(extract_html_classes("   \n").is_empty());
        assert!(extract_html_classes("<p>plain</p>").is_empty());
        assert!(extract_html_classes(r#"<p class="  ">blank</p>"#).is_empty());
    }

    #[test]
    fn tolerates_malformed_markup() {
        assert_eq!(
            extract_html_classes(r#"<div class="a"><p class="b">unclosed"#),
            set(&["a", "b"])
        );
    }

    #[test]
    fn unions_across_fragments() {
        let classes = extract_classes_from_all([
            r#"<p class="a">1</p>"#,
            "",
            r#"<span class="b a">2</span>"#,
        ]);
        assert_eq!(classes, set(&["a", "b"]));
    }
}
