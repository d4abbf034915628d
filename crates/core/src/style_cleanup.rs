//! Inline style removal and class allow-listing.
//!
//! Only classes that carry an annotation are meaningful downstream, so every other class
//! token is dropped together with all inline `style` attributes.

use crate::constants::{CLASS_ATTRIBUTE, STYLE_ATTRIBUTE};
use crate::html::{Element, Fragment};
use std::collections::BTreeSet;

/// Strip `style` attributes and non-allow-listed class tokens from every element.
///
/// Kept class tokens are written in sorted order; a class attribute left with no tokens is
/// removed. Returns the number of elements that were modified.
pub fn strip_styles_and_classes(fragment: &mut Fragment, allowed: &BTreeSet<String>) -> usize {
    let mut modified = 0;
    fragment.for_each_element_mut(|element| {
        if clean_element(element, allowed) {
            modified += 1;
        }
    });
    modified
}

/// Clean a markup string and serialize the result.
///
/// Empty and whitespace-only input is returned unchanged.
pub fn cleanup_html_styles_and_classes(html: &str, allowed: &BTreeSet<String>) -> String {
    cleanup_fragment(html, allowed).unwrap_or_else(|| html.to_owned())
}

/// Clean a markup string, returning `None` when nothing needed to change.
pub fn cleanup_fragment(html: &str, allowed: &BTreeSet<String>) -> Option<String> {
    if html.trim().is_empty() {
        return None;
    }
    let mut fragment = Fragment::parse(html);
    match strip_styles_and_classes(&mut fragment, allowed) {
        0 => None,
        _ => Some(fragment.to_html()),
    }
}

fn clean_element(element: &mut Element, allowed: &BTreeSet<String>) -> bool {
    let mut modified = element.remove_attr(STYLE_ATTRIBUTE).is_some();

    if element.attr(CLASS_ATTRIBUTE).is_some() {
        let current = element.class_tokens();
        let mut kept: Vec<String> = current
            .iter()
            .filter(|token| allowed.contains(*token))
            .cloned()
            .collect();
        kept.sort();

        let unchanged = current == kept && !current.is_empty();
        if !unchanged {
            element.set_class_tokens(&kept);
            modified = true;
        }
    }

    modified
}
