//! Markup fragment tree: parsing, serialization and traversal helpers.

mod parse;
mod serialize;
mod tree;

pub use tree::{Element, ElementSummary, Fragment, Node};

/// Elements carrying `class`, summarised, for a markup string.
pub fn find_elements_by_class(html: &str, class: &str) -> Vec<ElementSummary> {
    Fragment::parse(html).find_elements_by_class(class)
}

/// Elements with tag `tag`, summarised, for a markup string.
pub fn find_elements_by_tag(html: &str, tag: &str) -> Vec<ElementSummary> {
    Fragment::parse(html).find_elements_by_tag(tag)
}
