//! Owned markup tree.
//!
//! Parents own their children by value. There are no parent back-pointers: operations that
//! need a node's parent or siblings work on the parent's `children` vector instead.

use crate::constants::CLASS_ATTRIBUTE;
use serde::Serialize;
use std::collections::BTreeSet;

/// One node of a parsed fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

impl Node {
    /// True for text runs made only of whitespace (including the empty run).
    pub fn is_whitespace_text(&self) -> bool {
        matches!(self, Node::Text(text) if text.trim().is_empty())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }

    fn push_visible_text(&self, out: &mut String) {
        match self {
            Node::Element(element) => element.push_visible_text(out),
            Node::Text(text) => out.push_str(text),
            Node::Comment(_) => {}
        }
    }
}

/// An element with its ordered, uniquely-named attributes and children.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    /// Lower-case tag name.
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing the value in place if the name already exists.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((name.to_owned(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attrs.iter().position(|(n, _)| n == name)?;
        Some(self.attrs.remove(index).1)
    }

    pub fn has_attributes(&self) -> bool {
        !self.attrs.is_empty()
    }

    /// The class attribute as an ordered set of tokens.
    pub fn class_tokens(&self) -> Vec<String> {
        let mut tokens: Vec<String> = Vec::new();
        for token in self
            .attr(CLASS_ATTRIBUTE)
            .unwrap_or_default()
            .split_ascii_whitespace()
        {
            if !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_owned());
            }
        }
        tokens
    }

    /// Replace the class tokens; an empty list removes the attribute.
    pub fn set_class_tokens(&mut self, tokens: &[String]) {
        if tokens.is_empty() {
            self.remove_attr(CLASS_ATTRIBUTE);
        } else {
            self.set_attr(CLASS_ATTRIBUTE, tokens.join(" "));
        }
    }

    pub fn has_element_children(&self) -> bool {
        self.children.iter().any(|c| matches!(c, Node::Element(_)))
    }

    /// True if any descendant text run contains a non-whitespace character.
    pub fn has_visible_text(&self) -> bool {
        self.children.iter().any(|child| match child {
            Node::Element(element) => element.has_visible_text(),
            Node::Text(text) => !text.trim().is_empty(),
            Node::Comment(_) => false,
        })
    }

    /// No element children and no non-whitespace text.
    pub fn is_effectively_empty(&self) -> bool {
        !self.has_element_children() && !self.has_visible_text()
    }

    /// Fold the attributes of an enclosing (or preceding) element into this one.
    ///
    /// Class tokens are unioned, `outer`'s first. For every other attribute this element's
    /// value wins when both define it.
    pub fn merge_attributes_from(&mut self, outer: &Element) {
        let mut classes = outer.class_tokens();
        for token in self.class_tokens() {
            if !classes.contains(&token) {
                classes.push(token);
            }
        }

        for (name, value) in &outer.attrs {
            if name != CLASS_ATTRIBUTE && self.attr(name).is_none() {
                self.attrs.push((name.clone(), value.clone()));
            }
        }

        self.set_class_tokens(&classes);
    }

    fn push_visible_text(&self, out: &mut String) {
        for child in &self.children {
            child.push_visible_text(out);
        }
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Element)) {
        f(self);
        for child in &self.children {
            if let Node::Element(element) = child {
                element.visit(f);
            }
        }
    }

    fn visit_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        f(self);
        for child in &mut self.children {
            if let Node::Element(element) = child {
                element.visit_mut(f);
            }
        }
    }
}

/// A parsed markup fragment: an ordered list of top-level nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fragment {
    pub children: Vec<Node>,
}

/// Lightweight description of an element, for inspection tools.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ElementSummary {
    pub tag: String,
    pub classes: Vec<String>,
    pub text: String,
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Concatenation of every text run, in document order. Comments are not visible.
    pub fn visible_text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.push_visible_text(&mut out);
        }
        out
    }

    /// Distinct class tokens used anywhere in the fragment.
    pub fn class_tokens(&self) -> BTreeSet<String> {
        let mut classes = BTreeSet::new();
        self.for_each_element(|element| classes.extend(element.class_tokens()));
        classes
    }

    /// Visit every element, pre-order.
    pub fn for_each_element<'a>(&'a self, mut f: impl FnMut(&'a Element)) {
        for child in &self.children {
            if let Node::Element(element) = child {
                element.visit(&mut f);
            }
        }
    }

    /// Visit every element mutably, pre-order.
    pub fn for_each_element_mut(&mut self, mut f: impl FnMut(&mut Element)) {
        for child in &mut self.children {
            if let Node::Element(element) = child {
                element.visit_mut(&mut f);
            }
        }
    }

    pub fn find_elements_by_class(&self, class: &str) -> Vec<ElementSummary> {
        self.summaries(|element| element.class_tokens().iter().any(|c| c == class))
    }

    pub fn find_elements_by_tag(&self, tag: &str) -> Vec<ElementSummary> {
        let tag = tag.to_ascii_lowercase();
        self.summaries(|element| element.name == tag)
    }

    fn summaries(&self, mut predicate: impl FnMut(&Element) -> bool) -> Vec<ElementSummary> {
        let mut found = Vec::new();
        self.for_each_element(|element| {
            if predicate(element) {
                let mut text = String::new();
                element.push_visible_text(&mut text);
                found.push(ElementSummary {
                    tag: element.name.clone(),
                    classes: element.class_tokens(),
                    text: text.trim().to_owned(),
                });
            }
        });
        found
    }
}
