//! XHTML-compatible serialization of [`Fragment`] trees.
//!
//! FHIR narratives are XHTML, so void elements are self-closed (`<br/>`) and only the XML
//! entities are emitted.

use super::tree::{Element, Fragment, Node};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "noscript",
];

impl Fragment {
    /// Serialize the fragment back to markup.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            write_node(&mut out, child, false);
        }
        out
    }
}

impl Element {
    /// Serialize this element and its subtree.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_element(&mut out, self);
        out
    }
}

fn write_node(out: &mut String, node: &Node, raw_text: bool) {
    match node {
        Node::Element(element) => write_element(out, element),
        Node::Text(text) if raw_text => out.push_str(text),
        Node::Text(text) => escape_text(out, text),
        Node::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
    }
}

fn write_element(out: &mut String, element: &Element) {
    out.push('<');
    out.push_str(&element.name);
    for (name, value) in &element.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attribute(out, value);
        out.push('"');
    }

    if element.children.is_empty() && VOID_ELEMENTS.contains(&element.name.as_str()) {
        out.push_str("/>");
        return;
    }
    out.push('>');

    let raw_text = RAW_TEXT_ELEMENTS.contains(&element.name.as_str());
    for child in &element.children {
        write_node(out, child, raw_text);
    }

    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
}
