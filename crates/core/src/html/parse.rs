//! Fragment parsing.
//!
//! Narratives are XHTML, so a fragment is first read as XML with quick-xml. This keeps
//! self-closed non-void elements such as `<a id="ref"/>` as empty elements. Input that is not
//! well-formed XML (HTML entities, unclosed tags, bare attributes) goes through the html5ever
//! fragment algorithm instead, which recovers from any malformed input, so parsing never fails.

use super::tree::{Element, Fragment, Node};
use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, parse_fragment, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

impl Fragment {
    /// Parse a markup fragment as the content of a `<body>` element.
    ///
    /// Empty and whitespace-only input yields an empty fragment.
    pub fn parse(html: &str) -> Self {
        if html.trim().is_empty() {
            return Self::default();
        }

        match parse_xml(html) {
            Ok(children) => Self { children },
            Err(err) => {
                tracing::debug!(error = %err, "fragment is not well-formed XML, parsing as HTML");
                Self {
                    children: parse_html(html),
                }
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum XmlFragmentError {
    #[error(transparent)]
    Syntax(#[from] quick_xml::Error),

    #[error(transparent)]
    Attribute(#[from] AttrError),

    #[error("end tag without a matching start tag")]
    UnmatchedEnd,

    #[error("<{0}> is never closed")]
    Unclosed(String),
}

fn parse_xml(xml: &str) -> Result<Vec<Node>, XmlFragmentError> {
    let mut reader = Reader::from_str(xml);
    let mut open: Vec<Element> = Vec::new();
    let mut top: Vec<Node> = Vec::new();

    loop {
        let node = match reader.read_event()? {
            Event::Start(ref start) => {
                open.push(xml_element(start)?);
                continue;
            }
            Event::End(_) => {
                let element = open.pop().ok_or(XmlFragmentError::UnmatchedEnd)?;
                Node::Element(element)
            }
            Event::Empty(ref start) => Node::Element(xml_element(start)?),
            Event::Text(text) => Node::Text(text.unescape()?.into_owned()),
            Event::CData(data) => Node::Text(String::from_utf8_lossy(&data).into_owned()),
            Event::Comment(comment) => Node::Comment(String::from_utf8_lossy(&comment).into_owned()),
            Event::Eof => break,
            _ => continue,
        };

        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => top.push(node),
        }
    }

    match open.pop() {
        Some(element) => Err(XmlFragmentError::Unclosed(element.name)),
        None => Ok(top),
    }
}

fn xml_element(start: &BytesStart<'_>) -> Result<Element, XmlFragmentError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if element.attr(&key).is_none() {
            let value = attr.unescape_value()?.into_owned();
            element.attrs.push((key, value));
        }
    }
    Ok(element)
}

fn parse_html(html: &str) -> Vec<Node> {
    let dom = parse_fragment(
        RcDom::default(),
        ParseOpts::default(),
        QualName::new(None, ns!(html), local_name!("body")),
        Vec::new(),
    )
    .one(html);

    // The fragment parser places the parsed nodes under a synthetic <html> root.
    let mut children = Vec::new();
    for root in dom.document.children.borrow().iter() {
        for child in root.children.borrow().iter() {
            if let Some(node) = convert_handle_to_node(child) {
                children.push(node);
            }
        }
    }
    children
}

fn convert_handle_to_node(handle: &Handle) -> Option<Node> {
    match &handle.data {
        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let mut element = Element::new(name.local.to_string());
            for attr in attrs.borrow().iter() {
                let attr_name = match &attr.name.prefix {
                    Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                    None => attr.name.local.to_string(),
                };
                if element.attr(&attr_name).is_none() {
                    element.attrs.push((attr_name, attr.value.to_string()));
                }
            }

            let content_root = template_contents.borrow().clone();
            let content_root = content_root.as_ref().unwrap_or(handle);
            element.children = content_root
                .children
                .borrow()
                .iter()
                .filter_map(convert_handle_to_node)
                .collect();

            Some(Node::Element(element))
        }
        NodeData::Text { contents } => Some(Node::Text(contents.borrow().to_string())),
        NodeData::Comment { contents } => Some(Node::Comment(contents.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(fragment: &Fragment) -> &Element {
        fragment
            .children
            .iter()
            .find_map(Node::as_element)
            .expect("fragment should contain an element")
    }

    #[test]
    fn parses_nested_elements_and_attributes() {
        let fragment = Fragment::parse(
            r#"<div xmlns="http://www.w3.org/1999/xhtml" class="a b"><p id="x">Hi <b>there</b></p></div>"#,
        );

        let div = first_element(&fragment);
        assert_eq!(div.name, "div");
        assert_eq!(div.attr("xmlns"), Some("http://www.w3.org/1999/xhtml"));
        assert_eq!(div.class_tokens(), vec!["a", "b"]);

        let p = first_element(&Fragment {
            children: div.children.clone(),
        })
        .clone();
        assert_eq!(p.name, "p");
        assert_eq!(p.attr("id"), Some("x"));
        assert_eq!(fragment.visible_text(), "Hi there");
    }

    #[test]
    fn lower_cases_tag_names() {
        let fragment = Fragment::parse("<DIV><SPAN>x</SPAN></DIV>");
        let div = first_element(&fragment);
        assert_eq!(div.name, "div");
        assert_eq!(div.children[0].as_element().map(|e| e.name.as_str()), Some("span"));
    }

    #[test]
    fn empty_and_whitespace_input_is_empty_fragment() {
        assert!(Fragment::parse("").is_empty());
        assert!(Fragment::parse("  \n\t ").is_empty());
    }

    #[test]
    fn recovers_from_malformed_markup() {
        let fragment = Fragment::parse("<div><p>unclosed <b>bold</div> tail");
        assert_eq!(fragment.visible_text(), "unclosed bold tail");
    }

    #[test]
    fn decodes_entities_and_keeps_comments() {
        let fragment = Fragment::parse("<p>Cost: &pound;50 &amp; more<!-- note --></p>");
        let p = first_element(&fragment);
        assert_eq!(fragment.visible_text(), "Cost: £50 & more");
        assert!(matches!(&p.children[1], Node::Comment(c) if c == " note "));
    }

    #[test]
    fn keeps_self_closed_elements_empty() {
        let fragment = Fragment::parse(r#"<div><a id="ref"/><span class="x"/>after</div>"#);
        let div = first_element(&fragment);

        assert_eq!(div.children.len(), 3);
        let a = div.children[0].as_element().expect("anchor");
        assert_eq!(a.name, "a");
        assert_eq!(a.attr("id"), Some("ref"));
        assert!(a.children.is_empty());
        let span = div.children[1].as_element().expect("span");
        assert_eq!(span.class_tokens(), vec!["x"]);
        assert!(span.children.is_empty());
        assert!(matches!(&div.children[2], Node::Text(t) if t == "after"));
    }

    #[test]
    fn unclosed_void_tags_are_read_as_html() {
        let fragment = Fragment::parse("<p>a<br>b</p>");
        let p = first_element(&fragment);

        assert_eq!(p.children.len(), 3);
        assert_eq!(p.children[1].as_element().map(|e| e.name.as_str()), Some("br"));
        assert_eq!(fragment.visible_text(), "ab");
    }
}
