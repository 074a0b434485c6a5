//! A small element tree read from an HTML document.
//!
//! The reader accepts the XHTML-compatible subset that the markdown
//! transformer produces: quoted or bare attributes, void elements with or
//! without a self-closing slash, and the common named entities. Anything else
//! that does not nest properly is an error.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Error, Result};

/// Elements that never have content or an end tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// First descendant with the given name, depth first.
    pub fn find(&self, name: &str) -> Option<&Element> {
        for child in self.elements() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated text of all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => collect_text(&element.children, out),
        }
    }
}

/// The parts of an HTML document the renderer needs.
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    /// Text of every `<style>` element, in document order.
    pub style: String,
    /// The `<body>` element, or the whole input when there is none.
    pub body: Element,
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Result<Self> {
        let root = parse(html)?;

        let mut styles = Vec::new();
        collect_styles(&root, &mut styles);
        let style = styles.join("\n");

        let body = root.find("body").cloned().unwrap_or(root);
        Ok(Self { style, body })
    }
}

fn collect_styles(element: &Element, out: &mut Vec<String>) {
    for child in element.elements() {
        if child.name == "style" {
            out.push(child.text());
        } else {
            collect_styles(child, out);
        }
    }
}

/// Parse HTML into a tree rooted at a synthetic `#document` element.
pub fn parse(html: &str) -> Result<Element> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.trim_text_start = false;
    config.trim_text_end = false;
    // Void elements written as `<br>` would upset the reader's own tag matching
    config.check_end_names = false;

    let mut stack = vec![Element::new("#document")];

    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let element = open_element(&e, position)?;
                if is_void(&element.name) {
                    append(&mut stack, Node::Element(element));
                } else {
                    stack.push(element);
                }
            }
            Ok(Event::Empty(e)) => {
                let element = open_element(&e, position)?;
                append(&mut stack, Node::Element(element));
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                if is_void(&name) {
                    continue;
                }
                if stack.len() == 1 || stack.last().is_some_and(|open| open.name != name) {
                    return Err(Error::Html {
                        message: format!("unexpected closing tag </{name}>"),
                        position,
                    });
                }
                if let Some(element) = stack.pop() {
                    append(&mut stack, Node::Element(element));
                }
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape_with(html_entity).map_err(|err| Error::Html {
                    message: format!("invalid text content: {err}"),
                    position,
                })?;
                append(&mut stack, Node::Text(text.into_owned()));
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                append(&mut stack, Node::Text(text));
            }
            Ok(Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(Error::Html {
                    message: err.to_string(),
                    position: reader.error_position(),
                });
            }
        }
    }

    if stack.len() > 1 {
        let open = stack.last().map(|e| e.name.clone()).unwrap_or_default();
        return Err(Error::Html {
            message: format!("unclosed element <{open}>"),
            position: reader.buffer_position(),
        });
    }

    Ok(stack.pop().unwrap_or_else(|| Element::new("#document")))
}

fn open_element(e: &BytesStart<'_>, position: u64) -> Result<Element> {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
    let mut element = Element::new(name);

    for attr in e.html_attributes() {
        let attr = attr.map_err(|err| Error::Html {
            message: format!("invalid attribute: {err}"),
            position,
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        let value = attr.unescape_value().map_err(|err| Error::Html {
            message: format!("invalid attribute value: {err}"),
            position,
        })?;
        element.attributes.push((key, value.into_owned()));
    }

    Ok(element)
}

fn append(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

fn html_entity(name: &str) -> Option<&'static str> {
    let value = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        _ => return None,
    };
    Some(value)
}
