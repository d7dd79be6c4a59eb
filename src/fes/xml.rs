//! A small ordered XML tree for rewriting WFS documents.
//!
//! The tree keeps client formatting (whitespace text, attribute order) so a
//! rewritten document differs from the original only where a filter was
//! touched. Namespace declarations are kept apart from ordinary attributes
//! and are always written first.

use quick_xml::escape::{minimal_escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Qualified name as written, e.g. `ogc:Filter`
    pub name: String,
    /// `(prefix, uri)` pairs; the default namespace has an empty prefix
    pub namespaces: Vec<(String, String)>,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.push((prefix.into(), uri.into()));
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map(|(_, local)| local)
            .unwrap_or(&self.name)
    }

    /// Attribute value looked up by local name, ignoring any prefix
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| {
                name.rsplit_once(':').map(|(_, l)| l).unwrap_or(name) == local_name
            })
            .map(|(_, value)| value.as_str())
    }

    pub fn declares(&self, prefix: &str) -> bool {
        self.namespaces.iter().any(|(p, _)| p == prefix)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn find_child_mut(&mut self, local_name: &str) -> Option<&mut Element> {
        self.child_elements_mut()
            .find(|e| e.local_name() == local_name)
    }
}

/// Namespace declarations in scope at some point of a document
#[derive(Debug, Clone, Default)]
pub struct NamespaceScope {
    declarations: Vec<(String, String)>,
}

impl NamespaceScope {
    /// Scope inside `element`, including its own declarations
    pub fn enter(&self, element: &Element) -> Self {
        let mut declarations = self.declarations.clone();
        declarations.extend(element.namespaces.iter().cloned());
        Self { declarations }
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }
}

/// Parse a document and return its root element.
///
/// The XML declaration, DOCTYPE and processing instructions are dropped.
pub fn parse_document(input: &str) -> AppResult<Element> {
    let mut reader = Reader::from_str(input);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                ensure_no_root(&root)?;
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                ensure_no_root(&root)?;
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| AppError::InvalidXml("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                let text = text.unescape()?.into_owned();
                match stack.last_mut() {
                    Some(parent) => parent.children.push(Node::Text(text)),
                    None if text.trim().is_empty() => {}
                    None => {
                        return Err(AppError::InvalidXml(
                            "text outside of the root element".to_string(),
                        ));
                    }
                }
            }
            Event::CData(data) => {
                let data = String::from_utf8_lossy(&data.into_inner()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::CData(data));
                }
            }
            Event::Comment(comment) => {
                let comment = String::from_utf8_lossy(&comment.into_inner()).into_owned();
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Comment(comment));
                }
            }
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
    }

    if !stack.is_empty() {
        return Err(AppError::InvalidXml("unclosed element".to_string()));
    }

    root.ok_or_else(|| AppError::InvalidXml("document has no root element".to_string()))
}

fn ensure_no_root(root: &Option<Element>) -> AppResult<()> {
    match root {
        Some(_) => Err(AppError::InvalidXml(
            "content after the root element".to_string(),
        )),
        None => Ok(()),
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => *root = Some(element),
    }
}

fn element_from_start(start: &BytesStart<'_>) -> AppResult<Element> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| AppError::InvalidXml(e.to_string()))?
        .to_string();
    let mut element = Element::new(name);

    for attribute in start.attributes() {
        let attribute = attribute?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|e| AppError::InvalidXml(e.to_string()))?
            .to_string();
        let value = attribute.unescape_value()?.into_owned();

        if key == "xmlns" {
            element.namespaces.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            element.namespaces.push((prefix.to_string(), value));
        } else {
            element.attributes.push((key, value));
        }
    }

    Ok(element)
}

pub fn serialize(element: &Element) -> String {
    let mut out = String::new();
    write_element(&mut out, element);
    out
}

/// Only `&`, `<` and the `"` delimiter need escaping inside an attribute
fn escape_attribute(value: &str) -> String {
    minimal_escape(value).replace('"', "&quot;")
}

fn write_element(out: &mut String, element: &Element) {
    out.push('<');
    out.push_str(&element.name);

    for (prefix, uri) in &element.namespaces {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        out.push_str(&escape_attribute(uri));
        out.push('"');
    }

    for (name, value) in &element.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attribute(value));
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }

    out.push('>');
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(out, e),
            Node::Text(text) => out.push_str(&partial_escape(text.as_str())),
            Node::CData(data) => {
                out.push_str("<![CDATA[");
                out.push_str(data);
                out.push_str("]]>");
            }
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
        }
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}
