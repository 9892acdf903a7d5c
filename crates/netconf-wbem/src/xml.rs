// crates/netconf-wbem/src/xml.rs
// ============================================================================
// Module: XML Tree
// Description: Minimal element tree over quick-xml for CIM-XML documents.
// Purpose: Decouple CIM-XML decoding from streaming XML events.
// Dependencies: quick-xml
// ============================================================================

//! ## Overview
//! CIM-XML messages are small and deeply nested, so they are read into an
//! owned element tree first and decoded from there. The same tree type builds
//! outgoing requests and serializes with full escaping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;

use crate::error::WbemError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Child node of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    /// Nested element.
    Element(XmlElement),
    /// Unescaped character data.
    Text(String),
}

/// An XML element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XmlElement {
    /// Element name.
    pub name: String,
    /// Attributes in document order.
    pub attrs: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Creates an empty element.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.push((name.to_string(), value.into()));
        self
    }

    /// Adds a child element.
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    /// Adds child elements.
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = Self>) -> Self {
        self.children.extend(children.into_iter().map(XmlNode::Element));
        self
    }

    /// Adds character data.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Returns an attribute value by case-insensitive name.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns a required attribute.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError::Protocol`] when the attribute is missing.
    pub fn require_attr(&self, name: &str) -> Result<&str, WbemError> {
        self.get_attr(name).ok_or_else(|| {
            WbemError::Protocol(format!("<{}> is missing attribute {name}", self.name))
        })
    }

    /// Iterates over child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// Iterates over child elements with the given name.
    pub fn elements_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.elements().filter(move |element| element.name == name)
    }

    /// Returns the first child element with the given name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Self> {
        self.elements().find(|element| element.name == name)
    }

    /// Returns a required child element.
    ///
    /// # Errors
    ///
    /// Returns [`WbemError::Protocol`] when the child is missing.
    pub fn require(&self, name: &str) -> Result<&Self, WbemError> {
        self.find(name)
            .ok_or_else(|| WbemError::Protocol(format!("<{}> is missing <{name}>", self.name)))
    }

    /// Returns the concatenated character data of direct children.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Serializes the element with escaped attributes and text.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    /// Appends the serialized element to `out`.
    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for node in &self.children {
            match node {
                XmlNode::Element(element) => element.write_into(out),
                XmlNode::Text(text) => out.push_str(&escape(text.as_str())),
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a document and returns its root element.
///
/// Whitespace-only text between elements is dropped; other text is kept
/// verbatim.
///
/// # Errors
///
/// Returns [`WbemError::Protocol`] for malformed XML or a missing root.
pub fn parse_document(input: &str) -> Result<XmlElement, WbemError> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    loop {
        let event = reader
            .read_event()
            .map_err(|err| protocol(format!("xml error at {}: {err}", reader.buffer_position())))?;
        match event {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => {
                let element = element_from(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| protocol("unbalanced end tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(|err| protocol(err.to_string()))?;
                push_text(&mut stack, &value);
            }
            Event::CData(data) => {
                let value = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|_| protocol("cdata is not utf-8"))?;
                push_text(&mut stack, &value);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(protocol("unterminated element"));
    }
    root.ok_or_else(|| protocol("document has no root element"))
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a protocol error.
fn protocol(message: impl Into<String>) -> WbemError {
    WbemError::Protocol(message.into())
}

/// Converts a start tag into an element.
fn element_from(start: &BytesStart<'_>) -> Result<XmlElement, WbemError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = XmlElement::new(&name);
    for attr in start.attributes() {
        let attr = attr.map_err(|err| protocol(format!("bad attribute on <{name}>: {err}")))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|err| protocol(err.to_string()))?.into_owned();
        element.attrs.push((key, value));
    }
    Ok(element)
}

/// Attaches a finished element to its parent or makes it the root.
fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), WbemError> {
    if let Some(parent) = stack.last_mut() {
        if matches!(parent.children.last(), Some(XmlNode::Text(text)) if text.trim().is_empty()) {
            parent.children.pop();
        }
        parent.children.push(XmlNode::Element(element));
        return Ok(());
    }
    if root.is_some() {
        return Err(protocol("multiple root elements"));
    }
    *root = Some(element);
    Ok(())
}

/// Appends text to the open element, merging adjacent runs.
fn push_text(stack: &mut [XmlElement], value: &str) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    if let Some(XmlNode::Text(existing)) = parent.children.last_mut() {
        existing.push_str(value);
        return;
    }
    if value.trim().is_empty() && parent.elements().next().is_some() {
        return;
    }
    parent.children.push(XmlNode::Text(value.to_string()));
}
