//! A small element tree read from quick-xml events.
//!
//! Both resource and feed decoding need to look ahead (repeated siblings,
//! entries whose content comes after their links), so the document is read
//! into a tree first. Whitespace is preserved by the reader so narrative
//! markup is captured exactly; structural code trims text where it needs to.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use crate::error::{Result, SerdeError};
use crate::format::ResourceFormat;

fn malformed(message: impl Into<String>) -> SerdeError {
    SerdeError::malformed(ResourceFormat::Xml, message)
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    std::str::from_utf8(bytes).map_err(|e| malformed(format!("invalid UTF-8: {}", e)))
}

/// Element names whose content is kept as verbatim markup.
const MARKUP_ELEMENTS: [&str; 1] = ["div"];

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct XmlNode {
    /// Local name (namespace prefix stripped).
    pub name: String,
    /// Attributes by local name, unescaped; namespace declarations are dropped.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    /// Character data directly inside this element.
    pub text: String,
    /// The whole element as written, for XHTML narrative.
    pub markup: Option<String>,
}

impl XmlNode {
    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let name = utf8(start.local_name().as_ref())?.to_string();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| malformed(format!("failed to parse attribute: {}", e)))?;
            let key = attr.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let local = utf8(attr.key.local_name().as_ref())?.to_string();
            let raw = utf8(&attr.value)?;
            let value = unescape(raw)
                .map_err(|e| malformed(format!("bad escape in attribute '{}': {}", local, e)))?;
            attributes.push((local, value.into_owned()));
        }
        Ok(Self {
            name,
            attributes,
            ..Self::default()
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

/// Reads a whole document into its root node.
pub(crate) fn parse_document(payload: &[u8]) -> Result<XmlNode> {
    let text = utf8(payload)?;
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| malformed(format!("XML parse error: {}", e)))?;
        match event {
            Event::Start(start) => {
                let mut node = XmlNode::from_start(&start)?;
                if MARKUP_ELEMENTS.contains(&node.name.as_str()) {
                    node.markup = Some(capture_markup(&mut reader, start)?);
                    attach(&mut stack, &mut root, node)?;
                } else {
                    stack.push(node);
                }
            }
            Event::Empty(start) => {
                let mut node = XmlNode::from_start(&start)?;
                if MARKUP_ELEMENTS.contains(&node.name.as_str()) {
                    let mut writer = Writer::new(Vec::new());
                    writer.write_event(Event::Empty(start))?;
                    node.markup = Some(into_string(writer.into_inner())?);
                }
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| malformed("unbalanced end tag"))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    let raw = utf8(text.as_ref())?;
                    let value = unescape(raw).map_err(|e| malformed(format!("bad escape: {}", e)))?;
                    current.text.push_str(&value);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(utf8(data.as_ref())?);
                }
            }
            Event::GeneralRef(reference) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&resolve_reference(utf8(reference.as_ref())?)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(malformed("unexpected end of document"));
    }
    root.ok_or_else(|| malformed("document has no root element"))
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(malformed("more than one root element")),
    }
    Ok(())
}

/// Resolves `&name;` for the predefined entities and character references.
fn resolve_reference(name: &str) -> Result<Cow<'static, str>> {
    let escaped = format!("&{};", name);
    unescape(&escaped)
        .map(|value| Cow::Owned(value.into_owned()))
        .map_err(|e| malformed(format!("unknown entity '&{};': {}", name, e)))
}

/// Re-emits the element opened by `start` and everything up to its end tag.
fn capture_markup(reader: &mut Reader<&[u8]>, start: BytesStart<'_>) -> Result<String> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(start))?;
    let mut depth = 1usize;
    while depth > 0 {
        let event = reader
            .read_event()
            .map_err(|e| malformed(format!("XML parse error: {}", e)))?;
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            Event::Eof => return Err(malformed("unterminated narrative")),
            _ => {}
        }
        writer.write_event(event)?;
    }
    into_string(writer.into_inner())
}

fn into_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| malformed(format!("invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_and_attributes() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:os="http://a9.com/-/spec/opensearch/1.1/">
  <title>Search &amp; results</title>
  <os:totalResults>2</os:totalResults>
  <link rel="self" href="http://x/fhir/Patient?name=a&amp;b"/>
</feed>"#;
        let root = parse_document(xml.as_bytes()).unwrap();
        assert_eq!(root.name, "feed");
        assert!(root.attributes.is_empty());
        assert_eq!(root.child("title").unwrap().trimmed_text(), "Search & results");
        assert_eq!(root.child("totalResults").unwrap().trimmed_text(), "2");
        assert_eq!(
            root.child("link").unwrap().attribute("href"),
            Some("http://x/fhir/Patient?name=a&b")
        );
    }

    #[test]
    fn test_narrative_markup_is_verbatim() {
        let xml = r#"<Patient xmlns="http://hl7.org/fhir"><text><status value="generated"/><div xmlns="http://www.w3.org/1999/xhtml"><p>Peter <b>James</b> &amp; co</p></div></text></Patient>"#;
        let root = parse_document(xml.as_bytes()).unwrap();
        let div = root.child("text").unwrap().child("div").unwrap();
        assert_eq!(
            div.markup.as_deref(),
            Some(r#"<div xmlns="http://www.w3.org/1999/xhtml"><p>Peter <b>James</b> &amp; co</p></div>"#)
        );
    }

    #[test]
    fn test_malformed_documents() {
        assert!(parse_document(b"<a><b></a>").is_err());
        assert!(parse_document(b"<a/><b/>").is_err());
        assert!(parse_document(b"").is_err());
        assert!(parse_document(b"<a>").is_err());
    }
}
