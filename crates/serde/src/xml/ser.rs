//! XML writer for resources, Atom feeds and tag lists.
//!
//! Output is deterministic and unindented. Element order follows the type
//! shape, then element name.

use std::io::Write;

use helios_client_model::{
    Bundle, Element, ElementShape, EnvelopeContent, Field, ModelFactoryList, Primitive,
    Resource, ResourceEnvelope, Tag, Value, shape::find_element,
};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::Result;
use crate::utils::{self, ATOM_NAMESPACE, FHIR_NAMESPACE, OPENSEARCH_NAMESPACE, TOMBSTONE_NAMESPACE};

/// Attributes that complex elements carry instead of child elements.
const ELEMENT_ATTRIBUTES: [&str; 2] = ["id", "url"];

/// Attributes of a contained resource root.
const CONTAINED_ATTRIBUTES: [&str; 1] = ["id"];

pub(crate) struct XmlWriter<'a, W: Write> {
    writer: Writer<W>,
    factories: &'a ModelFactoryList,
}

impl<'a, W: Write> XmlWriter<'a, W> {
    pub(crate) fn new(inner: W, factories: &'a ModelFactoryList) -> Self {
        Self {
            writer: Writer::new(inner),
            factories,
        }
    }

    pub(crate) fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    pub(crate) fn declaration(&mut self) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(())
    }

    /// Writes a resource root. Only the outermost resource of a document (or of
    /// a feed entry) declares the FHIR namespace.
    pub(crate) fn resource(&mut self, resource: &Resource, contained: bool) -> Result<()> {
        let shape = self.factories.shape_for(resource.resource_type())?;
        let mut start = BytesStart::new(resource.resource_type());
        if !contained {
            start.push_attribute(("xmlns", FHIR_NAMESPACE));
        }
        let attributes: &[&str] = if contained { &CONTAINED_ATTRIBUTES } else { &[] };
        self.element_body(start, resource.body(), &shape.elements, attributes)
    }

    /// Writes `start`, the attribute-eligible fields, the children and the end tag.
    fn element_body(
        &mut self,
        mut start: BytesStart<'_>,
        element: &Element,
        shapes: &[ElementShape],
        attribute_names: &[&str],
    ) -> Result<()> {
        let mut as_attributes = Vec::new();
        for name in attribute_names {
            if let Some(value) = attribute_value(element, name) {
                start.push_attribute((*name, value));
                as_attributes.push(*name);
            }
        }

        let children: Vec<_> = utils::ordered_fields(element, shapes)
            .into_iter()
            .filter(|(name, _)| !as_attributes.contains(name))
            .collect();

        if children.is_empty() {
            self.writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        let end = start.to_end().into_owned();
        self.writer.write_event(Event::Start(start))?;
        for (name, field) in children {
            let shape = find_element(shapes, name);
            self.field(name, field, shape)?;
        }
        self.writer.write_event(Event::End(end))?;
        Ok(())
    }

    fn field(&mut self, name: &str, field: &Field, shape: Option<&ElementShape>) -> Result<()> {
        let children = shape.map(ElementShape::children).unwrap_or(&[]);
        for value in field.values() {
            match value {
                Value::Primitive(primitive) => self.primitive(name, primitive)?,
                Value::Complex(element) => {
                    self.element_body(BytesStart::new(name), element, children, &ELEMENT_ATTRIBUTES)?
                }
                Value::Resource(resource) => {
                    self.writer.write_event(Event::Start(BytesStart::new(name)))?;
                    self.resource(resource, true)?;
                    self.writer.write_event(Event::End(BytesEnd::new(name)))?;
                }
                Value::Xhtml(markup) => {
                    self.writer
                        .write_event(Event::Text(BytesText::from_escaped(markup.as_str())))?;
                }
            }
        }
        Ok(())
    }

    fn primitive(&mut self, name: &str, primitive: &Primitive) -> Result<()> {
        let mut start = BytesStart::new(name);
        if let Some(id) = &primitive.id {
            start.push_attribute(("id", id.as_str()));
        }
        if let Some(value) = &primitive.value {
            start.push_attribute(("value", value.to_lexical().as_str()));
        }
        if primitive.extension.is_empty() {
            self.writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        self.writer.write_event(Event::Start(start))?;
        for extension in &primitive.extension {
            self.element_body(
                BytesStart::new("extension"),
                extension,
                utils::extension_children(),
                &ELEMENT_ATTRIBUTES,
            )?;
        }
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    pub(crate) fn feed(&mut self, bundle: &Bundle) -> Result<()> {
        let mut start = BytesStart::new("feed");
        start.push_attribute(("xmlns", ATOM_NAMESPACE));
        self.writer.write_event(Event::Start(start))?;

        if let Some(title) = &bundle.title {
            self.text_element(BytesStart::new("title"), title)?;
        }
        if let Some(id) = &bundle.id {
            self.text_element(BytesStart::new("id"), id)?;
        }
        for (rel, href) in bundle.links.iter() {
            self.link(rel, href)?;
        }
        if let Some(updated) = &bundle.updated {
            self.text_element(BytesStart::new("updated"), &utils::format_timestamp(updated))?;
        }
        if let Some(total) = bundle.total_results {
            let mut start = BytesStart::new("os:totalResults");
            start.push_attribute(("xmlns:os", OPENSEARCH_NAMESPACE));
            self.text_element(start, &total.to_string())?;
        }
        for tag in &bundle.tags {
            self.category(tag)?;
        }
        for entry in &bundle.entries {
            self.entry(entry)?;
        }

        self.writer.write_event(Event::End(BytesEnd::new("feed")))?;
        Ok(())
    }

    fn entry(&mut self, entry: &ResourceEnvelope) -> Result<()> {
        let resource = match &entry.content {
            EnvelopeContent::Resource(resource) => resource,
            EnvelopeContent::Deleted { when } => {
                let mut start = BytesStart::new("at:deleted-entry");
                start.push_attribute(("xmlns:at", TOMBSTONE_NAMESPACE));
                start.push_attribute(("ref", entry.id.to_url().as_str()));
                start.push_attribute(("when", utils::format_timestamp(when).as_str()));
                if entry.self_link.is_none() && entry.tags.is_empty() {
                    self.writer.write_event(Event::Empty(start))?;
                    return Ok(());
                }
                let end = start.to_end().into_owned();
                self.writer.write_event(Event::Start(start))?;
                if let Some(self_link) = &entry.self_link {
                    self.link("self", &self_link.to_url())?;
                }
                for tag in &entry.tags {
                    self.category(tag)?;
                }
                self.writer.write_event(Event::End(end))?;
                return Ok(());
            }
        };

        self.writer.write_event(Event::Start(BytesStart::new("entry")))?;
        if let Some(title) = &entry.title {
            self.text_element(BytesStart::new("title"), title)?;
        }
        self.text_element(BytesStart::new("id"), &entry.id.to_url())?;
        if let Some(self_link) = &entry.self_link {
            self.link("self", &self_link.to_url())?;
        }
        if let Some(updated) = &entry.updated {
            self.text_element(BytesStart::new("updated"), &utils::format_timestamp(updated))?;
        }
        for tag in &entry.tags {
            self.category(tag)?;
        }
        let mut content = BytesStart::new("content");
        content.push_attribute(("type", "text/xml"));
        self.writer.write_event(Event::Start(content))?;
        self.resource(resource, false)?;
        self.writer.write_event(Event::End(BytesEnd::new("content")))?;
        self.writer.write_event(Event::End(BytesEnd::new("entry")))?;
        Ok(())
    }

    pub(crate) fn taglist(&mut self, tags: &[Tag]) -> Result<()> {
        let mut start = BytesStart::new("taglist");
        start.push_attribute(("xmlns", FHIR_NAMESPACE));
        if tags.is_empty() {
            self.writer.write_event(Event::Empty(start))?;
            return Ok(());
        }
        self.writer.write_event(Event::Start(start))?;
        for tag in tags {
            self.category(tag)?;
        }
        self.writer.write_event(Event::End(BytesEnd::new("taglist")))?;
        Ok(())
    }

    fn text_element(&mut self, start: BytesStart<'_>, text: &str) -> Result<()> {
        let end = start.to_end().into_owned();
        self.writer.write_event(Event::Start(start))?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.writer.write_event(Event::End(end))?;
        Ok(())
    }

    fn link(&mut self, rel: &str, href: &str) -> Result<()> {
        let mut start = BytesStart::new("link");
        start.push_attribute(("rel", rel));
        start.push_attribute(("href", href));
        self.writer.write_event(Event::Empty(start))?;
        Ok(())
    }

    fn category(&mut self, tag: &Tag) -> Result<()> {
        let mut start = BytesStart::new("category");
        start.push_attribute(("term", tag.term.as_str()));
        start.push_attribute(("scheme", tag.scheme.as_str()));
        if let Some(label) = &tag.label {
            start.push_attribute(("label", label.as_str()));
        }
        self.writer.write_event(Event::Empty(start))?;
        Ok(())
    }
}

/// The value of a field that can be written as an attribute: a single string
/// primitive without id or extensions.
fn attribute_value<'e>(element: &'e Element, name: &str) -> Option<&'e str> {
    match element.field(name)? {
        Field::Single(Value::Primitive(primitive)) if !primitive.has_metadata() => {
            match &primitive.value {
                Some(helios_client_model::PrimitiveValue::String(s)) => Some(s),
                _ => None,
            }
        }
        _ => None,
    }
}
