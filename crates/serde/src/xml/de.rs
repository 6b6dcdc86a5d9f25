//! Mapping from the XML element tree to resources, feeds and tag lists.

use helios_client_model::{
    Bundle, Element, ElementKind, ElementShape, EnvelopeContent, Field, ModelFactoryList,
    Primitive, PrimitiveKind, Resource, ResourceEnvelope, Tag, Value, shape::find_element,
    validation,
};

use super::dom::XmlNode;
use crate::error::{Result, SerdeError};
use crate::format::ResourceFormat;
use crate::utils;

const FORMAT: ResourceFormat = ResourceFormat::Xml;

fn malformed(message: impl Into<String>) -> SerdeError {
    SerdeError::malformed(FORMAT, message)
}

pub(crate) struct XmlReader<'a> {
    factories: &'a ModelFactoryList,
}

impl<'a> XmlReader<'a> {
    pub(crate) fn new(factories: &'a ModelFactoryList) -> Self {
        Self { factories }
    }

    pub(crate) fn resource(&self, node: &XmlNode) -> Result<Resource> {
        if !validation::is_resource_name(&node.name) {
            return Err(malformed(format!(
                "<{}> is not a resource element",
                node.name
            )));
        }
        let shape = self.factories.shape_for(&node.name)?;
        // Contained resources carry their id as an attribute.
        let mut body = Element::new();
        for (name, value) in &node.attributes {
            body.set(name.as_str(), value.as_str());
        }
        self.children(&mut body, node, &shape.elements)?;
        Ok(Resource::with_body(node.name.as_str(), body))
    }

    fn children(&self, element: &mut Element, node: &XmlNode, shapes: &[ElementShape]) -> Result<()> {
        let mut groups: Vec<(&str, Vec<&XmlNode>)> = Vec::new();
        for child in &node.children {
            match groups.iter_mut().find(|(name, _)| *name == child.name) {
                Some((_, siblings)) => siblings.push(child),
                None => groups.push((child.name.as_str(), vec![child])),
            }
        }

        for (name, nodes) in groups {
            let shape = find_element(shapes, name);
            let repeats = match shape {
                Some(shape) if !shape.repeats && nodes.len() > 1 => {
                    return Err(malformed(format!(
                        "element '{}' does not repeat but occurs {} times",
                        name,
                        nodes.len()
                    )));
                }
                Some(shape) => shape.repeats,
                None => nodes.len() > 1,
            };
            let mut values = nodes
                .into_iter()
                .map(|n| self.value(n, shape))
                .collect::<Result<Vec<_>>>()?;
            let field = if repeats {
                Field::Repeated(values)
            } else {
                match values.pop() {
                    Some(value) => Field::Single(value),
                    None => continue,
                }
            };
            element.set_field(name, field);
        }
        Ok(())
    }

    fn value(&self, node: &XmlNode, shape: Option<&ElementShape>) -> Result<Value> {
        match shape.map(|s| &s.kind) {
            Some(ElementKind::Primitive(kind)) => {
                Ok(Value::Primitive(self.primitive(node, *kind)?))
            }
            Some(ElementKind::Complex { elements }) => {
                Ok(Value::Complex(self.complex(node, elements)?))
            }
            Some(ElementKind::Resource) => {
                let mut resources = node.children.iter();
                match (resources.next(), resources.next()) {
                    (Some(inner), None) => Ok(Value::Resource(Box::new(self.resource(inner)?))),
                    _ => Err(malformed(format!(
                        "<{}> must wrap exactly one resource",
                        node.name
                    ))),
                }
            }
            Some(ElementKind::Xhtml) => node
                .markup
                .clone()
                .map(Value::Xhtml)
                .ok_or_else(|| malformed(format!("<{}> is not XHTML narrative", node.name))),
            None if node.attribute("value").is_some() => {
                Ok(Value::Primitive(self.primitive(node, PrimitiveKind::String)?))
            }
            None => Ok(Value::Complex(self.complex(node, &[])?)),
        }
    }

    fn primitive(&self, node: &XmlNode, kind: PrimitiveKind) -> Result<Primitive> {
        let value = node
            .attribute("value")
            .map(|lexical| {
                utils::parse_lexical(kind, lexical)
                    .map_err(|e| malformed(format!("element '{}': {}", node.name, e)))
            })
            .transpose()?;
        let mut extension = Vec::new();
        for child in &node.children {
            if child.name != "extension" {
                return Err(malformed(format!(
                    "primitive '{}' cannot contain <{}>",
                    node.name, child.name
                )));
            }
            extension.push(self.complex(child, utils::extension_children())?);
        }
        Ok(Primitive {
            value,
            id: node.attribute("id").map(str::to_string),
            extension,
        })
    }

    fn complex(&self, node: &XmlNode, shapes: &[ElementShape]) -> Result<Element> {
        let mut element = Element::new();
        for (name, value) in &node.attributes {
            element.set(name.as_str(), value.as_str());
        }
        self.children(&mut element, node, shapes)?;
        Ok(element)
    }

    pub(crate) fn bundle(&self, root: &XmlNode) -> Result<Bundle> {
        if root.name != "feed" {
            return Err(malformed(format!("expected <feed>, found <{}>", root.name)));
        }
        let mut bundle = Bundle::new();
        for child in &root.children {
            match child.name.as_str() {
                "title" => bundle.title = Some(child.trimmed_text().to_string()),
                "id" => bundle.id = Some(child.trimmed_text().to_string()),
                "updated" => {
                    bundle.updated = Some(utils::parse_timestamp(FORMAT, child.trimmed_text())?)
                }
                "totalResults" => {
                    let total = child.trimmed_text();
                    bundle.total_results = Some(total.parse().map_err(|_| {
                        malformed(format!("totalResults '{}' is not a count", total))
                    })?);
                }
                "link" => {
                    let (rel, href) = link(child)?;
                    utils::check_nav_link(FORMAT, rel, href)?;
                    bundle.links.set(rel, href);
                }
                "category" => bundle.tags.push(category(child)?),
                "entry" => bundle.entries.push(self.entry(child)?),
                "deleted-entry" => bundle.entries.push(deleted_entry(child)?),
                _ => {}
            }
        }
        Ok(bundle)
    }

    fn entry(&self, node: &XmlNode) -> Result<ResourceEnvelope> {
        let id = node
            .child("id")
            .ok_or_else(|| malformed("entry without an id"))?;
        let id = utils::parse_identity(FORMAT, id.trimmed_text())?;
        let (id, self_link) = utils::entry_identities(id, self_link(node)?);

        let content = node
            .child("content")
            .ok_or_else(|| malformed(format!("entry '{}' has no content", id)))?;
        let resource = content
            .children
            .first()
            .ok_or_else(|| malformed(format!("entry '{}' has empty content", id)))?;

        Ok(ResourceEnvelope {
            self_link,
            title: node.child("title").map(|t| t.trimmed_text().to_string()),
            updated: node
                .child("updated")
                .map(|u| utils::parse_timestamp(FORMAT, u.trimmed_text()))
                .transpose()?,
            tags: categories(node)?,
            content: EnvelopeContent::Resource(self.resource(resource)?),
            id,
        })
    }

    pub(crate) fn tags(&self, root: &XmlNode) -> Result<Vec<Tag>> {
        if root.name != "taglist" {
            return Err(malformed(format!(
                "expected <taglist>, found <{}>",
                root.name
            )));
        }
        categories(root)
    }
}

fn deleted_entry(node: &XmlNode) -> Result<ResourceEnvelope> {
    let reference = node
        .attribute("ref")
        .ok_or_else(|| malformed("deleted entry without a ref"))?;
    let when = node
        .attribute("when")
        .ok_or_else(|| malformed("deleted entry without a when"))?;
    let id = utils::parse_identity(FORMAT, reference)?;
    let (id, self_link) = utils::entry_identities(id, self_link(node)?);
    Ok(ResourceEnvelope {
        id,
        self_link,
        title: None,
        updated: None,
        tags: categories(node)?,
        content: EnvelopeContent::Deleted {
            when: utils::parse_timestamp(FORMAT, when)?,
        },
    })
}

fn link(node: &XmlNode) -> Result<(&str, &str)> {
    let rel = node
        .attribute("rel")
        .ok_or_else(|| malformed("link without rel"))?;
    let href = node
        .attribute("href")
        .ok_or_else(|| malformed("link without href"))?;
    Ok((rel, href))
}

fn self_link(node: &XmlNode) -> Result<Option<helios_client_model::ResourceIdentity>> {
    for child in node.children.iter().filter(|c| c.name == "link") {
        let (rel, href) = link(child)?;
        if rel == "self" {
            return utils::parse_identity(FORMAT, href).map(Some);
        }
    }
    Ok(None)
}

fn category(node: &XmlNode) -> Result<Tag> {
    let term = node
        .attribute("term")
        .ok_or_else(|| malformed("category without a term"))?;
    Ok(Tag {
        term: term.to_string(),
        scheme: node
            .attribute("scheme")
            .unwrap_or(helios_client_model::FHIR_TAG_SCHEME_GENERAL)
            .to_string(),
        label: node.attribute("label").map(str::to_string),
    })
}

fn categories(node: &XmlNode) -> Result<Vec<Tag>> {
    node.children
        .iter()
        .filter(|c| c.name == "category")
        .map(category)
        .collect()
}
