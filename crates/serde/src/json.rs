//! JSON codec.
//!
//! Resources map onto FHIR JSON: primitives are JSON scalars, their element id
//! and extensions travel in a `_name` companion, and repeating primitives have
//! a companion array aligned with `null` placeholders:
//!
//! ```json
//! { "given": ["Alice", null], "_given": [null, {"id": "g1"}] }
//! ```
//!
//! Feeds use the JSON bundle layout of the Atom era (`link`, `totalResults`,
//! `entry[].content` or `entry[].deleted`) and tag lists are
//! `{"resourceType": "TagList", "category": [...]}`.

use helios_client_model::{
    Bundle, Element, ElementKind, ElementShape, EnvelopeContent, Field, ModelFactoryList,
    Primitive, PrimitiveKind, PrimitiveValue, Resource, ResourceEnvelope, Tag, Value,
    shape::find_element, validation,
};
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{Result, SerdeError};
use crate::format::ResourceFormat;
use crate::utils;

const FORMAT: ResourceFormat = ResourceFormat::Json;

fn malformed(message: impl Into<String>) -> SerdeError {
    SerdeError::malformed(FORMAT, message)
}

/// Parses JSON text; syntax errors are reported as malformed payloads.
pub(crate) fn parse(payload: &[u8]) -> Result<JsonValue> {
    serde_json::from_slice(utils::strip_bom(payload))
        .map_err(|e| malformed(format!("invalid JSON: {}", e)))
}

fn as_object<'v>(value: &'v JsonValue, what: &str) -> Result<&'v Map<String, JsonValue>> {
    value
        .as_object()
        .ok_or_else(|| malformed(format!("{} must be a JSON object", what)))
}

fn opt_str<'v>(object: &'v Map<String, JsonValue>, key: &str) -> Result<Option<&'v str>> {
    match object.get(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => Ok(Some(s)),
        Some(_) => Err(malformed(format!("'{}' must be a string", key))),
    }
}

fn expect_resource_type(object: &Map<String, JsonValue>, expected: &str) -> Result<()> {
    match opt_str(object, "resourceType")? {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(malformed(format!(
            "expected resourceType '{}', found '{}'",
            expected, found
        ))),
        None => Err(malformed("missing resourceType")),
    }
}

/// Builds resource graphs, feeds and tag lists from parsed JSON.
pub(crate) struct JsonReader<'a> {
    factories: &'a ModelFactoryList,
}

impl<'a> JsonReader<'a> {
    pub(crate) fn new(factories: &'a ModelFactoryList) -> Self {
        Self { factories }
    }

    pub(crate) fn resource(&self, value: &JsonValue) -> Result<Resource> {
        let object = as_object(value, "resource")?;
        let type_name = opt_str(object, "resourceType")?
            .ok_or_else(|| malformed("missing resourceType"))?;
        if !validation::is_resource_name(type_name) {
            return Err(malformed(format!(
                "'{}' is not a resource type name",
                type_name
            )));
        }
        let shape = self.factories.shape_for(type_name)?;
        let body = self.element(object, &shape.elements, &["resourceType"])?;
        Ok(Resource::with_body(type_name, body))
    }

    fn element(
        &self,
        object: &Map<String, JsonValue>,
        shapes: &[ElementShape],
        skip: &[&str],
    ) -> Result<Element> {
        let mut element = Element::new();
        for (key, value) in object {
            if skip.contains(&key.as_str()) {
                continue;
            }
            if let Some(name) = key.strip_prefix('_') {
                // A companion without its value array stands for value-less primitives.
                if !object.contains_key(name) {
                    let field = self.orphan_companion(name, value, find_element(shapes, name))?;
                    element.set_field(name, field);
                }
                continue;
            }
            let shape = find_element(shapes, key);
            let companion = object.get(&format!("_{}", key));
            let field = self.field(key, value, companion, shape)?;
            element.set_field(key.as_str(), field);
        }
        Ok(element)
    }

    fn field(
        &self,
        name: &str,
        value: &JsonValue,
        companion: Option<&JsonValue>,
        shape: Option<&ElementShape>,
    ) -> Result<Field> {
        match value {
            JsonValue::Array(items) => {
                if shape.is_some_and(|s| !s.repeats) {
                    return Err(malformed(format!(
                        "element '{}' does not repeat but holds an array",
                        name
                    )));
                }
                let companions = match companion {
                    None | Some(JsonValue::Null) => None,
                    Some(JsonValue::Array(companions)) if companions.len() == items.len() => {
                        Some(companions)
                    }
                    Some(_) => {
                        return Err(malformed(format!(
                            "companion '_{}' must be an array aligned with '{}'",
                            name, name
                        )));
                    }
                };
                let values = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        let companion = companions.and_then(|c| c.get(i));
                        self.value(name, item, companion, shape)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Field::Repeated(values))
            }
            _ => {
                if shape.is_some_and(|s| s.repeats) {
                    return Err(malformed(format!(
                        "element '{}' repeats and must be an array",
                        name
                    )));
                }
                Ok(Field::Single(self.value(name, value, companion, shape)?))
            }
        }
    }

    fn orphan_companion(
        &self,
        name: &str,
        companion: &JsonValue,
        shape: Option<&ElementShape>,
    ) -> Result<Field> {
        match companion {
            JsonValue::Array(items) => {
                if shape.is_some_and(|s| !s.repeats) {
                    return Err(malformed(format!(
                        "element '{}' does not repeat but holds an array",
                        name
                    )));
                }
                let values = items
                    .iter()
                    .map(|item| {
                        let mut primitive = Primitive::default();
                        self.companion(name, item, &mut primitive)?;
                        Ok(Value::Primitive(primitive))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Field::Repeated(values))
            }
            _ => {
                let mut primitive = Primitive::default();
                self.companion(name, companion, &mut primitive)?;
                Ok(Field::Single(Value::Primitive(primitive)))
            }
        }
    }

    fn value(
        &self,
        name: &str,
        value: &JsonValue,
        companion: Option<&JsonValue>,
        shape: Option<&ElementShape>,
    ) -> Result<Value> {
        match shape.map(|s| &s.kind) {
            Some(ElementKind::Primitive(kind)) => {
                Ok(Value::Primitive(self.primitive(name, value, companion, Some(*kind))?))
            }
            Some(ElementKind::Complex { elements }) => {
                let object = as_object(value, &format!("element '{}'", name))?;
                Ok(Value::Complex(self.element(object, elements, &[])?))
            }
            Some(ElementKind::Resource) => Ok(Value::Resource(Box::new(self.resource(value)?))),
            Some(ElementKind::Xhtml) => match value {
                JsonValue::String(markup) => Ok(Value::Xhtml(markup.clone())),
                _ => Err(malformed(format!("element '{}' must hold XHTML text", name))),
            },
            None => match value {
                JsonValue::Object(object) => Ok(Value::Complex(self.element(object, &[], &[])?)),
                JsonValue::Array(_) => Err(malformed(format!(
                    "element '{}' holds nested arrays",
                    name
                ))),
                _ => Ok(Value::Primitive(self.primitive(name, value, companion, None)?)),
            },
        }
    }

    fn primitive(
        &self,
        name: &str,
        value: &JsonValue,
        companion: Option<&JsonValue>,
        kind: Option<PrimitiveKind>,
    ) -> Result<Primitive> {
        let mut primitive = Primitive {
            value: scalar_value(name, value, kind)?,
            ..Primitive::default()
        };
        if let Some(companion) = companion {
            self.companion(name, companion, &mut primitive)?;
        }
        Ok(primitive)
    }

    fn companion(&self, name: &str, companion: &JsonValue, primitive: &mut Primitive) -> Result<()> {
        let object = match companion {
            JsonValue::Null => return Ok(()),
            JsonValue::Object(object) => object,
            _ => return Err(malformed(format!("companion '_{}' must be an object", name))),
        };
        for (key, value) in object {
            match (key.as_str(), value) {
                ("id", JsonValue::String(id)) => primitive.id = Some(id.clone()),
                ("extension", JsonValue::Array(extensions)) => {
                    for extension in extensions {
                        let object = as_object(extension, "extension")?;
                        primitive
                            .extension
                            .push(self.element(object, utils::extension_children(), &[])?);
                    }
                }
                (other, _) => {
                    return Err(malformed(format!(
                        "unexpected '{}' in companion '_{}'",
                        other, name
                    )));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn bundle(&self, value: &JsonValue) -> Result<Bundle> {
        let object = as_object(value, "bundle")?;
        expect_resource_type(object, "Bundle")?;

        let mut bundle = Bundle::new();
        bundle.title = opt_str(object, "title")?.map(str::to_string);
        bundle.id = opt_str(object, "id")?.map(str::to_string);
        bundle.updated = opt_str(object, "updated")?
            .map(|s| utils::parse_timestamp(FORMAT, s))
            .transpose()?;
        bundle.total_results = match object.get("totalResults") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::Number(n)) => Some(
                n.as_u64()
                    .ok_or_else(|| malformed("totalResults must be a non-negative integer"))?,
            ),
            Some(JsonValue::String(s)) => Some(
                s.trim()
                    .parse()
                    .map_err(|_| malformed("totalResults must be a non-negative integer"))?,
            ),
            Some(_) => return Err(malformed("totalResults must be a number")),
        };
        for (rel, href) in links(object)? {
            utils::check_nav_link(FORMAT, rel, href)?;
            bundle.links.set(rel, href);
        }
        bundle.tags = categories(object.get("category"))?;

        if let Some(entries) = object.get("entry") {
            let entries = entries
                .as_array()
                .ok_or_else(|| malformed("'entry' must be an array"))?;
            for entry in entries {
                bundle.entries.push(self.entry(entry)?);
            }
        }
        Ok(bundle)
    }

    fn entry(&self, value: &JsonValue) -> Result<ResourceEnvelope> {
        let object = as_object(value, "entry")?;
        let id = opt_str(object, "id")?.ok_or_else(|| malformed("entry without an id"))?;
        let id = utils::parse_identity(FORMAT, id)?;
        let self_link = links(object)?
            .into_iter()
            .find(|(rel, _)| *rel == "self")
            .map(|(_, href)| utils::parse_identity(FORMAT, href))
            .transpose()?;
        let (id, self_link) = utils::entry_identities(id, self_link);

        let content = match (object.get("deleted"), object.get("content")) {
            (Some(JsonValue::String(when)), _) => EnvelopeContent::Deleted {
                when: utils::parse_timestamp(FORMAT, when)?,
            },
            (Some(_), _) => return Err(malformed("'deleted' must be a timestamp")),
            (None, Some(content)) => EnvelopeContent::Resource(self.resource(content)?),
            (None, None) => {
                return Err(malformed(format!(
                    "entry '{}' has neither content nor a deletion",
                    id
                )));
            }
        };

        Ok(ResourceEnvelope {
            id,
            self_link,
            title: opt_str(object, "title")?.map(str::to_string),
            updated: opt_str(object, "updated")?
                .map(|s| utils::parse_timestamp(FORMAT, s))
                .transpose()?,
            tags: categories(object.get("category"))?,
            content,
        })
    }

    pub(crate) fn tags(&self, value: &JsonValue) -> Result<Vec<Tag>> {
        let object = as_object(value, "tag list")?;
        expect_resource_type(object, "TagList")?;
        categories(object.get("category"))
    }
}

fn scalar_value(
    name: &str,
    value: &JsonValue,
    kind: Option<PrimitiveKind>,
) -> Result<Option<PrimitiveValue>> {
    let lexical = match value {
        JsonValue::Null => return Ok(None),
        JsonValue::Bool(b) => match kind {
            None | Some(PrimitiveKind::Boolean) => return Ok(Some(PrimitiveValue::Boolean(*b))),
            Some(_) => b.to_string(),
        },
        JsonValue::Number(n) => {
            let lexical = n.to_string();
            match kind {
                None if looks_integral(&lexical) => {
                    return match lexical.parse::<i64>() {
                        Ok(i) => Ok(Some(PrimitiveValue::Integer(i))),
                        Err(_) => utils::parse_decimal(&lexical)
                            .map(|d| Some(PrimitiveValue::Decimal(d)))
                            .ok_or_else(|| {
                                malformed(format!("number '{}' in '{}' is out of range", lexical, name))
                            }),
                    };
                }
                None => {
                    return utils::parse_decimal(&lexical)
                        .map(|d| Some(PrimitiveValue::Decimal(d)))
                        .ok_or_else(|| {
                            malformed(format!("number '{}' in '{}' is out of range", lexical, name))
                        });
                }
                Some(_) => lexical,
            }
        }
        JsonValue::String(s) => match kind {
            None => return Ok(Some(PrimitiveValue::String(s.clone()))),
            Some(_) => s.clone(),
        },
        JsonValue::Array(_) | JsonValue::Object(_) => {
            return Err(malformed(format!("element '{}' must hold a primitive", name)));
        }
    };
    let kind = kind.unwrap_or(PrimitiveKind::String);
    utils::parse_lexical(kind, &lexical)
        .map(Some)
        .map_err(|e| malformed(format!("element '{}': {}", name, e)))
}

fn looks_integral(lexical: &str) -> bool {
    !lexical.contains(['.', 'e', 'E'])
}

fn links(object: &Map<String, JsonValue>) -> Result<Vec<(&str, &str)>> {
    let Some(links) = object.get("link") else {
        return Ok(Vec::new());
    };
    let links = links
        .as_array()
        .ok_or_else(|| malformed("'link' must be an array"))?;
    links
        .iter()
        .map(|link| {
            let link = as_object(link, "link")?;
            let rel = opt_str(link, "rel")?.ok_or_else(|| malformed("link without rel"))?;
            let href = opt_str(link, "href")?.ok_or_else(|| malformed("link without href"))?;
            Ok((rel, href))
        })
        .collect()
}

fn categories(value: Option<&JsonValue>) -> Result<Vec<Tag>> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| malformed("'category' must be an array"))?;
    items
        .iter()
        .map(|item| {
            let category = as_object(item, "category")?;
            let term = opt_str(category, "term")?
                .ok_or_else(|| malformed("category without a term"))?;
            Ok(Tag {
                term: term.to_string(),
                scheme: opt_str(category, "scheme")?
                    .unwrap_or(helios_client_model::FHIR_TAG_SCHEME_GENERAL)
                    .to_string(),
                label: opt_str(category, "label")?.map(str::to_string),
            })
        })
        .collect()
}

/// Renders resource graphs, feeds and tag lists as JSON values.
pub(crate) struct JsonWriter<'a> {
    factories: &'a ModelFactoryList,
}

impl<'a> JsonWriter<'a> {
    pub(crate) fn new(factories: &'a ModelFactoryList) -> Self {
        Self { factories }
    }

    pub(crate) fn resource(&self, resource: &Resource) -> Result<JsonValue> {
        let shape = self.factories.shape_for(resource.resource_type())?;
        let mut object = Map::new();
        object.insert(
            "resourceType".to_string(),
            JsonValue::String(resource.resource_type().to_string()),
        );
        self.fields(&mut object, resource.body(), &shape.elements)?;
        Ok(JsonValue::Object(object))
    }

    fn element(&self, element: &Element, shapes: &[ElementShape]) -> Result<JsonValue> {
        let mut object = Map::new();
        self.fields(&mut object, element, shapes)?;
        Ok(JsonValue::Object(object))
    }

    fn fields(
        &self,
        object: &mut Map<String, JsonValue>,
        element: &Element,
        shapes: &[ElementShape],
    ) -> Result<()> {
        for (name, field) in utils::ordered_fields(element, shapes) {
            let children = find_element(shapes, name)
                .map(ElementShape::children)
                .unwrap_or(&[]);
            self.field(object, name, field, children)?;
        }
        Ok(())
    }

    fn field(
        &self,
        object: &mut Map<String, JsonValue>,
        name: &str,
        field: &Field,
        children: &[ElementShape],
    ) -> Result<()> {
        match field {
            Field::Single(Value::Primitive(primitive)) => {
                if let Some(value) = &primitive.value {
                    object.insert(name.to_string(), scalar(value)?);
                }
                if primitive.has_metadata() {
                    object.insert(format!("_{}", name), self.companion(primitive)?);
                }
            }
            Field::Single(value) => {
                object.insert(name.to_string(), self.value(value, children)?);
            }
            Field::Repeated(values) => {
                let primitives: Option<Vec<&Primitive>> =
                    values.iter().map(Value::as_primitive).collect();
                match primitives {
                    Some(primitives) if !primitives.is_empty() => {
                        if primitives.iter().any(|p| p.value.is_some()) {
                            let items = primitives
                                .iter()
                                .map(|p| p.value.as_ref().map_or(Ok(JsonValue::Null), scalar))
                                .collect::<Result<Vec<_>>>()?;
                            object.insert(name.to_string(), JsonValue::Array(items));
                        }
                        if primitives.iter().any(|p| p.has_metadata()) {
                            let companions = primitives
                                .iter()
                                .map(|p| {
                                    if p.has_metadata() {
                                        self.companion(p)
                                    } else {
                                        Ok(JsonValue::Null)
                                    }
                                })
                                .collect::<Result<Vec<_>>>()?;
                            object.insert(format!("_{}", name), JsonValue::Array(companions));
                        }
                    }
                    _ => {
                        let items = values
                            .iter()
                            .map(|v| self.value(v, children))
                            .collect::<Result<Vec<_>>>()?;
                        object.insert(name.to_string(), JsonValue::Array(items));
                    }
                }
            }
        }
        Ok(())
    }

    fn value(&self, value: &Value, children: &[ElementShape]) -> Result<JsonValue> {
        match value {
            Value::Primitive(primitive) => primitive
                .value
                .as_ref()
                .map_or(Ok(JsonValue::Null), scalar),
            Value::Complex(element) => self.element(element, children),
            Value::Resource(resource) => self.resource(resource),
            Value::Xhtml(markup) => Ok(JsonValue::String(markup.clone())),
        }
    }

    fn companion(&self, primitive: &Primitive) -> Result<JsonValue> {
        let mut object = Map::new();
        if let Some(id) = &primitive.id {
            object.insert("id".to_string(), JsonValue::String(id.clone()));
        }
        if !primitive.extension.is_empty() {
            let extensions = primitive
                .extension
                .iter()
                .map(|e| self.element(e, utils::extension_children()))
                .collect::<Result<Vec<_>>>()?;
            object.insert("extension".to_string(), JsonValue::Array(extensions));
        }
        Ok(JsonValue::Object(object))
    }

    pub(crate) fn bundle(&self, bundle: &Bundle) -> Result<JsonValue> {
        let mut object = Map::new();
        object.insert("resourceType".to_string(), "Bundle".into());
        if let Some(title) = &bundle.title {
            object.insert("title".to_string(), title.as_str().into());
        }
        if let Some(id) = &bundle.id {
            object.insert("id".to_string(), id.as_str().into());
        }
        let links: Vec<_> = bundle.links.iter().map(|(rel, href)| link(rel, href)).collect();
        if !links.is_empty() {
            object.insert("link".to_string(), JsonValue::Array(links));
        }
        if let Some(updated) = &bundle.updated {
            object.insert("updated".to_string(), utils::format_timestamp(updated).into());
        }
        if let Some(total) = bundle.total_results {
            object.insert("totalResults".to_string(), total.into());
        }
        if !bundle.tags.is_empty() {
            object.insert("category".to_string(), write_categories(&bundle.tags));
        }
        let entries = bundle
            .entries
            .iter()
            .map(|e| self.entry(e))
            .collect::<Result<Vec<_>>>()?;
        object.insert("entry".to_string(), JsonValue::Array(entries));
        Ok(JsonValue::Object(object))
    }

    fn entry(&self, entry: &ResourceEnvelope) -> Result<JsonValue> {
        let mut object = Map::new();
        if let Some(title) = &entry.title {
            object.insert("title".to_string(), title.as_str().into());
        }
        object.insert("id".to_string(), entry.id.to_url().into());
        if let Some(self_link) = &entry.self_link {
            object.insert(
                "link".to_string(),
                JsonValue::Array(vec![link("self", &self_link.to_url())]),
            );
        }
        if let Some(updated) = &entry.updated {
            object.insert("updated".to_string(), utils::format_timestamp(updated).into());
        }
        if !entry.tags.is_empty() {
            object.insert("category".to_string(), write_categories(&entry.tags));
        }
        match &entry.content {
            EnvelopeContent::Resource(resource) => {
                object.insert("content".to_string(), self.resource(resource)?);
            }
            EnvelopeContent::Deleted { when } => {
                object.insert("deleted".to_string(), utils::format_timestamp(when).into());
            }
        }
        Ok(JsonValue::Object(object))
    }

    pub(crate) fn tags(&self, tags: &[Tag]) -> JsonValue {
        let mut object = Map::new();
        object.insert("resourceType".to_string(), "TagList".into());
        object.insert("category".to_string(), write_categories(tags));
        JsonValue::Object(object)
    }
}

fn scalar(value: &PrimitiveValue) -> Result<JsonValue> {
    Ok(match value {
        PrimitiveValue::Boolean(b) => JsonValue::Bool(*b),
        PrimitiveValue::Integer(i) => JsonValue::Number((*i).into()),
        PrimitiveValue::Decimal(d) => JsonValue::Number(d.to_string().parse::<Number>()?),
        PrimitiveValue::String(s) => JsonValue::String(s.clone()),
    })
}

fn link(rel: &str, href: &str) -> JsonValue {
    let mut object = Map::new();
    object.insert("rel".to_string(), rel.into());
    object.insert("href".to_string(), href.into());
    JsonValue::Object(object)
}

fn write_categories(tags: &[Tag]) -> JsonValue {
    JsonValue::Array(
        tags.iter()
            .map(|tag| {
                let mut object = Map::new();
                object.insert("term".to_string(), tag.term.as_str().into());
                object.insert("scheme".to_string(), tag.scheme.as_str().into());
                if let Some(label) = &tag.label {
                    object.insert("label".to_string(), label.as_str().into());
                }
                JsonValue::Object(object)
            })
            .collect(),
    )
}
