//! In-memory resource graph.
//!
//! Resources are held as a generic tree rather than one Rust struct per
//! resource type, so the same graph can be produced from either wire format and
//! compared structurally. The types below map onto FHIR's element model:
//!
//! | FHIR | Graph |
//! |------|-------|
//! | resource | [`Resource`] (type name + body) |
//! | complex element (`HumanName`, `Address`, backbone elements) | [`Element`] |
//! | primitive (`boolean`, `decimal`, `string`, ...) | [`Primitive`] |
//! | element with max cardinality `*` | [`Field::Repeated`] |
//! | narrative `div` | [`Value::Xhtml`] |
//! | contained resource | [`Value::Resource`] |
//!
//! Fields are kept in a name-ordered map, so two graphs that hold the same
//! content compare equal regardless of the order the wire format listed them in.

use std::collections::BTreeMap;
use std::collections::btree_map;

use rust_decimal::Decimal;

/// A materialized resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    resource_type: String,
    body: Element,
}

impl Resource {
    /// Creates an empty resource of the given type.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            body: Element::new(),
        }
    }

    /// Creates a resource from an already built body.
    pub fn with_body(resource_type: impl Into<String>, body: Element) -> Self {
        Self {
            resource_type: resource_type.into(),
            body,
        }
    }

    /// The resource type name.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The element holding all fields of the resource.
    pub fn body(&self) -> &Element {
        &self.body
    }

    /// Mutable access to the body.
    pub fn body_mut(&mut self) -> &mut Element {
        &mut self.body
    }

    /// Consumes the resource, returning its body.
    pub fn into_body(self) -> Element {
        self.body
    }

    /// The logical id carried inside the resource, if any.
    pub fn id(&self) -> Option<&str> {
        self.body.get("id").and_then(Value::as_str)
    }

    /// Looks up a field of the resource body.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }

    /// Follows a dotted path (`address.city`), taking the first value of
    /// repeating fields along the way.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        self.body.get_path(path)
    }
}

/// A complex element: named fields, each single or repeating.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    fields: BTreeMap<String, Field>,
}

impl Element {
    /// Creates an element without fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when no field is set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Sets a single-valued field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(name.into(), Field::Single(value.into()));
        self
    }

    /// Sets a field with an explicit cardinality.
    pub fn set_field(&mut self, name: impl Into<String>, field: Field) -> &mut Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Appends to a repeating field, creating it when absent.
    ///
    /// A single-valued field of the same name is turned into a repeating one.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        match self.fields.entry(name.into()) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(Field::Repeated(vec![value]));
            }
            btree_map::Entry::Occupied(mut entry) => {
                let field = entry.get_mut();
                let mut values = match std::mem::replace(field, Field::Repeated(Vec::new())) {
                    Field::Single(first) => vec![first],
                    Field::Repeated(values) => values,
                };
                values.push(value);
                *field = Field::Repeated(values);
            }
        }
        self
    }

    /// Builder form of [`Element::set`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Builder form of [`Element::set_field`] with a repeating field.
    pub fn with_list(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.set_field(name, Field::Repeated(values));
        self
    }

    /// Removes a field, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    /// Returns the field with the given name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Returns mutable access to the field with the given name.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.get_mut(name)
    }

    /// Returns the value of a single field, or the first value of a repeating one.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).and_then(Field::first)
    }

    /// Returns every value of a field; empty when absent.
    pub fn get_all(&self, name: &str) -> &[Value] {
        match self.fields.get(name) {
            Some(field) => field.values(),
            None => &[],
        }
    }

    /// Follows a dotted path, taking the first value of repeating fields.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Complex(element) => element.get(part)?,
                Value::Resource(resource) => resource.get(part)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Iterates over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// A field together with its cardinality.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// Element with max cardinality 1.
    Single(Value),
    /// Element with max cardinality `*`; may hold one value.
    Repeated(Vec<Value>),
}

impl Field {
    /// The values held, in order.
    pub fn values(&self) -> &[Value] {
        match self {
            Field::Single(value) => std::slice::from_ref(value),
            Field::Repeated(values) => values,
        }
    }

    /// Mutable access to the values held.
    pub fn values_mut(&mut self) -> &mut [Value] {
        match self {
            Field::Single(value) => std::slice::from_mut(value),
            Field::Repeated(values) => values,
        }
    }

    /// First value, if any.
    pub fn first(&self) -> Option<&Value> {
        self.values().first()
    }

    /// Returns true for [`Field::Repeated`].
    pub fn is_repeated(&self) -> bool {
        matches!(self, Field::Repeated(_))
    }
}

/// A value inside the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Primitive value with optional id and extensions.
    Primitive(Primitive),
    /// Nested complex element.
    Complex(Element),
    /// Contained resource.
    Resource(Box<Resource>),
    /// Narrative XHTML, kept verbatim including the enclosing `div`.
    Xhtml(String),
}

impl Value {
    /// Returns the string content of a string primitive.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Primitive(Primitive {
                value: Some(PrimitiveValue::String(s)),
                ..
            }) => Some(s),
            Value::Xhtml(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean content of a boolean primitive.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Primitive(Primitive {
                value: Some(PrimitiveValue::Boolean(b)),
                ..
            }) => Some(*b),
            _ => None,
        }
    }

    /// Returns the primitive, if this is one.
    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Value::Primitive(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the complex element, if this is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Value::Complex(e) => Some(e),
            _ => None,
        }
    }

    /// Mutable access to the complex element, if this is one.
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Value::Complex(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the contained resource, if this is one.
    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Value::Resource(r) => Some(r),
            _ => None,
        }
    }
}

/// A primitive element.
///
/// FHIR primitives may carry an element id and extensions even without a
/// value, so all three parts are optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Primitive {
    /// The primitive value.
    pub value: Option<PrimitiveValue>,
    /// Element id.
    pub id: Option<String>,
    /// Extensions on the primitive.
    pub extension: Vec<Element>,
}

impl Primitive {
    /// Creates a primitive with only a value.
    pub fn new(value: PrimitiveValue) -> Self {
        Self {
            value: Some(value),
            id: None,
            extension: Vec::new(),
        }
    }

    /// Returns true when the primitive carries an id or extensions.
    pub fn has_metadata(&self) -> bool {
        self.id.is_some() || !self.extension.is_empty()
    }
}

/// The value of a primitive element.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    /// `boolean`
    Boolean(bool),
    /// `integer`, `positiveInt`, `unsignedInt`
    Integer(i64),
    /// `decimal`
    Decimal(Decimal),
    /// Every string-like primitive (`string`, `code`, `uri`, `dateTime`, ...).
    String(String),
}

impl PrimitiveValue {
    /// Renders the value the way it appears in an XML `value` attribute.
    pub fn to_lexical(&self) -> String {
        match self {
            PrimitiveValue::Boolean(b) => b.to_string(),
            PrimitiveValue::Integer(i) => i.to_string(),
            PrimitiveValue::Decimal(d) => d.to_string(),
            PrimitiveValue::String(s) => s.clone(),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Primitive(Primitive::new(PrimitiveValue::String(value.to_string())))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Primitive(Primitive::new(PrimitiveValue::String(value)))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Primitive(Primitive::new(PrimitiveValue::Boolean(value)))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Primitive(Primitive::new(PrimitiveValue::Integer(value)))
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Value::Primitive(Primitive::new(PrimitiveValue::Decimal(value)))
    }
}

impl From<Primitive> for Value {
    fn from(value: Primitive) -> Self {
        Value::Primitive(value)
    }
}

impl From<Element> for Value {
    fn from(value: Element) -> Self {
        Value::Complex(value)
    }
}

impl From<Resource> for Value {
    fn from(value: Resource) -> Self {
        Value::Resource(Box::new(value))
    }
}
