//! Type shapes: the structural description of a resource type.
//!
//! The codec needs to know three things the wire formats do not always tell
//! it: whether an element repeats (XML has no arrays), which primitive type an
//! element holds (XML carries every value as text) and the element order XML
//! requires. A [`TypeShape`] supplies those facts for one resource type.
//! Elements a shape does not declare are inferred from the payload.
//!
//! Shapes are plain serde types so a domain model can ship them as JSON:
//!
//! ```json
//! {
//!   "typeName": "Organization",
//!   "elements": [
//!     { "name": "identifier", "repeats": true, "kind": { "complex": { "elements": [
//!         { "name": "system", "kind": { "primitive": "string" } },
//!         { "name": "value", "kind": { "primitive": "string" } }
//!     ] } } },
//!     { "name": "name", "kind": { "primitive": "string" } },
//!     { "name": "active", "kind": { "primitive": "boolean" } }
//!   ]
//! }
//! ```

use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

/// Structural description of one resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeShape {
    /// The resource type name.
    pub type_name: String,
    /// Declared elements, in XML order.
    #[serde(default)]
    pub elements: Vec<ElementShape>,
}

/// Structural description of one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementShape {
    /// Element name as it appears on the wire.
    pub name: String,
    /// True when max cardinality is `*`.
    #[serde(default)]
    pub repeats: bool,
    /// What the element holds.
    pub kind: ElementKind,
}

/// What an element holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElementKind {
    /// A primitive of the given kind.
    Primitive(PrimitiveKind),
    /// A complex element with its own declared children.
    Complex {
        /// Declared children, in XML order.
        #[serde(default)]
        elements: Vec<ElementShape>,
    },
    /// A nested resource (`contained`).
    Resource,
    /// An XHTML narrative `div`.
    Xhtml,
}

/// The primitive kinds the codec distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrimitiveKind {
    /// `boolean`
    Boolean,
    /// `integer` and its restrictions.
    Integer,
    /// `decimal`
    Decimal,
    /// Every string-like primitive.
    String,
}

static EXTENSION_SHAPE: LazyLock<ElementShape> = LazyLock::new(|| ElementShape {
    name: "extension".to_string(),
    repeats: true,
    kind: ElementKind::Complex {
        elements: vec![ElementShape::primitive("url", PrimitiveKind::String)],
    },
});

static MODIFIER_EXTENSION_SHAPE: LazyLock<ElementShape> = LazyLock::new(|| ElementShape {
    name: "modifierExtension".to_string(),
    ..EXTENSION_SHAPE.clone()
});

static CONTAINED_SHAPE: LazyLock<ElementShape> = LazyLock::new(|| ElementShape {
    name: "contained".to_string(),
    repeats: true,
    kind: ElementKind::Resource,
});

static DIV_SHAPE: LazyLock<ElementShape> = LazyLock::new(|| ElementShape {
    name: "div".to_string(),
    repeats: false,
    kind: ElementKind::Xhtml,
});

/// Elements every FHIR type shares, whether a shape declares them or not.
fn implicit_element(name: &str) -> Option<&'static ElementShape> {
    match name {
        "extension" => Some(&EXTENSION_SHAPE),
        "modifierExtension" => Some(&MODIFIER_EXTENSION_SHAPE),
        "contained" => Some(&CONTAINED_SHAPE),
        "div" => Some(&DIV_SHAPE),
        _ => None,
    }
}

/// Looks `name` up among `elements`, then among the implicit elements.
pub fn find_element<'a>(elements: &'a [ElementShape], name: &str) -> Option<&'a ElementShape> {
    elements
        .iter()
        .find(|e| e.name == name)
        .or_else(|| implicit_element(name))
}

impl TypeShape {
    /// A shape that declares nothing; every element is inferred.
    pub fn open(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            elements: Vec::new(),
        }
    }

    /// Creates a shape from declared elements.
    pub fn new(type_name: impl Into<String>, elements: Vec<ElementShape>) -> Self {
        Self {
            type_name: type_name.into(),
            elements,
        }
    }

    /// Parses a shape from its JSON form.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parses a list of shapes from a JSON array.
    pub fn list_from_json_str(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns true when the shape declares no elements.
    pub fn is_open(&self) -> bool {
        self.elements.is_empty()
    }

    /// Finds a top level element, declared or implicit.
    pub fn element(&self, name: &str) -> Option<&ElementShape> {
        find_element(&self.elements, name)
    }
}

impl ElementShape {
    /// A single valued primitive element.
    pub fn primitive(name: impl Into<String>, kind: PrimitiveKind) -> Self {
        Self {
            name: name.into(),
            repeats: false,
            kind: ElementKind::Primitive(kind),
        }
    }

    /// A single valued complex element.
    pub fn complex(name: impl Into<String>, elements: Vec<ElementShape>) -> Self {
        Self {
            name: name.into(),
            repeats: false,
            kind: ElementKind::Complex { elements },
        }
    }

    /// Marks the element as repeating.
    pub fn repeating(mut self) -> Self {
        self.repeats = true;
        self
    }

    /// Declared children of a complex element; empty for other kinds.
    pub fn children(&self) -> &[ElementShape] {
        match &self.kind {
            ElementKind::Complex { elements } => elements,
            _ => &[],
        }
    }
}
