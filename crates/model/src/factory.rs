//! Model factory resolution.
//!
//! When the codec meets a resource type token it asks a [`ModelFactoryList`]
//! for the factory that materializes that type. Factories are tried in the
//! order they were added and the first one whose [`ModelFactory::can_create`]
//! accepts the token wins, so a specific factory registered ahead of a generic
//! one overrides it.
//!
//! Finding no factory is an error, not a fallback: a client without a factory
//! for a type it receives is misconfigured.
//!
//! ```rust
//! use std::sync::Arc;
//! use helios_client_model::{DefaultModelFactory, ModelFactoryList, StructureFactory, TypeShape};
//!
//! let mut factories = ModelFactoryList::new();
//! factories.add(Arc::new(StructureFactory::new(vec![TypeShape::open("Patient")])));
//! factories.add(Arc::new(DefaultModelFactory));
//!
//! assert_eq!(factories.find_factory("Patient").unwrap().name(), "structure");
//! assert_eq!(factories.find_factory("Location").unwrap().name(), "default");
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::FactoryError;
use crate::shape::TypeShape;
use crate::validation;

/// Materializes resource types.
pub trait ModelFactory: Send + Sync {
    /// Short name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Returns true when this factory can create the given resource type.
    fn can_create(&self, type_name: &str) -> bool;

    /// Returns the shape used to materialize `type_name`.
    ///
    /// Only called after [`ModelFactory::can_create`] returned true.
    fn create(&self, type_name: &str) -> Arc<TypeShape>;
}

/// Handles every well-formed resource type name with an open shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultModelFactory;

impl ModelFactory for DefaultModelFactory {
    fn name(&self) -> &str {
        "default"
    }

    fn can_create(&self, type_name: &str) -> bool {
        validation::is_resource_name(type_name)
    }

    fn create(&self, type_name: &str) -> Arc<TypeShape> {
        Arc::new(TypeShape::open(type_name))
    }
}

/// Handles exactly the resource types it holds declared shapes for.
#[derive(Debug, Clone, Default)]
pub struct StructureFactory {
    shapes: HashMap<String, Arc<TypeShape>>,
}

impl StructureFactory {
    /// Creates a factory from a set of shapes.
    pub fn new(shapes: impl IntoIterator<Item = TypeShape>) -> Self {
        Self {
            shapes: shapes
                .into_iter()
                .map(|s| (s.type_name.clone(), Arc::new(s)))
                .collect(),
        }
    }

    /// Loads shapes from a JSON array of [`TypeShape`]s.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(TypeShape::list_from_json_str(json)?))
    }

    /// Adds or replaces a shape.
    pub fn insert(&mut self, shape: TypeShape) {
        self.shapes.insert(shape.type_name.clone(), Arc::new(shape));
    }

    /// Names of all types with a declared shape.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.shapes.keys().map(String::as_str)
    }
}

impl ModelFactory for StructureFactory {
    fn name(&self) -> &str {
        "structure"
    }

    fn can_create(&self, type_name: &str) -> bool {
        self.shapes.contains_key(type_name)
    }

    fn create(&self, type_name: &str) -> Arc<TypeShape> {
        self.shapes
            .get(type_name)
            .cloned()
            .unwrap_or_else(|| Arc::new(TypeShape::open(type_name)))
    }
}

/// Ordered registry of model factories.
#[derive(Clone, Default)]
pub struct ModelFactoryList {
    factories: Vec<Arc<dyn ModelFactory>>,
}

impl ModelFactoryList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// A list holding only the [`DefaultModelFactory`].
    pub fn standard() -> Self {
        let mut list = Self::new();
        list.add(Arc::new(DefaultModelFactory));
        list
    }

    /// A list trying the given shapes first, then the default factory.
    pub fn with_shapes(shapes: impl IntoIterator<Item = TypeShape>) -> Self {
        let mut list = Self::new();
        list.add(Arc::new(StructureFactory::new(shapes)));
        list.add(Arc::new(DefaultModelFactory));
        list
    }

    /// Appends a factory. Earlier factories take precedence.
    pub fn add(&mut self, factory: Arc<dyn ModelFactory>) -> &mut Self {
        self.factories.push(factory);
        self
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true when no factory is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Returns the first factory that can create `type_name`.
    pub fn find_factory(&self, type_name: &str) -> Result<&Arc<dyn ModelFactory>, FactoryError> {
        let found = self.factories.iter().find(|f| f.can_create(type_name));
        match found {
            Some(factory) => {
                trace!(type_name, factory = factory.name(), "Resolved model factory");
                Ok(factory)
            }
            None => Err(FactoryError::NoFactoryFound {
                type_name: type_name.to_string(),
            }),
        }
    }

    /// Resolves the factory for `type_name` and returns the shape it creates.
    pub fn shape_for(&self, type_name: &str) -> Result<Arc<TypeShape>, FactoryError> {
        Ok(self.find_factory(type_name)?.create(type_name))
    }
}

impl fmt::Debug for ModelFactoryList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.factories.iter().map(|factory| factory.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SpecificFactory;

    impl ModelFactory for SpecificFactory {
        fn name(&self) -> &str {
            "specific"
        }

        fn can_create(&self, type_name: &str) -> bool {
            type_name == "SpecificModel"
        }

        fn create(&self, type_name: &str) -> Arc<TypeShape> {
            Arc::new(TypeShape::open(type_name))
        }
    }

    #[test]
    fn test_first_registered_wins() {
        let mut factories = ModelFactoryList::new();
        let specific: Arc<dyn ModelFactory> = Arc::new(SpecificFactory);
        let default: Arc<dyn ModelFactory> = Arc::new(DefaultModelFactory);
        factories.add(specific.clone()).add(default.clone());

        let selected = factories.find_factory("SpecificModel").unwrap();
        assert!(Arc::ptr_eq(selected, &specific));

        let selected = factories.find_factory("GenericModel").unwrap();
        assert!(Arc::ptr_eq(selected, &default));
    }

    #[test]
    fn test_order_is_significant() {
        let mut factories = ModelFactoryList::new();
        factories.add(Arc::new(DefaultModelFactory));
        factories.add(Arc::new(SpecificFactory));

        // Both handle the type; the one added first is chosen.
        assert_eq!(
            factories.find_factory("SpecificModel").unwrap().name(),
            "default"
        );
    }

    #[test]
    fn test_no_factory_found() {
        let mut factories = ModelFactoryList::new();
        factories.add(Arc::new(SpecificFactory));

        let err = factories.find_factory("GenericModel").err().unwrap();
        assert_eq!(
            err,
            FactoryError::NoFactoryFound {
                type_name: "GenericModel".to_string()
            }
        );
        assert!(ModelFactoryList::new().find_factory("Patient").is_err());
    }

    #[test]
    fn test_default_factory_rejects_non_names() {
        let factories = ModelFactoryList::standard();
        assert!(factories.find_factory("Patient").is_ok());
        assert!(factories.find_factory("patient").is_err());
        assert!(factories.find_factory("").is_err());
    }

    #[test]
    fn test_structure_factory_shapes() {
        let factories = ModelFactoryList::with_shapes(vec![TypeShape::new(
            "Organization",
            vec![crate::ElementShape::primitive(
                "name",
                crate::PrimitiveKind::String,
            )],
        )]);
        assert!(!factories.shape_for("Organization").unwrap().is_open());
        assert!(factories.shape_for("Location").unwrap().is_open());
    }
}
