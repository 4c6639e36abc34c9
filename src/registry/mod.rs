//! Component registry seam
//!
//! The resolution cache only ever talks to a registry through [`Registry`]:
//! it enumerates candidate names, asks for type metadata without creating
//! anything, checks scopes, and finally asks for instances on demand.

pub mod memory;

use serde::Deserialize;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::RegistryError;

pub use memory::{ComponentDefinition, ComponentRegistry, Scope};

/// Opaque handle to a component instance
pub type InstanceHandle = Arc<dyn Any + Send + Sync>;

/// Supertype filter used when enumerating candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFilter {
    /// Every registered component
    Any,
    /// Components whose type is, or declares as supertype, the given name
    AssignableTo(String),
}

impl TypeFilter {
    pub fn matches(&self, descriptor: Option<&TypeDescriptor>) -> bool {
        match self {
            TypeFilter::Any => true,
            TypeFilter::AssignableTo(target) => {
                descriptor.is_some_and(|d| d.is_assignable_to(target))
            }
        }
    }
}

/// Declared metadata of a component type
///
/// This is everything that can be learned about a component without
/// instantiating it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TypeDescriptor {
    /// Fully qualified type name
    #[serde(rename = "type")]
    pub type_name: String,
    pub supertypes: Vec<String>,
    /// Type-level annotations, e.g. `aspect`
    pub markers: BTreeSet<String>,
    /// Type-level key/value metadata, e.g. `instantiation = "perthis"`
    pub attributes: BTreeMap<String, String>,
    pub methods: Vec<MethodDescriptor>,
}

impl TypeDescriptor {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.insert(marker.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.contains(marker)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn is_assignable_to(&self, target: &str) -> bool {
        self.type_name == target || self.supertypes.iter().any(|s| s == target)
    }
}

/// Declared metadata of a single method
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MethodDescriptor {
    pub name: String,
    /// Method-level annotations with their values, e.g. `before = "execution(* say())"`
    pub annotations: BTreeMap<String, String>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn annotated(mut self, annotation: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(annotation.into(), value.into());
        self
    }

    pub fn annotation(&self, annotation: &str) -> Option<&str> {
        self.annotations.get(annotation).map(String::as_str)
    }
}

/// A registry of named, typed components
pub trait Registry: Send + Sync {
    /// All candidate names matching the filter, in registration order
    fn candidate_names(&self, filter: &TypeFilter) -> Result<Vec<String>, RegistryError>;

    /// Type metadata for a name, `None` if it cannot be determined.
    /// Must not instantiate the component.
    fn type_of(&self, name: &str) -> Option<TypeDescriptor>;

    /// Whether the component is singleton-scoped
    fn is_singleton(&self, name: &str) -> Result<bool, RegistryError>;

    /// Shared instance for singleton scope, fresh instance otherwise
    fn instantiate(&self, name: &str) -> Result<InstanceHandle, RegistryError>;
}

impl<R: Registry + ?Sized> Registry for Arc<R> {
    fn candidate_names(&self, filter: &TypeFilter) -> Result<Vec<String>, RegistryError> {
        (**self).candidate_names(filter)
    }

    fn type_of(&self, name: &str) -> Option<TypeDescriptor> {
        (**self).type_of(name)
    }

    fn is_singleton(&self, name: &str) -> Result<bool, RegistryError> {
        (**self).is_singleton(name)
    }

    fn instantiate(&self, name: &str) -> Result<InstanceHandle, RegistryError> {
        (**self).instantiate(name)
    }
}
