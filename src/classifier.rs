//! Provider classification
//!
//! Decides from declared type metadata whether a component provides
//! cross-cutting rules and how its instances are meant to be shared.

use std::fmt;

use crate::registry::TypeDescriptor;

/// Marker carried by provider types unless configured otherwise
pub const DEFAULT_PROVIDER_MARKER: &str = "aspect";

/// Attribute holding a provider's declared instantiation model
pub const INSTANTIATION_ATTRIBUTE: &str = "instantiation";

/// How a provider's runtime instance is shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstantiationModel {
    /// One shared instance
    Singleton,
    /// A fresh instance per use
    PerInstance,
}

impl InstantiationModel {
    /// Read a declared model. Anything other than `singleton` is per-instance
    /// (`perthis`, `pertarget`, `pertypewithin`, ...).
    pub fn from_declaration(declaration: Option<&str>) -> Self {
        match declaration.map(str::trim) {
            None | Some("") => InstantiationModel::Singleton,
            Some(value) if value.eq_ignore_ascii_case("singleton") => InstantiationModel::Singleton,
            Some(_) => InstantiationModel::PerInstance,
        }
    }
}

impl fmt::Display for InstantiationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstantiationModel::Singleton => write!(f, "singleton"),
            InstantiationModel::PerInstance => write!(f, "per-instance"),
        }
    }
}

/// Capability query over type metadata. Implementations must be pure.
pub trait ProviderClassifier: Send + Sync {
    fn is_provider(&self, descriptor: &TypeDescriptor) -> bool;

    fn instantiation_model(&self, descriptor: &TypeDescriptor) -> InstantiationModel;
}

/// Classifies by a type-level marker and the `instantiation` attribute
#[derive(Debug, Clone)]
pub struct MarkerClassifier {
    marker: String,
}

impl MarkerClassifier {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }
}

impl Default for MarkerClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_PROVIDER_MARKER)
    }
}

impl ProviderClassifier for MarkerClassifier {
    fn is_provider(&self, descriptor: &TypeDescriptor) -> bool {
        descriptor.has_marker(&self.marker)
    }

    fn instantiation_model(&self, descriptor: &TypeDescriptor) -> InstantiationModel {
        InstantiationModel::from_declaration(descriptor.attribute(INSTANTIATION_ATTRIBUTE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_decides_provider() {
        let classifier = MarkerClassifier::default();

        assert!(classifier.is_provider(&TypeDescriptor::new("A").with_marker("aspect")));
        assert!(!classifier.is_provider(&TypeDescriptor::new("B").with_marker("service")));
        assert!(MarkerClassifier::new("advice").is_provider(&TypeDescriptor::new("C").with_marker("advice")));
    }

    #[test]
    fn test_instantiation_model_defaults_to_singleton() {
        let classifier = MarkerClassifier::default();
        let plain = TypeDescriptor::new("A").with_marker("aspect");
        let explicit = plain.clone().with_attribute(INSTANTIATION_ATTRIBUTE, "Singleton");

        assert_eq!(classifier.instantiation_model(&plain), InstantiationModel::Singleton);
        assert_eq!(classifier.instantiation_model(&explicit), InstantiationModel::Singleton);
    }

    #[test]
    fn test_any_other_declaration_is_per_instance() {
        for declaration in ["perthis", "pertarget", "pertypewithin", "prototype"] {
            assert_eq!(
                InstantiationModel::from_declaration(Some(declaration)),
                InstantiationModel::PerInstance,
                "{declaration}"
            );
        }
        assert_eq!(InstantiationModel::from_declaration(Some("  ")), InstantiationModel::Singleton);
    }
}
