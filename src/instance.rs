//! Provider instance sources
//!
//! A [`ProviderInstanceFactory`] is what an artifact factory receives: it
//! knows which provider it stands for and can supply an instance of it,
//! either the one shared instance or a fresh one per call.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::classifier::InstantiationModel;
use crate::error::RegistryError;
use crate::registry::{InstanceHandle, Registry, TypeDescriptor};

/// Attribute holding a provider's precedence
pub const ORDER_ATTRIBUTE: &str = "order";

/// Precedence of providers that declare none
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// What is known about a provider without instantiating it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMetadata {
    pub name: String,
    pub descriptor: TypeDescriptor,
    pub model: InstantiationModel,
}

impl ProviderMetadata {
    pub fn new(name: impl Into<String>, descriptor: TypeDescriptor, model: InstantiationModel) -> Self {
        Self {
            name: name.into(),
            descriptor,
            model,
        }
    }

    /// Declared precedence; unparsable or missing values rank last
    pub fn order(&self) -> i32 {
        self.descriptor
            .attribute(ORDER_ATTRIBUTE)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(LOWEST_PRECEDENCE)
    }
}

/// Supplies the one shared provider instance
#[derive(Clone)]
pub struct SingletonSource {
    registry: Arc<dyn Registry>,
    metadata: Arc<ProviderMetadata>,
    instance: Arc<OnceLock<InstanceHandle>>,
}

impl SingletonSource {
    fn supply(&self) -> Result<InstanceHandle, RegistryError> {
        if let Some(instance) = self.instance.get() {
            return Ok(Arc::clone(instance));
        }
        let created = self.registry.instantiate(&self.metadata.name)?;
        // A racing caller may have stored first; everyone gets the stored one
        Ok(Arc::clone(self.instance.get_or_init(|| created)))
    }
}

/// Supplies a fresh provider instance per call
#[derive(Clone)]
pub struct PrototypeSource {
    registry: Arc<dyn Registry>,
    metadata: Arc<ProviderMetadata>,
}

impl PrototypeSource {
    fn supply(&self) -> Result<InstanceHandle, RegistryError> {
        self.registry.instantiate(&self.metadata.name)
    }
}

/// Source of provider instances handed to the artifact factory
#[derive(Clone)]
pub enum ProviderInstanceFactory {
    Singleton(SingletonSource),
    Prototype(PrototypeSource),
}

impl ProviderInstanceFactory {
    /// Obtain a provider instance. Singleton sources return the same handle every call.
    pub fn supply(&self) -> Result<InstanceHandle, RegistryError> {
        match self {
            ProviderInstanceFactory::Singleton(source) => source.supply(),
            ProviderInstanceFactory::Prototype(source) => source.supply(),
        }
    }

    pub fn metadata(&self) -> &ProviderMetadata {
        match self {
            ProviderInstanceFactory::Singleton(source) => &source.metadata,
            ProviderInstanceFactory::Prototype(source) => &source.metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata().name
    }

    pub fn model(&self) -> InstantiationModel {
        self.metadata().model
    }

    pub fn order(&self) -> i32 {
        self.metadata().order()
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, ProviderInstanceFactory::Singleton(_))
    }
}

impl fmt::Debug for ProviderInstanceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_shared() { "Singleton" } else { "Prototype" };
        f.debug_struct("ProviderInstanceFactory")
            .field("kind", &kind)
            .field("name", &self.name())
            .field("model", &self.model())
            .finish()
    }
}

/// Builds instance sources bound to one registry
#[derive(Clone)]
pub struct InstanceSourceFactory {
    registry: Arc<dyn Registry>,
}

impl InstanceSourceFactory {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self { registry }
    }

    pub fn singleton(&self, metadata: ProviderMetadata) -> ProviderInstanceFactory {
        ProviderInstanceFactory::Singleton(SingletonSource {
            registry: Arc::clone(&self.registry),
            metadata: Arc::new(metadata),
            instance: Arc::new(OnceLock::new()),
        })
    }

    pub fn prototype(&self, metadata: ProviderMetadata) -> ProviderInstanceFactory {
        ProviderInstanceFactory::Prototype(PrototypeSource {
            registry: Arc::clone(&self.registry),
            metadata: Arc::new(metadata),
        })
    }

    /// Source matching the provider's declared model
    pub fn for_model(&self, metadata: ProviderMetadata) -> ProviderInstanceFactory {
        match metadata.model {
            InstantiationModel::Singleton => self.singleton(metadata),
            InstantiationModel::PerInstance => self.prototype(metadata),
        }
    }
}
