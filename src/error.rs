//! Error types for advisor resolution

use thiserror::Error;

use crate::classifier::InstantiationModel;

/// Boxed error returned by pluggable collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by a component registry
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No component is registered under the name
    #[error("No component named '{0}' is registered")]
    NoSuchComponent(String),

    /// The component's constructor failed
    #[error("Failed to instantiate component '{name}': {source}")]
    Instantiation {
        name: String,
        #[source]
        source: BoxError,
    },
}

/// Errors surfaced by `ResolutionCache::resolve_all`
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A provider's declared instantiation model conflicts with its registry scope
    #[error(
        "Component '{name}' is {}, but its declared instantiation model is {declared}",
        scope_phrase(.singleton_scoped)
    )]
    ConfigurationContradiction {
        name: String,
        declared: InstantiationModel,
        singleton_scoped: bool,
    },

    /// Registry failure, passed through unchanged
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Artifact factory failure, passed through unchanged
    #[error(transparent)]
    ArtifactFactory(BoxError),

    /// A discovered provider has neither cached artifacts nor an instance factory
    #[error("Provider '{name}' was discovered but has no cached artifacts or instance factory")]
    CacheInconsistency { name: String },
}

impl ResolveError {
    /// Name of the offending component, when the error concerns one
    pub fn component_name(&self) -> Option<&str> {
        match self {
            ResolveError::ConfigurationContradiction { name, .. }
            | ResolveError::CacheInconsistency { name } => Some(name),
            ResolveError::Registry(RegistryError::NoSuchComponent(name))
            | ResolveError::Registry(RegistryError::Instantiation { name, .. }) => Some(name),
            ResolveError::ArtifactFactory(_) => None,
        }
    }

    pub fn is_contradiction(&self) -> bool {
        matches!(self, ResolveError::ConfigurationContradiction { .. })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid include pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

fn scope_phrase(singleton_scoped: &bool) -> &'static str {
    if *singleton_scoped {
        "singleton-scoped"
    } else {
        "not singleton-scoped"
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;
