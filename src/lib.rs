//! Resolves cross-cutting rule providers from a component registry and
//! caches the advisors built from them.
//!
//! ```
//! use std::sync::Arc;
//! use advisor_cache::prelude::*;
//!
//! let registry = Arc::new(ComponentRegistry::new());
//! registry.register_singleton(
//!     "auditAspect",
//!     TypeDescriptor::new("app.AuditAspect")
//!         .with_marker("aspect")
//!         .with_method(MethodDescriptor::new("logCall").annotated("before", "execution(* app..*(..))")),
//!     || "audit",
//! );
//!
//! let cache = ResolutionCache::new(registry, DeclarativeAdvisorFactory::new());
//! let advisors = cache.resolve_all().unwrap();
//! assert_eq!(advisors.len(), 1);
//! assert_eq!(advisors[0].kind, AdviceKind::Before);
//! ```

pub mod advisor;
pub mod artifact;
pub mod classifier;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod instance;
pub mod logging;
pub mod registry;
pub mod resolver;

pub use error::{ConfigError, RegistryError, ResolveError};
pub use resolver::{CachePlacement, ResolutionCache, ResolutionStatsSnapshot};

pub mod prelude {
    pub use crate::advisor::{AdviceKind, Advisor, DeclarativeAdvisorFactory};
    pub use crate::artifact::{ArtifactFactory, FnArtifactFactory};
    pub use crate::classifier::{InstantiationModel, MarkerClassifier, ProviderClassifier};
    pub use crate::eligibility::{AcceptAll, EligibilityFilter, IncludePatterns};
    pub use crate::error::{BoxError, ResolveError};
    pub use crate::instance::ProviderInstanceFactory;
    pub use crate::registry::{
        ComponentDefinition, ComponentRegistry, MethodDescriptor, Registry, Scope, TypeDescriptor, TypeFilter,
    };
    pub use crate::resolver::ResolutionCache;
}
