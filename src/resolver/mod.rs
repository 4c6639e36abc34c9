//! Provider resolution cache
//!
//! The first call to [`ResolutionCache::resolve_all`] walks the registry
//! once, classifies every eligible candidate and builds artifacts for the
//! providers it finds. Discovery runs under double-checked locking: the
//! published name list is read lock-free, and only a thread that sees it
//! unset takes the discovery lock and re-checks before doing any work.
//!
//! Later calls never take the lock. Artifacts of singleton providers are
//! served from a permanent cache; per-instance providers are rebuilt on
//! every call through their cached instance source.
//!
//! A discovery pass that hits a scope contradiction publishes nothing, so
//! the next call starts over.

mod stats;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

use crate::artifact::ArtifactFactory;
use crate::classifier::{InstantiationModel, MarkerClassifier, ProviderClassifier};
use crate::config::{ResolverConfig, UnresolvableTypePolicy};
use crate::eligibility::{AcceptAll, EligibilityFilter, IncludePatterns};
use crate::error::{ConfigError, ResolveError, Result};
use crate::instance::{InstanceSourceFactory, ProviderInstanceFactory, ProviderMetadata};
use crate::logging::OperationTimer;
use crate::registry::{Registry, TypeFilter};

pub use stats::ResolutionStatsSnapshot;
use stats::ResolutionStats;

type ArtifactList<F> = Vec<Arc<<F as ArtifactFactory>::Artifact>>;

/// Discovers providers once and serves their artifacts from cache
pub struct ResolutionCache<F: ArtifactFactory> {
    registry: Arc<dyn Registry>,
    artifact_factory: F,
    classifier: Box<dyn ProviderClassifier>,
    eligibility: Box<dyn EligibilityFilter>,
    sources: InstanceSourceFactory,
    unresolvable_types: UnresolvableTypePolicy,

    /// Provider names in discovery order; set once, never cleared
    discovered: OnceLock<Arc<[String]>>,
    discovery_lock: Mutex<()>,
    /// Permanent artifacts of singleton providers
    singleton_artifacts: DashMap<String, Arc<[Arc<F::Artifact>]>>,
    /// Sources of providers whose artifacts are rebuilt per call
    instance_factories: DashMap<String, ProviderInstanceFactory>,
    stats: ResolutionStats,
}

impl<F: ArtifactFactory> ResolutionCache<F> {
    /// Cache with every candidate eligible and the default marker classifier
    pub fn new(registry: Arc<dyn Registry>, artifact_factory: F) -> Self {
        Self {
            sources: InstanceSourceFactory::new(Arc::clone(&registry)),
            registry,
            artifact_factory,
            classifier: Box::new(MarkerClassifier::default()),
            eligibility: Box::new(AcceptAll),
            unresolvable_types: UnresolvableTypePolicy::default(),
            discovered: OnceLock::new(),
            discovery_lock: Mutex::new(()),
            singleton_artifacts: DashMap::new(),
            instance_factories: DashMap::new(),
            stats: ResolutionStats::default(),
        }
    }

    /// Cache configured from [`ResolverConfig`]
    pub fn from_config(
        registry: Arc<dyn Registry>,
        artifact_factory: F,
        config: &ResolverConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let eligibility = IncludePatterns::new(&config.include_patterns)?;
        Ok(Self::new(registry, artifact_factory)
            .with_classifier(MarkerClassifier::new(config.provider_marker.clone()))
            .with_eligibility(eligibility)
            .with_unresolvable_types(config.unresolvable_types))
    }

    pub fn with_classifier(mut self, classifier: impl ProviderClassifier + 'static) -> Self {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn with_eligibility(mut self, eligibility: impl EligibilityFilter + 'static) -> Self {
        self.eligibility = Box::new(eligibility);
        self
    }

    pub fn with_unresolvable_types(mut self, policy: UnresolvableTypePolicy) -> Self {
        self.unresolvable_types = policy;
        self
    }

    /// All artifacts of all eligible providers, in discovery order and then
    /// in the order the artifact factory produced them.
    pub fn resolve_all(&self) -> Result<ArtifactList<F>> {
        self.stats.record_call();

        if let Some(names) = self.discovered.get() {
            return self.resolve_cached(names);
        }

        let names = {
            let _guard = self.discovery_lock.lock();
            match self.discovered.get() {
                Some(names) => Arc::clone(names),
                None => return self.discover(),
            }
        };
        self.resolve_cached(&names)
    }

    /// Provider names published by discovery, `None` before it succeeds
    pub fn discovered_names(&self) -> Option<Arc<[String]>> {
        self.discovered.get().cloned()
    }

    pub fn is_discovered(&self) -> bool {
        self.discovered.get().is_some()
    }

    pub fn stats(&self) -> ResolutionStatsSnapshot {
        self.stats.snapshot()
    }

    /// Where a discovered provider's artifacts come from on cached calls
    pub fn placement(&self, name: &str) -> Option<CachePlacement> {
        if self.singleton_artifacts.contains_key(name) {
            Some(CachePlacement::SingletonArtifacts)
        } else if self.instance_factories.contains_key(name) {
            Some(CachePlacement::InstanceFactory)
        } else {
            None
        }
    }

    /// Full discovery pass. Caller holds the discovery lock.
    fn discover(&self) -> Result<ArtifactList<F>> {
        self.stats.record_discovery();
        let timer = OperationTimer::new("provider_discovery");

        // Leftovers of an aborted attempt must not survive into this one
        self.singleton_artifacts.clear();
        self.instance_factories.clear();

        match self.discover_providers() {
            Ok((names, artifacts)) => {
                tracing::info!(
                    providers = names.len(),
                    artifacts = artifacts.len(),
                    elapsed_ms = timer.elapsed().as_millis() as u64,
                    "Provider discovery completed"
                );
                let published = self.discovered.set(names.into()).is_ok();
                debug_assert!(published, "discovery published twice");
                timer.finish();
                Ok(artifacts)
            }
            Err(err) => {
                self.stats.record_discovery_failure();
                tracing::warn!(error = %err, "Provider discovery aborted");
                Err(err)
            }
        }
    }

    fn discover_providers(&self) -> Result<(Vec<String>, ArtifactList<F>)> {
        let mut names = Vec::new();
        let mut artifacts = Vec::new();

        for name in self.registry.candidate_names(&TypeFilter::Any)? {
            if !self.eligibility.is_eligible(&name) {
                tracing::trace!(component = %name, "Skipping ineligible component");
                continue;
            }
            let Some(descriptor) = self.registry.type_of(&name) else {
                self.report_unresolvable(&name);
                continue;
            };
            if !self.classifier.is_provider(&descriptor) {
                continue;
            }

            names.push(name.clone());
            let model = self.classifier.instantiation_model(&descriptor);
            let metadata = ProviderMetadata::new(name.clone(), descriptor, model);
            tracing::debug!(provider = %name, model = %model, "Discovered provider");

            let source = self.sources.for_model(metadata);

            match model {
                InstantiationModel::Singleton => {
                    if !self.registry.is_singleton(&name)? {
                        return Err(contradiction(name, model, false));
                    }
                    let built = self.build(&source)?;
                    artifacts.extend(built.iter().cloned());

                    // Scope is asked again; a registry that answers differently now
                    // gets its provider rebuilt per call
                    if self.registry.is_singleton(&name)? {
                        self.singleton_artifacts.insert(name, built.into());
                    } else {
                        tracing::warn!(
                            provider = %name,
                            "Registry scope changed during discovery, caching instance source instead of artifacts"
                        );
                        self.instance_factories.insert(name, source);
                    }
                }
                InstantiationModel::PerInstance => {
                    if self.registry.is_singleton(&name)? {
                        return Err(contradiction(name, model, true));
                    }
                    self.instance_factories.insert(name, source.clone());
                    artifacts.extend(self.build(&source)?);
                }
            }
        }

        Ok((names, artifacts))
    }

    fn resolve_cached(&self, names: &[String]) -> Result<ArtifactList<F>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();
        for name in names {
            if let Some(cached) = self.singleton_artifacts.get(name) {
                self.stats.record_singleton_hit();
                artifacts.extend(cached.iter().cloned());
                continue;
            }

            // Cloned out so the map shard is not locked while the factory runs
            let source = self
                .instance_factories
                .get(name)
                .map(|entry| entry.value().clone())
                .ok_or_else(|| ResolveError::CacheInconsistency { name: name.clone() })?;
            self.stats.record_rebuild();
            artifacts.extend(self.build(&source)?);
        }
        Ok(artifacts)
    }

    fn build(&self, source: &ProviderInstanceFactory) -> Result<ArtifactList<F>> {
        self.stats.record_build();
        self.artifact_factory
            .build_artifacts(source)
            .map_err(ResolveError::ArtifactFactory)
    }

    fn report_unresolvable(&self, name: &str) {
        match self.unresolvable_types {
            UnresolvableTypePolicy::Skip => {
                tracing::trace!(component = %name, "Skipping component with unresolvable type");
            }
            UnresolvableTypePolicy::Warn => {
                tracing::warn!(component = %name, "Component type cannot be determined, skipping it");
            }
        }
    }
}

/// Which cache serves a discovered provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePlacement {
    SingletonArtifacts,
    InstanceFactory,
}

fn contradiction(name: String, declared: InstantiationModel, singleton_scoped: bool) -> ResolveError {
    ResolveError::ConfigurationContradiction {
        name,
        declared,
        singleton_scoped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::FnArtifactFactory;
    use crate::error::BoxError;
    use crate::registry::{ComponentDefinition, ComponentRegistry, Scope, TypeDescriptor};

    #[derive(Debug)]
    struct Rule {
        provider: String,
    }

    fn rule_factory() -> impl ArtifactFactory<Artifact = Rule> {
        FnArtifactFactory::new(|source: &ProviderInstanceFactory| -> std::result::Result<Vec<Arc<Rule>>, BoxError> {
            Ok(vec![Arc::new(Rule {
                provider: source.name().to_string(),
            })])
        })
    }

    fn aspect(model: &str) -> TypeDescriptor {
        TypeDescriptor::new("app.Aspect")
            .with_marker("aspect")
            .with_attribute("instantiation", model)
    }

    #[test]
    fn test_empty_registry_resolves_to_nothing() {
        let registry = Arc::new(ComponentRegistry::new());
        let cache = ResolutionCache::new(registry.clone(), rule_factory());

        assert!(cache.resolve_all().unwrap().is_empty());
        assert!(cache.resolve_all().unwrap().is_empty());

        assert_eq!(cache.discovered_names().unwrap().len(), 0);
        assert_eq!(registry.stats().enumerations, 1);
    }

    #[test]
    fn test_providers_land_in_exactly_one_cache() {
        let registry = Arc::new(ComponentRegistry::new());
        registry.register_singleton("shared", aspect("singleton"), || 0u8);
        registry.register_prototype("perTarget", aspect("pertarget"), || 0u8);
        registry.register_singleton("plainService", TypeDescriptor::new("app.Service"), || 0u8);

        let cache = ResolutionCache::new(registry, rule_factory());
        let rules = cache.resolve_all().unwrap();

        let providers: Vec<_> = rules.iter().map(|r| r.provider.as_str()).collect();
        assert_eq!(providers, vec!["shared", "perTarget"]);
        assert_eq!(cache.placement("shared"), Some(CachePlacement::SingletonArtifacts));
        assert_eq!(cache.placement("perTarget"), Some(CachePlacement::InstanceFactory));
        assert_eq!(cache.placement("plainService"), None);
    }

    #[test]
    fn test_unresolvable_types_are_skipped_without_instantiation() {
        let registry = Arc::new(ComponentRegistry::new());
        registry.register(
            "factoryProduced",
            ComponentDefinition::new(None, Scope::Singleton, || Ok(0u8)),
        );
        registry.register_singleton("shared", aspect("singleton"), || 0u8);

        let cache = ResolutionCache::new(registry.clone(), rule_factory())
            .with_unresolvable_types(UnresolvableTypePolicy::Warn);
        let rules = cache.resolve_all().unwrap();

        assert_eq!(rules.len(), 1);
        assert_eq!(registry.instantiation_count("factoryProduced"), 0);
        assert_eq!(&*cache.discovered_names().unwrap(), &["shared".to_string()]);
    }

    #[test]
    fn test_per_instance_provider_in_singleton_scope_is_rejected() {
        let registry = Arc::new(ComponentRegistry::new());
        registry.register_singleton("perThis", aspect("perthis"), || 0u8);

        let cache = ResolutionCache::new(registry, rule_factory());
        let err = cache.resolve_all().unwrap_err();

        assert!(matches!(
            err,
            ResolveError::ConfigurationContradiction {
                ref name,
                declared: InstantiationModel::PerInstance,
                singleton_scoped: true,
            } if name == "perThis"
        ));
        assert!(!cache.is_discovered());
        assert_eq!(cache.stats().discovery_failures, 1);
    }

    #[test]
    fn test_artifact_factory_errors_propagate() {
        let registry = Arc::new(ComponentRegistry::new());
        registry.register_singleton("shared", aspect("singleton"), || 0u8);

        let factory = FnArtifactFactory::<_, Rule>::new(
            |_: &ProviderInstanceFactory| -> std::result::Result<Vec<Arc<Rule>>, BoxError> { Err("factory down".into()) },
        );
        let cache = ResolutionCache::new(registry, factory);

        let err = cache.resolve_all().unwrap_err();
        assert!(matches!(err, ResolveError::ArtifactFactory(_)));
        assert_eq!(err.to_string(), "factory down");
        assert!(!cache.is_discovered());
    }

    #[test]
    fn test_retry_after_failure_starts_from_clean_caches() {
        let registry = Arc::new(ComponentRegistry::new());
        registry.register_singleton("first", aspect("singleton"), || 0u8);
        registry.register_prototype("second", aspect("singleton"), || 0u8);

        let cache = ResolutionCache::new(registry.clone(), rule_factory());
        assert!(cache.resolve_all().is_err());
        // "first" was cached provisionally before the failure on "second"
        assert_eq!(cache.placement("first"), Some(CachePlacement::SingletonArtifacts));

        registry.register_prototype("first", aspect("pertarget"), || 0u8);
        registry.set_scope("second", Scope::Singleton).unwrap();

        let rules = cache.resolve_all().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(cache.placement("first"), Some(CachePlacement::InstanceFactory));
        assert_eq!(cache.placement("second"), Some(CachePlacement::SingletonArtifacts));
    }
}
