//! In-memory component registry
//!
//! Definitions are kept in registration order. Singleton instances are
//! created at most once and shared; prototype instances are created on
//! every request. Type metadata is answered from the definition alone, so
//! inspecting a component never creates it.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{InstanceHandle, Registry, TypeDescriptor, TypeFilter};
use crate::error::{BoxError, RegistryError};

/// Component scope as recorded by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// One shared instance for the registry's lifetime
    #[default]
    Singleton,
    /// A new instance per request
    Prototype,
}

type Constructor = Arc<dyn Fn() -> Result<InstanceHandle, BoxError> + Send + Sync>;

/// A registered component
#[derive(Clone)]
pub struct ComponentDefinition {
    /// `None` when the type cannot be known before instantiation
    descriptor: Option<TypeDescriptor>,
    scope: Scope,
    constructor: Constructor,
}

impl ComponentDefinition {
    pub fn new<T, F>(descriptor: Option<TypeDescriptor>, scope: Scope, constructor: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        Self {
            descriptor,
            scope,
            constructor: Arc::new(move || {
                let instance = constructor()?;
                Ok(Arc::new(instance) as InstanceHandle)
            }),
        }
    }

    pub fn descriptor(&self) -> Option<&TypeDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("descriptor", &self.descriptor)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Shared instance slot, replaced whenever its definition changes
type SingletonSlot = Arc<Mutex<Option<InstanceHandle>>>;

/// A definition together with the slot its shared instance lives in
struct RegistryEntry {
    definition: ComponentDefinition,
    singleton: SingletonSlot,
}

impl RegistryEntry {
    fn new(definition: ComponentDefinition) -> Self {
        Self {
            definition,
            singleton: Arc::new(Mutex::new(None)),
        }
    }
}

/// Registry statistics
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    pub enumerations: usize,
    pub instantiations: usize,
}

/// Thread-safe in-memory registry with an optional parent
pub struct ComponentRegistry {
    order: RwLock<Vec<String>>,
    /// Each entry owns its shared-instance slot
    definitions: DashMap<String, RegistryEntry>,
    instantiations: DashMap<String, usize>,
    enumerations: AtomicUsize,
    parent: Option<Arc<dyn Registry>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self {
            order: RwLock::new(Vec::new()),
            definitions: DashMap::new(),
            instantiations: DashMap::new(),
            enumerations: AtomicUsize::new(0),
            parent: None,
        }
    }

    /// Create a child registry; names it does not define are looked up in `parent`
    pub fn with_parent(parent: Arc<dyn Registry>) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new()
        }
    }

    /// Register or replace a component. A replaced component keeps its position
    /// and drops any shared instance it had.
    pub fn register(&self, name: impl Into<String>, definition: ComponentDefinition) {
        let name = name.into();
        {
            let mut order = self.order.write();
            if !order.contains(&name) {
                order.push(name.clone());
            }
        }
        tracing::debug!(component = %name, scope = ?definition.scope, "Registered component");
        self.definitions.insert(name, RegistryEntry::new(definition));
    }

    pub fn register_singleton<T, F>(&self, name: impl Into<String>, descriptor: TypeDescriptor, constructor: F)
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        self.register(
            name,
            ComponentDefinition::new(Some(descriptor), Scope::Singleton, move || Ok(constructor())),
        );
    }

    pub fn register_prototype<T, F>(&self, name: impl Into<String>, descriptor: TypeDescriptor, constructor: F)
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Any + Send + Sync,
    {
        self.register(
            name,
            ComponentDefinition::new(Some(descriptor), Scope::Prototype, move || Ok(constructor())),
        );
    }

    /// Change the scope of a local component, e.g. after a configuration reload
    pub fn set_scope(&self, name: &str, scope: Scope) -> Result<(), RegistryError> {
        let mut entry = self
            .definitions
            .get_mut(name)
            .ok_or_else(|| RegistryError::NoSuchComponent(name.to_string()))?;
        entry.definition.scope = scope;
        entry.singleton = Arc::new(Mutex::new(None));
        drop(entry);
        tracing::debug!(component = %name, scope = ?scope, "Changed component scope");
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// How many times the named local component has been constructed
    pub fn instantiation_count(&self, name: &str) -> usize {
        self.instantiations.get(name).map(|c| *c).unwrap_or(0)
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            enumerations: self.enumerations.load(Ordering::Relaxed),
            instantiations: self.instantiations.iter().map(|e| *e.value()).sum(),
        }
    }

    fn construct(&self, name: &str, constructor: &Constructor) -> Result<InstanceHandle, RegistryError> {
        let instance = constructor().map_err(|source| RegistryError::Instantiation {
            name: name.to_string(),
            source,
        })?;
        *self.instantiations.entry(name.to_string()).or_insert(0) += 1;
        Ok(instance)
    }

    fn shared_instance(
        &self,
        name: &str,
        constructor: &Constructor,
        cell: &SingletonSlot,
    ) -> Result<InstanceHandle, RegistryError> {
        let mut slot = cell.lock();
        if let Some(instance) = slot.as_ref() {
            return Ok(Arc::clone(instance));
        }
        let instance = self.construct(name, constructor)?;
        *slot = Some(Arc::clone(&instance));
        Ok(instance)
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("components", &*self.order.read())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

impl Registry for ComponentRegistry {
    fn candidate_names(&self, filter: &TypeFilter) -> Result<Vec<String>, RegistryError> {
        self.enumerations.fetch_add(1, Ordering::Relaxed);

        let mut names: Vec<String> = self
            .order
            .read()
            .iter()
            .filter(|name| {
                self.definitions
                    .get(name.as_str())
                    .is_some_and(|entry| filter.matches(entry.definition.descriptor()))
            })
            .cloned()
            .collect();

        if let Some(parent) = &self.parent {
            let mut seen: HashSet<String> = names.iter().cloned().collect();
            for name in parent.candidate_names(filter)? {
                if !self.contains(&name) && seen.insert(name.clone()) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    fn type_of(&self, name: &str) -> Option<TypeDescriptor> {
        match self.definitions.get(name) {
            Some(entry) => entry.definition.descriptor.clone(),
            None => self.parent.as_ref().and_then(|p| p.type_of(name)),
        }
    }

    fn is_singleton(&self, name: &str) -> Result<bool, RegistryError> {
        match self.definitions.get(name) {
            Some(entry) => Ok(entry.definition.scope == Scope::Singleton),
            None => match &self.parent {
                Some(parent) => parent.is_singleton(name),
                None => Err(RegistryError::NoSuchComponent(name.to_string())),
            },
        }
    }

    fn instantiate(&self, name: &str) -> Result<InstanceHandle, RegistryError> {
        // Constructor and slot are cloned under one guard; none is held while user code runs
        let entry = self.definitions.get(name).map(|entry| {
            (
                entry.definition.scope,
                Arc::clone(&entry.definition.constructor),
                Arc::clone(&entry.singleton),
            )
        });
        match entry {
            Some((Scope::Singleton, constructor, slot)) => self.shared_instance(name, &constructor, &slot),
            Some((Scope::Prototype, constructor, _)) => self.construct(name, &constructor),
            None => match &self.parent {
                Some(parent) => parent.instantiate(name),
                None => Err(RegistryError::NoSuchComponent(name.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct Widget {
        serial: usize,
    }

    fn counting_registry(scope: Scope) -> (ComponentRegistry, Arc<AtomicUsize>) {
        let registry = ComponentRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        registry.register(
            "widget",
            ComponentDefinition::new(Some(TypeDescriptor::new("app.Widget")), scope, move || {
                Ok(Widget {
                    serial: counter_clone.fetch_add(1, Ordering::SeqCst),
                })
            }),
        );
        (registry, counter)
    }

    #[test]
    fn test_singleton_is_created_once_and_shared() {
        let (registry, counter) = counting_registry(Scope::Singleton);

        let first = registry.instantiate("widget").unwrap();
        let second = registry.instantiate("widget").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(registry.instantiation_count("widget"), 1);
    }

    #[test]
    fn test_prototype_is_created_per_request() {
        let (registry, counter) = counting_registry(Scope::Prototype);

        let first = registry.instantiate("widget").unwrap();
        let second = registry.instantiate("widget").unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.downcast_ref::<Widget>().unwrap().serial, 0);
        assert_eq!(second.downcast_ref::<Widget>().unwrap().serial, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_type_of_does_not_instantiate() {
        let (registry, counter) = counting_registry(Scope::Singleton);

        let descriptor = registry.type_of("widget").unwrap();

        assert_eq!(descriptor.type_name, "app.Widget");
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(registry.type_of("missing").is_none());
    }

    #[test]
    fn test_unknown_component_errors() {
        let registry = ComponentRegistry::new();

        assert!(matches!(
            registry.is_singleton("ghost"),
            Err(RegistryError::NoSuchComponent(name)) if name == "ghost"
        ));
        assert!(registry.instantiate("ghost").is_err());
    }

    #[test]
    fn test_constructor_failure_is_reported_with_name() {
        let registry = ComponentRegistry::new();
        registry.register(
            "broken",
            ComponentDefinition::new::<Widget, _>(None, Scope::Prototype, || Err("boom".into())),
        );

        let err = registry.instantiate("broken").unwrap_err();
        assert!(matches!(err, RegistryError::Instantiation { ref name, .. } if name == "broken"));
        assert_eq!(registry.instantiation_count("broken"), 0);
    }

    #[test]
    fn test_set_scope_changes_singleton_check() {
        let (registry, _) = counting_registry(Scope::Prototype);
        assert!(!registry.is_singleton("widget").unwrap());

        registry.set_scope("widget", Scope::Singleton).unwrap();

        assert!(registry.is_singleton("widget").unwrap());
        assert!(registry.set_scope("ghost", Scope::Singleton).is_err());
    }

    #[test]
    fn test_replaced_singleton_never_serves_old_instance() {
        let registry = Arc::new(ComponentRegistry::new());
        registry.register_singleton("widget", TypeDescriptor::new("app.Widget"), || "old");
        let old = registry.instantiate("widget").unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..200 {
                        registry.instantiate("widget").unwrap();
                    }
                });
            }
            scope.spawn(|| {
                registry.register_singleton("widget", TypeDescriptor::new("app.Widget"), || "new");
            });
        });

        let current = registry.instantiate("widget").unwrap();
        assert!(!Arc::ptr_eq(&old, &current));
        assert_eq!(current.downcast_ref::<&str>(), Some(&"new"));
        assert!(Arc::ptr_eq(&current, &registry.instantiate("widget").unwrap()));
    }

    #[test]
    fn test_set_scope_drops_shared_instance() {
        let (registry, counter) = counting_registry(Scope::Singleton);
        let first = registry.instantiate("widget").unwrap();

        registry.set_scope("widget", Scope::Singleton).unwrap();
        let second = registry.instantiate("widget").unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reregistering_keeps_position() {
        let registry = ComponentRegistry::new();
        registry.register_singleton("a", TypeDescriptor::new("A"), || 1u8);
        registry.register_singleton("b", TypeDescriptor::new("B"), || 2u8);
        registry.register_prototype("a", TypeDescriptor::new("A2"), || 3u8);

        let names = registry.candidate_names(&TypeFilter::Any).unwrap();

        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.type_of("a").unwrap().type_name, "A2");
        assert!(!registry.is_singleton("a").unwrap());
    }

    #[test]
    fn test_parent_components_follow_local_ones() {
        let parent = Arc::new(ComponentRegistry::new());
        parent.register_singleton("shared", TypeDescriptor::new("Shared"), || 0u8);
        parent.register_singleton("local", TypeDescriptor::new("Shadowed"), || 0u8);

        let child = ComponentRegistry::with_parent(parent.clone());
        child.register_prototype("local", TypeDescriptor::new("Local"), || 1u8);

        let names = child.candidate_names(&TypeFilter::Any).unwrap();
        assert_eq!(names, vec!["local".to_string(), "shared".to_string()]);
        assert_eq!(child.len(), 1);
        assert!(!child.is_empty());
        assert_eq!(child.type_of("local").unwrap().type_name, "Local");
        assert_eq!(child.type_of("shared").unwrap().type_name, "Shared");
        assert!(child.is_singleton("shared").unwrap());
        assert!(child.instantiate("shared").is_ok());
        assert_eq!(parent.instantiation_count("shared"), 1);
    }

    #[test]
    fn test_filtered_enumeration_skips_unknown_types() {
        let registry = ComponentRegistry::new();
        registry.register_singleton("typed", TypeDescriptor::new("app.Aspect"), || 0u8);
        registry.register(
            "opaque",
            ComponentDefinition::new(None, Scope::Singleton, || Ok(0u8)),
        );

        let any = registry.candidate_names(&TypeFilter::Any).unwrap();
        let aspects = registry
            .candidate_names(&TypeFilter::AssignableTo("app.Aspect".into()))
            .unwrap();

        assert_eq!(any.len(), 2);
        assert_eq!(aspects, vec!["typed".to_string()]);
        assert_eq!(registry.stats().enumerations, 2);
    }
}
