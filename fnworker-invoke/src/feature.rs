//! Per-invocation feature store.
//!
//! A [`FeatureStore`] maps a capability type to one implementation of
//! it. The key is the capability's `TypeId` (usually a `dyn Trait`), not
//! the concrete type behind it, so callers can swap in an alternate
//! implementation without anyone else noticing.
//!
//! Stores are created fresh for every invocation and owned by its
//! context; nothing is shared across invocations except the providers,
//! which only construct defaults.

use fnworker_proto::WorkerError;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Slot = Box<dyn Any + Send + Sync>;

/// Supplies a default implementation for a capability that was never
/// set explicitly.
pub trait FeatureProvider: Send + Sync {
    /// Create the feature registered under `key`, if this provider knows
    /// it. The returned box must hold an `Arc<C>` where `TypeId::of::<C>() == key`.
    fn try_create(&self, key: TypeId) -> Option<Box<dyn Any + Send + Sync>>;
}

/// A [`FeatureProvider`] for a single capability, built by [`provide`].
pub struct FeatureFactory<C: ?Sized> {
    factory: Box<dyn Fn() -> Arc<C> + Send + Sync>,
}

/// Build a provider that constructs capability `C` on demand.
///
/// ```
/// use fnworker_invoke::feature::{FeatureStore, provide};
/// use std::sync::Arc;
///
/// trait Clock: Send + Sync { fn now(&self) -> u64; }
/// struct Fixed;
/// impl Clock for Fixed { fn now(&self) -> u64 { 42 } }
///
/// let mut store = FeatureStore::with_providers(vec![
///     Arc::new(provide::<dyn Clock>(|| Arc::new(Fixed))),
/// ]);
/// assert_eq!(store.get::<dyn Clock>().unwrap().now(), 42);
/// ```
pub fn provide<C>(factory: impl Fn() -> Arc<C> + Send + Sync + 'static) -> FeatureFactory<C>
where
    C: ?Sized + Send + Sync + 'static,
{
    FeatureFactory {
        factory: Box::new(factory),
    }
}

impl<C> FeatureProvider for FeatureFactory<C>
where
    C: ?Sized + Send + Sync + 'static,
{
    fn try_create(&self, key: TypeId) -> Option<Box<dyn Any + Send + Sync>> {
        if key != TypeId::of::<C>() {
            return None;
        }
        let feature: Slot = Box::new((self.factory)());
        Some(feature)
    }
}

/// Capability-keyed property bag owned by one invocation context.
#[derive(Default)]
pub struct FeatureStore {
    features: HashMap<TypeId, Slot>,
    providers: Vec<Arc<dyn FeatureProvider>>,
}

impl FeatureStore {
    /// An empty store with no default providers.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store that falls back to `providers`, in order, when
    /// [`get`](Self::get) misses.
    pub fn with_providers(providers: Vec<Arc<dyn FeatureProvider>>) -> Self {
        Self {
            features: HashMap::new(),
            providers,
        }
    }

    /// Register `feature` under capability `C`, replacing and returning
    /// any previous implementation.
    pub fn set<C>(&mut self, feature: Arc<C>) -> Option<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.features
            .insert(TypeId::of::<C>(), Box::new(feature))
            .and_then(|old| old.downcast::<Arc<C>>().ok())
            .map(|old| *old)
    }

    /// Look up capability `C` without consulting providers.
    pub fn try_get<C>(&self) -> Option<Arc<C>>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.features
            .get(&TypeId::of::<C>())
            .and_then(|slot| slot.downcast_ref::<Arc<C>>())
            .cloned()
    }

    /// Look up capability `C`, registering the result of `factory` if it
    /// is missing.
    pub fn get_or_add<C>(&mut self, factory: impl FnOnce() -> Arc<C>) -> Arc<C>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        if let Some(existing) = self.try_get::<C>() {
            return existing;
        }
        let feature = factory();
        self.features
            .insert(TypeId::of::<C>(), Box::new(Arc::clone(&feature)));
        feature
    }

    /// Look up capability `C`, asking the default providers when it was
    /// never set. A provided feature is cached for the rest of the
    /// invocation.
    pub fn get<C>(&mut self) -> Result<Arc<C>, WorkerError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        if let Some(existing) = self.try_get::<C>() {
            return Ok(existing);
        }

        let key = TypeId::of::<C>();
        for provider in &self.providers {
            let Some(slot) = provider.try_create(key) else {
                continue;
            };
            match slot.downcast::<Arc<C>>() {
                Ok(feature) => {
                    let feature = *feature;
                    self.features.insert(key, Box::new(Arc::clone(&feature)));
                    return Ok(feature);
                }
                Err(_) => {
                    tracing::warn!(
                        feature = type_name::<C>(),
                        "feature provider returned a value of the wrong type"
                    );
                }
            }
        }

        Err(WorkerError::FeatureNotFound(type_name::<C>().to_string()))
    }

    /// Whether capability `C` has been set (providers are not consulted).
    pub fn contains<C>(&self) -> bool
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.features.contains_key(&TypeId::of::<C>())
    }

    /// Number of features set.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether no feature has been set.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl fmt::Debug for FeatureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureStore")
            .field("features", &self.features.len())
            .field("providers", &self.providers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    struct French;
    impl Greeter for French {
        fn greet(&self) -> String {
            "bonjour".into()
        }
    }

    #[test]
    fn lookup_is_by_capability_not_implementation() {
        let mut store = FeatureStore::new();
        store.set::<dyn Greeter>(Arc::new(English));

        assert_eq!(store.try_get::<dyn Greeter>().unwrap().greet(), "hello");
        assert!(store.try_get::<English>().is_none());
    }

    #[test]
    fn set_replaces_and_returns_previous() {
        let mut store = FeatureStore::new();
        assert!(store.set::<dyn Greeter>(Arc::new(English)).is_none());

        let old = store.set::<dyn Greeter>(Arc::new(French)).unwrap();
        assert_eq!(old.greet(), "hello");
        assert_eq!(store.try_get::<dyn Greeter>().unwrap().greet(), "bonjour");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_or_add_only_runs_factory_once() {
        let mut store = FeatureStore::new();
        let mut calls = 0;
        store.get_or_add::<dyn Greeter>(|| {
            calls += 1;
            Arc::new(English)
        });
        store.get_or_add::<dyn Greeter>(|| {
            calls += 1;
            Arc::new(French)
        });
        assert_eq!(calls, 1);
        assert_eq!(store.try_get::<dyn Greeter>().unwrap().greet(), "hello");
    }

    #[test]
    fn get_falls_back_to_providers_and_caches() {
        let mut store =
            FeatureStore::with_providers(vec![Arc::new(provide::<dyn Greeter>(|| Arc::new(French)))]);
        assert!(!store.contains::<dyn Greeter>());

        let greeter = store.get::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "bonjour");
        assert!(store.contains::<dyn Greeter>());
    }

    #[test]
    fn explicit_feature_wins_over_provider() {
        let mut store =
            FeatureStore::with_providers(vec![Arc::new(provide::<dyn Greeter>(|| Arc::new(French)))]);
        store.set::<dyn Greeter>(Arc::new(English));
        assert_eq!(store.get::<dyn Greeter>().unwrap().greet(), "hello");
    }

    #[test]
    fn missing_feature_is_not_found() {
        let mut store = FeatureStore::new();
        let err = store.get::<dyn Greeter>().err().unwrap();
        assert!(matches!(err, WorkerError::FeatureNotFound(_)));
        assert!(err.to_string().contains("Greeter"));
    }

    #[test]
    fn plain_data_features_work_too() {
        #[derive(Debug, PartialEq)]
        struct Attempt(u32);

        let mut store = FeatureStore::new();
        store.set(Arc::new(Attempt(2)));
        assert_eq!(*store.try_get::<Attempt>().unwrap(), Attempt(2));
    }
}
