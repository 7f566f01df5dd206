//! Component lookup: the seam to an external dependency-injection container.
//!
//! The core never instantiates collaborators through reflection. A descriptor
//! names a component either by *type* ([`ComponentType`], the "class
//! identity") or by *name* (fallbacks). Resolution asks the
//! [`ComponentProvider`] first and falls back to `Default` construction for
//! typed components.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Externally managed singletons.
pub trait ComponentProvider: Send + Sync {
    /// Singleton registered for a concrete type.
    fn by_type(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>>;

    /// Component registered under a name. The stored value is whatever was
    /// registered, e.g. an `Arc<dyn MyApi>`.
    fn by_name(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// Typed lookup of a concrete singleton.
pub fn lookup<T: Any + Send + Sync>(provider: &dyn ComponentProvider) -> Option<Arc<T>> {
    provider
        .by_type(TypeId::of::<T>())
        .and_then(|any| any.downcast::<T>().ok())
}

/// Outcome of a named lookup.
#[derive(Debug)]
pub enum NamedLookup<T> {
    Found(T),
    Missing,
    /// Something is registered under the name, but not as `T`.
    WrongType,
}

/// Named lookup of a component registered as `T` (typically `Arc<dyn Trait>`).
pub fn lookup_named<T>(provider: &dyn ComponentProvider, name: &str) -> NamedLookup<T>
where
    T: Any + Clone + Send + Sync,
{
    match provider.by_name(name) {
        None => NamedLookup::Missing,
        Some(any) => match any.downcast_ref::<T>() {
            Some(v) => NamedLookup::Found(v.clone()),
            None => NamedLookup::WrongType,
        },
    }
}

/// Simple in-process component registry.
#[derive(Default)]
pub struct ComponentRegistry {
    typed: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    named: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a singleton for its concrete type.
    pub fn register<T: Any + Send + Sync>(&self, component: Arc<T>) -> &Self {
        self.typed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeId::of::<T>(), component);
        self
    }

    /// Register a named component. Fallbacks are registered as `Arc<dyn Api>`,
    /// fallback factories as `Arc<dyn FallbackFactory<dyn Api>>`.
    pub fn register_named<T: Any + Send + Sync>(&self, name: impl Into<String>, component: T) -> &Self {
        self.named
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(component));
        self
    }

    pub fn len(&self) -> usize {
        let typed = self.typed.read().unwrap_or_else(PoisonError::into_inner).len();
        let named = self.named.read().unwrap_or_else(PoisonError::into_inner).len();
        typed + named
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ComponentProvider for ComponentRegistry {
    fn by_type(&self, type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        self.typed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_id)
            .cloned()
    }

    fn by_name(&self, name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        self.named
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

/// Provider with nothing registered; every typed component is default-constructed.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyProvider;

impl ComponentProvider for EmptyProvider {
    fn by_type(&self, _type_id: TypeId) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }

    fn by_name(&self, _name: &str) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }
}

/// Type identity of a component implementing the trait object `F`.
///
/// Carries the resolution recipe: provider singleton first, `Default` otherwise.
pub struct ComponentType<F: ?Sized + 'static> {
    type_id: TypeId,
    name: &'static str,
    resolve: fn(&dyn ComponentProvider) -> Arc<F>,
}

impl<F: ?Sized + 'static> ComponentType<F> {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Short type name without the module path.
    pub fn simple_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }

    pub fn resolve(&self, provider: &dyn ComponentProvider) -> Arc<F> {
        (self.resolve)(provider)
    }
}

impl<F: ?Sized + 'static> Clone for ComponentType<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F: ?Sized + 'static> Copy for ComponentType<F> {}

impl<F: ?Sized + 'static> PartialEq for ComponentType<F> {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl<F: ?Sized + 'static> Eq for ComponentType<F> {}

impl<F: ?Sized + 'static> fmt::Debug for ComponentType<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentType").field(&self.name).finish()
    }
}

/// Implements `ComponentType::<dyn Trait>::of::<T>()` for a component trait.
macro_rules! component_type {
    ($trait_:path) => {
        impl $crate::component::ComponentType<dyn $trait_> {
            pub fn of<T>() -> Self
            where
                T: $trait_ + Default + Send + Sync + 'static,
            {
                fn resolve<T>(
                    provider: &dyn $crate::component::ComponentProvider,
                ) -> std::sync::Arc<dyn $trait_>
                where
                    T: $trait_ + Default + Send + Sync + 'static,
                {
                    match $crate::component::lookup::<T>(provider) {
                        Some(managed) => managed,
                        None => std::sync::Arc::new(T::default()),
                    }
                }
                $crate::component::ComponentType::from_parts(
                    std::any::TypeId::of::<T>(),
                    std::any::type_name::<T>(),
                    resolve::<T>,
                )
            }
        }
    };
}
pub(crate) use component_type;

impl<F: ?Sized + 'static> ComponentType<F> {
    #[doc(hidden)]
    pub(crate) fn from_parts(
        type_id: TypeId,
        name: &'static str,
        resolve: fn(&dyn ComponentProvider) -> Arc<F>,
    ) -> Self {
        Self {
            type_id,
            name,
            resolve,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    #[derive(Default)]
    struct Plain;
    impl Greeter for Plain {
        fn greet(&self) -> String {
            "default".into()
        }
    }

    struct Managed(&'static str);
    impl Default for Managed {
        fn default() -> Self {
            Managed("constructed")
        }
    }
    impl Greeter for Managed {
        fn greet(&self) -> String {
            self.0.into()
        }
    }

    component_type!(Greeter);

    #[test]
    fn test_typed_component_prefers_provider_singleton() {
        let registry = ComponentRegistry::new();
        registry.register(Arc::new(Managed("managed")));

        let ty = ComponentType::<dyn Greeter>::of::<Managed>();
        assert_eq!(ty.resolve(&registry).greet(), "managed");
        assert_eq!(ty.resolve(&EmptyProvider).greet(), "constructed");
        assert_eq!(ty.simple_name(), "Managed");
    }

    #[test]
    fn test_component_type_identity() {
        let a = ComponentType::<dyn Greeter>::of::<Plain>();
        let b = ComponentType::<dyn Greeter>::of::<Plain>();
        let c = ComponentType::<dyn Greeter>::of::<Managed>();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_named_lookup_checks_type() {
        let registry = ComponentRegistry::new();
        let greeter: Arc<dyn Greeter> = Arc::new(Plain);
        registry.register_named("greeter", greeter);
        registry.register_named("number", 42_u32);

        assert!(matches!(
            lookup_named::<Arc<dyn Greeter>>(&registry, "greeter"),
            NamedLookup::Found(_)
        ));
        assert!(matches!(
            lookup_named::<Arc<dyn Greeter>>(&registry, "number"),
            NamedLookup::WrongType
        ));
        assert!(matches!(
            lookup_named::<Arc<dyn Greeter>>(&registry, "absent"),
            NamedLookup::Missing
        ));
    }

    #[test]
    fn test_registration_survives_poisoned_lock() {
        let registry = Arc::new(ComponentRegistry::new());
        let poisoner = Arc::clone(&registry);
        let _ = std::thread::spawn(move || {
            let _held = poisoner.named.write().unwrap();
            panic!("poison the named map");
        })
        .join();
        assert!(registry.named.is_poisoned());

        registry.register_named("late", 7u32);
        registry.register(Arc::new(Plain));
        assert_eq!(registry.len(), 2);
        assert!(registry.by_name("late").is_some());
    }
}
