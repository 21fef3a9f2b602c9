use alloc::{
    sync::{Arc, Weak},
    vec,
    vec::Vec,
};
use core::marker::PhantomData;
use parking_lot::Mutex;

use super::RegistrationSource;
use crate::{
    activator::{Activator, ActivatorResult},
    any::{Instance, TypeInfo},
    container::{LifetimeScope, ScopeInner},
    context::{downcast_instance, ResolveContext},
    dependency_resolver::DependencyResolver,
    errors::ResolveErrorKind,
    registration::{Registration, RegistrationBuilder},
    registry::ComponentRegistry,
    scope::ScopeId,
    service::Service,
};

/// Untyped state behind [`Lazy`]: the captured scope and the value once created.
pub(crate) struct LazyValue {
    scope: Weak<ScopeInner>,
    scope_id: ScopeId,
    service: Service,
    value: Mutex<Option<Instance>>,
}

impl LazyValue {
    fn get(&self) -> Result<Instance, ResolveErrorKind> {
        if let Some(instance) = self.value.lock().as_ref() {
            return Ok(instance.clone());
        }

        let Some(inner) = self.scope.upgrade() else {
            return Err(ResolveErrorKind::Disposed { scope: self.scope_id });
        };
        let instance = LifetimeScope { inner }.resolve_service(&self.service, Vec::new())?;

        Ok(self.value.lock().get_or_insert(instance).clone())
    }
}

/// Resolves the service on first access, from the scope that resolved the handle.
///
/// Taking `Lazy<T>` instead of `T` breaks constructor cycles. Accessing the value while a
/// shared component it depends on is still being constructed on this thread fails with
/// [`ResolveErrorKind::CircularDependency`].
pub struct Lazy<T> {
    value: Arc<LazyValue>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Send + Sync + 'static> Lazy<T> {
    /// # Errors
    /// - [`ResolveErrorKind::Disposed`] if the captured scope is gone.
    /// - Any error of resolving the service.
    #[inline]
    pub fn get(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.value.get().and_then(downcast_instance)
    }

    #[inline]
    #[must_use]
    pub fn is_value_created(&self) -> bool {
        self.value.value.lock().is_some()
    }

    #[inline]
    pub(crate) fn from_instance(instance: Instance) -> Result<Self, ResolveErrorKind> {
        downcast_instance::<LazyValue>(instance).map(|value| Self {
            value,
            _marker: PhantomData,
        })
    }
}

impl<T: Send + Sync + 'static> DependencyResolver for Lazy<T> {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(context: &ResolveContext<'_>) -> Result<Self, Self::Error> {
        context.resolve_lazy()
    }
}

struct LazyActivator {
    service: Service,
}

impl Activator for LazyActivator {
    #[inline]
    fn limit_type(&self) -> TypeInfo {
        TypeInfo::of::<LazyValue>()
    }

    fn activate(&self, context: &ResolveContext<'_>) -> ActivatorResult {
        let scope = context.scope();
        Ok(Arc::new(LazyValue {
            scope: Arc::downgrade(&scope.inner),
            scope_id: scope.id(),
            service: self.service.clone(),
            value: Mutex::new(None),
        }))
    }
}

/// Answers `Service::Lazy(s)` when `s` is registered.
pub(crate) struct LazySource;

impl RegistrationSource for LazySource {
    fn registrations_for(&self, service: &Service, registry: &ComponentRegistry) -> Vec<Registration> {
        let Service::Lazy(inner) = service else {
            return Vec::new();
        };
        if !registry.is_registered(inner) {
            return Vec::new();
        }

        vec![RegistrationBuilder::<LazyValue>::from_activator(LazyActivator {
            service: (**inner).clone(),
        })
        .with_service(service.clone())
        .as_adapter()
        .build()]
    }
}
