use alloc::{sync::Arc, vec::Vec};

use crate::{
    any::{Instance, TypeInfo},
    container::LifetimeScope,
    errors::ResolveErrorKind,
    operation::ResolveOperation,
    parameter::{find_named, find_typed, Parameter},
    service::{Service, ServiceKey},
    sources::{Lazy, ServiceCollection},
};

/// Handle given to factories and hooks for resolving further dependencies.
///
/// Every request made through it joins the operation that is already in progress,
/// so circular dependencies are detected across factory boundaries.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    operation: &'a ResolveOperation,
    scope: &'a LifetimeScope,
    parameters: &'a [Parameter],
}

impl<'a> ResolveContext<'a> {
    #[inline]
    #[must_use]
    pub(crate) const fn new(operation: &'a ResolveOperation, scope: &'a LifetimeScope, parameters: &'a [Parameter]) -> Self {
        Self {
            operation,
            scope,
            parameters,
        }
    }

    /// Scope that activates the current component
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &'a LifetimeScope {
        self.scope
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &'a [Parameter] {
        self.parameters
    }

    #[inline]
    #[must_use]
    pub fn parameter<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        find_typed(self.parameters)
    }

    #[inline]
    #[must_use]
    pub fn named_parameter<T: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<T>> {
        find_named(self.parameters, name)
    }

    /// # Errors
    /// Returns the error of the nested request unchanged.
    #[inline]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_typed(&Service::of::<T>(), Vec::new())
    }

    /// # Errors
    /// Returns the error of the nested request unchanged.
    #[inline]
    pub fn resolve_keyed<T: Send + Sync + 'static>(&self, key: impl Into<ServiceKey>) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_typed(&Service::keyed::<T>(key), Vec::new())
    }

    /// # Errors
    /// Returns the error of the nested request unchanged.
    #[inline]
    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_keyed(name)
    }

    /// # Errors
    /// Returns the error of the nested request unchanged.
    #[inline]
    pub fn resolve_with_parameters<T: Send + Sync + 'static>(&self, parameters: Vec<Parameter>) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_typed(&Service::of::<T>(), parameters)
    }

    /// # Errors
    /// Returns the error of the nested request unchanged.
    #[inline]
    pub fn resolve_service(&self, service: &Service, parameters: Vec<Parameter>) -> Result<Instance, ResolveErrorKind> {
        self.operation.resolve_service(self.scope, service, parameters)
    }

    /// Resolves the service if anything is registered for it.
    ///
    /// # Errors
    /// Returns errors other than a missing registration.
    pub fn try_resolve<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        let service = Service::of::<T>();
        if !self.scope.registry().is_registered(&service) {
            return Ok(None);
        }
        self.resolve_typed(&service, Vec::new()).map(Some)
    }

    /// Resolves every registration of the service, in registration order.
    ///
    /// # Errors
    /// Returns the first error of an element's request.
    pub fn resolve_all<T: Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let collection = self.resolve_typed::<ServiceCollection>(&Service::collection_of(Service::of::<T>()), Vec::new())?;
        collection.iter().cloned().map(downcast_instance).collect()
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::NoRegistration`] if the wrapped service isn't registered.
    #[inline]
    pub fn resolve_lazy<T: Send + Sync + 'static>(&self) -> Result<Lazy<T>, ResolveErrorKind> {
        self.resolve_service(&Service::lazy_of(Service::of::<T>()), Vec::new())
            .and_then(Lazy::from_instance)
    }

    #[inline]
    #[must_use]
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.scope.registry().is_registered(&Service::of::<T>())
    }

    /// Resolves every distinct registration of the service within the current operation.
    pub(crate) fn resolve_each(&self, service: &Service) -> Result<Vec<Instance>, ResolveErrorKind> {
        let mut seen = Vec::new();
        let mut instances = Vec::new();
        for registration in self.scope.registry().registrations_for(service) {
            if seen.contains(&registration.id()) {
                continue;
            }
            seen.push(registration.id());
            instances.push(
                self.operation
                    .execute_request(self.scope, service.clone(), registration, Vec::new())?,
            );
        }
        Ok(instances)
    }

    #[inline]
    fn resolve_typed<T: Send + Sync + 'static>(&self, service: &Service, parameters: Vec<Parameter>) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_service(service, parameters).and_then(downcast_instance)
    }
}

pub(crate) fn downcast_instance<T: Send + Sync + 'static>(instance: Instance) -> Result<Arc<T>, ResolveErrorKind> {
    instance.downcast::<T>().map_err(|incorrect_type| ResolveErrorKind::IncorrectType {
        expected: TypeInfo::of::<T>(),
        actual: (*incorrect_type).type_id(),
    })
}
