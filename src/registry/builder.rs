use alloc::{sync::Arc, vec::Vec};

use super::{ComponentRegistry, Decorator, RegisteredHandler, ServiceMiddleware};
use crate::{
    context::ResolveContext,
    errors::InstantiateErrorKind,
    pipeline::{InsertionMode, ResolveMiddleware},
    registration::Registration,
    service::Service,
    sources::RegistrationSource,
};

/// Collects registrations, sources, decorators and service middleware for a container or a child scope.
#[derive(Default)]
pub struct RegistryBuilder {
    registrations: Vec<Registration>,
    sources: Vec<Arc<dyn RegistrationSource>>,
    decorators: Vec<Decorator>,
    service_middlewares: Vec<ServiceMiddleware>,
    registered_handlers: Vec<RegisteredHandler>,
}

impl RegistryBuilder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn register(mut self, registration: impl Into<Registration>) -> Self {
        self.add_registration(registration);
        self
    }

    #[inline]
    #[must_use]
    pub fn source(mut self, source: impl RegistrationSource) -> Self {
        self.add_source(source);
        self
    }

    /// Registers a decorator for every instance of `T` resolved through a typed or keyed service.
    /// Decorators apply in registration order, after sharing, so a shared instance is decorated once.
    #[inline]
    #[must_use]
    pub fn decorate<T, F>(mut self, decorator: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolveContext<'_>, Arc<T>) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.add_decorator(decorator);
        self
    }

    #[inline]
    pub fn add_registration(&mut self, registration: impl Into<Registration>) -> &mut Self {
        self.registrations.push(registration.into());
        self
    }

    #[inline]
    pub fn add_source(&mut self, source: impl RegistrationSource) -> &mut Self {
        self.sources.push(Arc::new(source));
        self
    }

    #[inline]
    pub fn add_decorator<T, F>(&mut self, decorator: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolveContext<'_>, Arc<T>) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.decorators.push(Decorator::new(decorator));
        self
    }

    /// Adds a stage to the service pipeline of one service.
    #[inline]
    pub fn use_service_middleware(&mut self, service: Service, middleware: impl ResolveMiddleware, mode: InsertionMode) -> &mut Self {
        self.service_middlewares.push(ServiceMiddleware {
            service,
            middleware: Arc::new(middleware),
            mode,
        });
        self
    }

    /// Runs the handler for each registration as it is added, including the ones from this builder.
    #[inline]
    pub fn on_registered<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Registration) + Send + Sync + 'static,
    {
        self.registered_handlers.push(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn build(self) -> ComponentRegistry {
        let registry = ComponentRegistry::new();
        self.apply(&registry);
        registry
    }

    #[must_use]
    pub(crate) fn build_layered(self, parent: Arc<ComponentRegistry>) -> ComponentRegistry {
        let registry = ComponentRegistry::layered(parent);
        self.apply(&registry);
        registry
    }

    fn apply(self, registry: &ComponentRegistry) {
        registry.registered_handlers.write().extend(self.registered_handlers);
        registry.sources.write().extend(self.sources);
        registry.decorators.write().extend(self.decorators);
        registry.service_middlewares.write().extend(self.service_middlewares);
        for registration in self.registrations {
            registry.register(registration);
        }
    }
}
