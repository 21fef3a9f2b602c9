use alloc::{borrow::Cow, sync::Arc, vec, vec::Vec};
use core::marker::PhantomData;
use tracing::warn;

#[cfg(feature = "async")]
use alloc::boxed::Box;
#[cfg(feature = "async")]
use core::future::Future;

use super::{
    events::{activated_handler, activating_handler},
    ActivatedEvent, ActivatedHandler, ActivatingEvent, ActivatingHandler, Lifetime, Metadata, Ownership, PreparingEvent,
    PreparingHandler, Registration, RegistrationId, RegistrationOptions, Release, ReleaseKind, Sharing,
};
use crate::{
    activator::{Activator, DelegateActivator, InstantiatorActivator, ProvidedInstanceActivator},
    context::{downcast_instance, ResolveContext},
    dependency_resolver::DependencyResolver,
    disposer::{dispose_factory, Dispose},
    errors::InstantiateErrorKind,
    finalizer::{boxed_finalizer_factory, Finalizer},
    instantiator::Instantiator,
    pipeline::{
        registration_stages::{ActivatedMiddleware, ActivatingMiddleware, ActivatorMiddleware, DisposalTrackingMiddleware, PreparingMiddleware},
        BoxedMiddleware, InsertionMode, ResolveMiddleware, ResolvePipelineBuilder,
    },
    scope::ScopeTag,
    service::{Service, ServiceKey},
};

#[cfg(feature = "async")]
use crate::{
    any::Instance,
    disposer::{async_dispose_factory, AsyncDispose, BoxFuture, ReleaseAction},
};

/// Builds a [`Registration`] for components of type `T`.
///
/// Registrations are transient (a new instance per dependency) unless a sharing lifetime is chosen,
/// and provide the service `T` unless other services are named.
pub struct RegistrationBuilder<T> {
    activator: Arc<dyn Activator>,
    lifetime: Lifetime,
    sharing: Sharing,
    ownership: Ownership,
    services: Vec<Service>,
    default_services: bool,
    metadata: Metadata,
    options: RegistrationOptions,
    release: Option<Release>,
    preparing: Vec<PreparingHandler>,
    activating: Vec<ActivatingHandler>,
    activated: Vec<ActivatedHandler>,
    middlewares: Vec<(BoxedMiddleware, InsertionMode)>,
    _provides: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> RegistrationBuilder<T> {
    /// Component built from an activator provided by the caller, e.g. a registration source.
    #[must_use]
    pub fn from_activator(activator: impl Activator) -> Self {
        Self {
            activator: Arc::new(activator),
            lifetime: Lifetime::CurrentScope,
            sharing: Sharing::None,
            ownership: Ownership::OwnedByLifetimeScope,
            services: vec![Service::of::<T>()],
            default_services: true,
            metadata: Metadata::default(),
            options: RegistrationOptions::default(),
            release: None,
            preparing: Vec::new(),
            activating: Vec::new(),
            activated: Vec::new(),
            middlewares: Vec::new(),
            _provides: PhantomData,
        }
    }

    /// Component built by an instantiator whose arguments are resolved from the container.
    #[inline]
    #[must_use]
    pub fn provide<Inst, Deps>(instantiator: Inst) -> Self
    where
        Inst: Instantiator<Deps, Provides = T> + Send + Sync,
        Deps: DependencyResolver + 'static,
    {
        Self::from_activator(InstantiatorActivator::new(instantiator))
    }

    /// Component built by a factory receiving the resolve context.
    #[inline]
    #[must_use]
    pub fn delegate<F>(factory: F) -> Self
    where
        F: Fn(&ResolveContext<'_>) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self::from_activator(DelegateActivator::new(factory))
    }

    /// Already constructed component, shared from the scope owning the registration.
    #[inline]
    #[must_use]
    pub fn instance(instance: T) -> Self {
        Self::from_activator(ProvidedInstanceActivator::new(instance)).single_instance()
    }

    /// New instance for every request. The default.
    #[inline]
    #[must_use]
    pub fn instance_per_dependency(self) -> Self {
        self.with_lifetime(Lifetime::CurrentScope, Sharing::None)
    }

    /// One instance shared from the scope whose registry layer holds the registration.
    #[inline]
    #[must_use]
    pub fn single_instance(self) -> Self {
        self.with_lifetime(Lifetime::Root, Sharing::Shared)
    }

    /// One instance per lifetime scope.
    #[inline]
    #[must_use]
    pub fn instance_per_lifetime_scope(self) -> Self {
        self.with_lifetime(Lifetime::CurrentScope, Sharing::Shared)
    }

    /// One instance per nearest enclosing scope tagged with one of the tags.
    #[must_use]
    pub fn instance_per_matching_lifetime_scope<I>(self, tags: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ScopeTag>,
    {
        let tags = tags.into_iter().map(Into::into).collect();
        self.with_lifetime(Lifetime::MatchingScope(tags), Sharing::Shared)
    }

    #[inline]
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Lifetime, sharing: Sharing) -> Self {
        self.lifetime = lifetime;
        self.sharing = sharing;
        self
    }

    /// The scope never disposes or releases instances through [`Self::disposable`].
    #[inline]
    #[must_use]
    pub fn externally_owned(mut self) -> Self {
        self.ownership = Ownership::ExternallyOwned;
        self
    }

    #[inline]
    #[must_use]
    pub fn owned_by_lifetime_scope(mut self) -> Self {
        self.ownership = Ownership::OwnedByLifetimeScope;
        self
    }

    /// Adds a service to provide.
    /// The first explicit service replaces the default `T` service; use [`Self::as_self`] to keep it.
    ///
    /// The activator must produce instances of the service's type, wrapper services excepted.
    #[must_use]
    pub fn with_service(mut self, service: Service) -> Self {
        if self.default_services {
            self.services.clear();
            self.default_services = false;
        }
        if !self.services.contains(&service) {
            self.services.push(service);
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn as_self(self) -> Self {
        self.with_service(Service::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn keyed(self, key: impl Into<ServiceKey>) -> Self {
        self.with_service(Service::keyed::<T>(key))
    }

    #[inline]
    #[must_use]
    pub fn named(self, name: impl Into<Cow<'static, str>>) -> Self {
        let name: Cow<'static, str> = name.into();
        self.with_service(Service::keyed::<T>(ServiceKey::new(name)))
    }

    #[inline]
    #[must_use]
    pub fn with_metadata<V: Send + Sync + 'static>(mut self, key: impl Into<Cow<'static, str>>, value: V) -> Self {
        self.metadata.insert(key.into(), Arc::new(value));
        self
    }

    /// Earlier registrations of the same services stay the default.
    #[inline]
    #[must_use]
    pub fn preserve_existing_defaults(mut self) -> Self {
        self.options.preserve_existing_defaults = true;
        self
    }

    /// Resolve once when the container is built.
    #[inline]
    #[must_use]
    pub fn auto_activate(mut self) -> Self {
        self.options.auto_activate = true;
        self
    }

    /// Marks a registration produced by a source adapting other registrations.
    #[inline]
    #[must_use]
    pub fn as_adapter(mut self) -> Self {
        self.options.adapter = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn on_preparing<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut PreparingEvent<'_>) + Send + Sync + 'static,
    {
        self.preparing.push(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn on_activating<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut ActivatingEvent<'_, T>) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.activating.push(activating_handler(move |context, service, instance| {
            handler(&mut ActivatingEvent {
                context,
                service,
                instance,
                _marker: PhantomData,
            })
        }));
        self
    }

    #[must_use]
    pub fn on_activated<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ActivatedEvent<'_, T>) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.activated.push(activated_handler(move |context, service, instance| {
            let instance = downcast_instance::<T>(instance.clone())?;
            handler(&ActivatedEvent {
                context,
                service,
                instance,
            })
        }));
        self
    }

    /// Runs the finalizer exactly once when the owning scope ends, even for externally owned components.
    /// Replaces the component's own disposal.
    #[inline]
    #[must_use]
    pub fn on_release<Fin: Finalizer<T>>(mut self, finalizer: Fin) -> Self {
        self.release = Some(Release {
            kind: ReleaseKind::OnRelease,
            factory: boxed_finalizer_factory(finalizer),
        });
        self
    }

    /// Disposes instances with their owning scope, unless externally owned.
    #[inline]
    #[must_use]
    pub fn disposable(mut self) -> Self
    where
        T: Dispose,
    {
        if self.release.is_none() {
            self.release = Some(Release {
                kind: ReleaseKind::Dispose,
                factory: dispose_factory::<T>(),
            });
        }
        self
    }

    #[cfg(feature = "async")]
    #[must_use]
    pub fn on_release_async<F, Fut>(mut self, release: F) -> Self
    where
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let release = Arc::new(release);
        self.release = Some(Release {
            kind: ReleaseKind::OnRelease,
            factory: Arc::new(move |instance: Instance| {
                let release = release.clone();
                ReleaseAction::Async(Box::new(move || -> BoxFuture {
                    Box::pin(async move {
                        let dependency = downcast_instance::<T>(instance)?;
                        release(dependency).await
                    })
                }))
            }),
        });
        self
    }

    #[cfg(feature = "async")]
    #[inline]
    #[must_use]
    pub fn async_disposable(mut self) -> Self
    where
        T: AsyncDispose,
    {
        if self.release.is_none() {
            self.release = Some(Release {
                kind: ReleaseKind::Dispose,
                factory: async_dispose_factory::<T>(),
            });
        }
        self
    }

    /// Adds a stage to this registration's own pipeline.
    #[inline]
    #[must_use]
    pub fn use_middleware(mut self, middleware: impl ResolveMiddleware, mode: InsertionMode) -> Self {
        if middleware.phase().is_service_phase() {
            warn!(
                middleware = middleware.name(),
                "Service phase middleware added to a registration pipeline, it runs after every service stage"
            );
        }
        self.middlewares.push((Arc::new(middleware), mode));
        self
    }

    #[must_use]
    pub fn build(self) -> Registration {
        let mut pipeline = ResolvePipelineBuilder::new();
        if !self.preparing.is_empty() {
            pipeline.use_boxed(Arc::new(PreparingMiddleware::new(self.preparing)), InsertionMode::EndOfPhase);
        }
        if !self.activated.is_empty() {
            pipeline.use_boxed(Arc::new(ActivatedMiddleware::new(self.activated)), InsertionMode::EndOfPhase);
        }
        pipeline.use_boxed(Arc::new(DisposalTrackingMiddleware), InsertionMode::EndOfPhase);
        if !self.activating.is_empty() {
            pipeline.use_boxed(Arc::new(ActivatingMiddleware::new(self.activating)), InsertionMode::EndOfPhase);
        }
        for (middleware, mode) in self.middlewares {
            pipeline.use_boxed(middleware, mode);
        }
        pipeline.push_terminal(Arc::new(ActivatorMiddleware));

        Registration {
            id: RegistrationId::next(),
            activator: self.activator,
            lifetime: self.lifetime,
            sharing: self.sharing,
            ownership: self.ownership,
            services: self.services,
            metadata: self.metadata,
            options: self.options,
            release: self.release,
            pipeline: pipeline.build(),
        }
    }
}

impl<T: Send + Sync + 'static> From<RegistrationBuilder<T>> for Registration {
    #[inline]
    fn from(builder: RegistrationBuilder<T>) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::RegistrationBuilder;
    use crate::{
        pipeline::PipelinePhase::*,
        registration::{Lifetime, Ownership, Sharing},
        service::Service,
        InstantiateErrorKind, ScopeTag,
    };

    use alloc::{sync::Arc, vec};

    struct Logger;

    #[test]
    fn test_defaults() {
        let registration = RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Logger)).build();

        assert_eq!(registration.services(), &[Service::of::<Logger>()]);
        assert_eq!(*registration.lifetime(), Lifetime::CurrentScope);
        assert_eq!(registration.sharing(), Sharing::None);
        assert_eq!(registration.ownership(), Ownership::OwnedByLifetimeScope);
        assert!(!registration.tracks_release());
        assert_eq!(registration.pipeline().phases(), vec![Activation, Activation]);
    }

    #[test]
    fn test_explicit_services_replace_default() {
        let registration = RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Logger))
            .named("primary")
            .keyed(1u8)
            .build();
        assert_eq!(
            registration.services(),
            &[Service::keyed::<Logger>("primary"), Service::keyed::<Logger>(1u8)]
        );

        let registration = RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Logger))
            .named("primary")
            .as_self()
            .build();
        assert_eq!(
            registration.services(),
            &[Service::keyed::<Logger>("primary"), Service::of::<Logger>()]
        );
    }

    #[test]
    fn test_lifetimes() {
        let registration = RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Logger))
            .instance_per_matching_lifetime_scope(["request", "job"])
            .build();
        assert_eq!(
            *registration.lifetime(),
            Lifetime::MatchingScope(vec![ScopeTag::from("request"), ScopeTag::from("job")])
        );
        assert_eq!(registration.sharing(), Sharing::Shared);

        let registration = RegistrationBuilder::instance(Logger).build();
        assert_eq!(*registration.lifetime(), Lifetime::Root);
        assert!(registration.activator().provided_instance().is_some());
    }

    #[test]
    fn test_release_tracking() {
        let registration = RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Logger))
            .externally_owned()
            .on_release(|_: Arc<Logger>| {})
            .build();
        assert!(registration.tracks_release());
        assert!(!registration.released_eagerly());

        let registration = RegistrationBuilder::instance(Logger).on_release(|_: Arc<Logger>| {}).build();
        assert!(registration.released_eagerly());
    }

    #[test]
    fn test_hooks_build_pipeline() {
        let registration = RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Logger))
            .on_preparing(|_| {})
            .on_activating(|_| Ok(()))
            .on_activated(|_| Ok(()))
            .build();

        assert_eq!(
            registration.pipeline().phases(),
            vec![ParameterSelection, Activation, Activation, Activation, Activation]
        );
    }

    #[test]
    fn test_metadata() {
        let registration = RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Logger))
            .with_metadata("priority", 10u8)
            .build();

        assert_eq!(registration.metadata().get::<u8>("priority").as_deref(), Some(&10));
        assert!(registration.metadata().get::<u16>("priority").is_none());
        assert!(!registration.metadata().contains_key("missing"));
    }
}
