mod builder;
mod decorator;

use alloc::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
    vec::Vec,
};
use core::{
    cell::RefCell,
    sync::atomic::{AtomicU64, Ordering},
};
use parking_lot::{ReentrantMutex, RwLock};
use tracing::debug;

use crate::{
    any::TypeInfo,
    pipeline::{
        service_stages::{CycleDetectionMiddleware, DecorationMiddleware, ScopeSelectionMiddleware, SharingMiddleware},
        BoxedMiddleware, InsertionMode, ResolveMiddleware, ResolvePipeline, ResolvePipelineBuilder,
    },
    registration::{Registration, RegistrationId},
    service::Service,
    sources::{CollectionSource, LazySource, RegistrationSource},
};

pub use builder::RegistryBuilder;
pub(crate) use decorator::Decorator;

pub(crate) type RegisteredHandler = Arc<dyn Fn(&Registration) + Send + Sync>;

#[derive(Clone)]
struct ServiceMiddleware {
    service: Service,
    middleware: BoxedMiddleware,
    mode: InsertionMode,
}

/// Resolved view of one service, valid while the registry generation is unchanged.
struct ServiceInfo {
    generation: u64,
    implementations: Vec<Arc<Registration>>,
    default: Option<Arc<Registration>>,
    pipeline: ResolvePipeline,
}

/// Searchable set of registrations plus the sources that synthesize more on demand.
///
/// A child scope configured with extra registrations gets a layered registry:
/// it sees the parent's registrations first and its own after them, without ever mutating the parent.
pub struct ComponentRegistry {
    parent: Option<Arc<ComponentRegistry>>,
    generation: AtomicU64,
    registrations: RwLock<Vec<Arc<Registration>>>,
    index: RwLock<BTreeMap<Service, Vec<Arc<Registration>>>>,
    owned: RwLock<BTreeSet<RegistrationId>>,
    sources: RwLock<Vec<Arc<dyn RegistrationSource>>>,
    synthesized: RwLock<BTreeMap<Service, Vec<Arc<Registration>>>>,
    decorators: RwLock<Vec<Decorator>>,
    service_middlewares: RwLock<Vec<ServiceMiddleware>>,
    registered_handlers: RwLock<Vec<RegisteredHandler>>,
    initialized: RwLock<BTreeMap<Service, Arc<ServiceInfo>>>,
    initialization: ReentrantMutex<RefCell<BTreeSet<Service>>>,
    default_pipeline: ResolvePipeline,
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRegistry {
    /// Root registry with the built-in collection and lazy sources.
    #[must_use]
    pub fn new() -> Self {
        let registry = Self::empty(None);
        registry.sources.write().extend([
            Arc::new(CollectionSource) as Arc<dyn RegistrationSource>,
            Arc::new(LazySource) as Arc<dyn RegistrationSource>,
        ]);
        registry
    }

    /// Child layer over `parent`, starting with a copy of the parent's sources.
    #[must_use]
    pub(crate) fn layered(parent: Arc<ComponentRegistry>) -> Self {
        let sources = parent.sources.read().clone();
        let registry = Self::empty(Some(parent));
        *registry.sources.write() = sources;
        registry
    }

    fn empty(parent: Option<Arc<ComponentRegistry>>) -> Self {
        let mut default_pipeline = ResolvePipelineBuilder::new();
        default_pipeline
            .use_middleware(ScopeSelectionMiddleware, InsertionMode::EndOfPhase)
            .use_middleware(CycleDetectionMiddleware, InsertionMode::EndOfPhase)
            .use_middleware(SharingMiddleware, InsertionMode::EndOfPhase)
            .use_middleware(DecorationMiddleware, InsertionMode::EndOfPhase);

        Self {
            parent,
            generation: AtomicU64::new(0),
            registrations: RwLock::new(Vec::new()),
            index: RwLock::new(BTreeMap::new()),
            owned: RwLock::new(BTreeSet::new()),
            sources: RwLock::new(Vec::new()),
            synthesized: RwLock::new(BTreeMap::new()),
            decorators: RwLock::new(Vec::new()),
            service_middlewares: RwLock::new(Vec::new()),
            registered_handlers: RwLock::new(Vec::new()),
            initialized: RwLock::new(BTreeMap::new()),
            initialization: ReentrantMutex::new(RefCell::new(BTreeSet::new())),
            default_pipeline: default_pipeline.build(),
        }
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&Arc<ComponentRegistry>> {
        self.parent.as_ref()
    }

    /// Adds the registration. Earlier registrations of the same services are kept;
    /// the new one becomes the default unless it preserves existing defaults.
    /// Registered handlers run before this returns.
    pub fn register(&self, registration: impl Into<Registration>) -> Arc<Registration> {
        let registration = Arc::new(registration.into());
        {
            let mut index = self.index.write();
            for service in registration.services() {
                index.entry(service.clone()).or_default().push(registration.clone());
            }
        }
        self.registrations.write().push(registration.clone());
        self.owned.write().insert(registration.id());
        self.bump_generation();

        debug!(registration = %registration, services = registration.services().len(), "Registered");

        let handlers = self.registered_handlers.read().clone();
        for handler in handlers {
            handler(&registration);
        }
        registration
    }

    /// Appends a source, asked after every earlier one.
    pub fn add_source(&self, source: impl RegistrationSource) {
        self.sources.write().push(Arc::new(source));
        self.bump_generation();
    }

    /// Runs the handler for every registration added afterwards.
    pub fn on_registered<F>(&self, handler: F)
    where
        F: Fn(&Registration) + Send + Sync + 'static,
    {
        self.registered_handlers.write().push(Arc::new(handler));
    }

    pub fn use_service_middleware(&self, service: Service, middleware: impl ResolveMiddleware, mode: InsertionMode) {
        self.add_service_middleware(service, Arc::new(middleware), mode);
    }

    pub(crate) fn add_service_middleware(&self, service: Service, middleware: BoxedMiddleware, mode: InsertionMode) {
        self.service_middlewares.write().push(ServiceMiddleware {
            service,
            middleware,
            mode,
        });
        self.bump_generation();
    }

    pub(crate) fn add_decorator(&self, decorator: Decorator) {
        self.decorators.write().push(decorator);
        self.bump_generation();
    }

    /// Default registration of the service: the newest one not preserving existing defaults.
    #[inline]
    #[must_use]
    pub fn try_get_registration(&self, service: &Service) -> Option<Arc<Registration>> {
        self.service_info(service).default.clone()
    }

    /// Every registration of the service, oldest first.
    #[inline]
    #[must_use]
    pub fn registrations_for(&self, service: &Service) -> Vec<Arc<Registration>> {
        self.service_info(service).implementations.clone()
    }

    #[inline]
    #[must_use]
    pub fn is_registered(&self, service: &Service) -> bool {
        !self.service_info(service).implementations.is_empty()
    }

    /// Registrations added to this layer, oldest first.
    #[inline]
    #[must_use]
    pub fn registrations(&self) -> Vec<Arc<Registration>> {
        self.registrations.read().clone()
    }

    #[inline]
    #[must_use]
    pub fn service_pipeline(&self, service: &Service) -> ResolvePipeline {
        self.service_info(service).pipeline.clone()
    }

    /// Decorators for the type, outer layers first.
    #[must_use]
    pub(crate) fn decorators_for(&self, type_info: TypeInfo) -> Vec<Decorator> {
        let mut decorators = match &self.parent {
            Some(parent) => parent.decorators_for(type_info),
            None => Vec::new(),
        };
        decorators.extend(
            self.decorators
                .read()
                .iter()
                .filter(|decorator| decorator.type_info() == type_info)
                .cloned(),
        );
        decorators
    }

    /// Whether the registration was added to, or synthesized by, this layer.
    #[inline]
    #[must_use]
    pub(crate) fn owns(&self, registration: RegistrationId) -> bool {
        self.owned.read().contains(&registration)
    }

    #[must_use]
    pub(crate) fn auto_activated(&self) -> Vec<Arc<Registration>> {
        self.registrations
            .read()
            .iter()
            .filter(|registration| registration.options().auto_activate())
            .cloned()
            .collect()
    }

    #[inline]
    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    fn generation(&self) -> u64 {
        let own = self.generation.load(Ordering::Acquire);
        match &self.parent {
            Some(parent) => own + parent.generation(),
            None => own,
        }
    }

    /// Registrations a child layer inherits: everything except adapted ones, which the child re-adapts.
    fn inherited_for(&self, service: &Service) -> Vec<Arc<Registration>> {
        self.registrations_for(service)
            .into_iter()
            .filter(|registration| !registration.options().adapter())
            .collect()
    }

    fn static_registrations(&self, service: &Service) -> Vec<Arc<Registration>> {
        let mut registrations = match &self.parent {
            Some(parent) => parent.inherited_for(service),
            None => Vec::new(),
        };
        if let Some(local) = self.index.read().get(service) {
            registrations.extend(local.iter().cloned());
        }
        registrations
    }

    fn service_info(&self, service: &Service) -> Arc<ServiceInfo> {
        let generation = self.generation();
        if let Some(info) = self.cached_info(service, generation) {
            return info;
        }

        let guard = self.initialization.lock();
        if guard.borrow().contains(service) {
            // Queried by a source while initializing this very service: static registrations only
            debug!(%service, "Recursive source query");
            return Arc::new(self.build_info(service, generation, self.static_registrations(service)));
        }
        if let Some(info) = self.cached_info(service, generation) {
            return info;
        }

        guard.borrow_mut().insert(service.clone());
        let implementations = self.initialize(service);
        guard.borrow_mut().remove(service);

        let info = Arc::new(self.build_info(service, generation, implementations));
        self.initialized.write().insert(service.clone(), info.clone());
        info
    }

    fn cached_info(&self, service: &Service, generation: u64) -> Option<Arc<ServiceInfo>> {
        self.initialized
            .read()
            .get(service)
            .filter(|info| info.generation == generation)
            .cloned()
    }

    /// Static registrations, or else what the sources produce, asked in registration order.
    /// Synthesized registrations are kept, so sources run at most once per service.
    fn initialize(&self, service: &Service) -> Vec<Arc<Registration>> {
        let registrations = self.static_registrations(service);
        if !registrations.is_empty() {
            return registrations;
        }
        if let Some(synthesized) = self.synthesized.read().get(service) {
            return synthesized.clone();
        }

        let sources = self.sources.read().clone();
        let mut synthesized = Vec::new();
        for source in sources {
            for registration in source.registrations_for(service, self) {
                let registration = Arc::new(registration);
                self.owned.write().insert(registration.id());
                synthesized.push(registration);
            }
        }

        if !synthesized.is_empty() {
            debug!(%service, count = synthesized.len(), "Synthesized by sources");
            self.synthesized.write().insert(service.clone(), synthesized.clone());
        }
        synthesized
    }

    fn build_info(&self, service: &Service, generation: u64, implementations: Vec<Arc<Registration>>) -> ServiceInfo {
        let default = implementations
            .iter()
            .rev()
            .find(|registration| !registration.options().preserve_existing_defaults())
            .or_else(|| implementations.first())
            .cloned();

        ServiceInfo {
            generation,
            implementations,
            default,
            pipeline: self.pipeline_for(service),
        }
    }

    fn service_middlewares_for(&self, service: &Service) -> Vec<ServiceMiddleware> {
        let mut middlewares = match &self.parent {
            Some(parent) => parent.service_middlewares_for(service),
            None => Vec::new(),
        };
        middlewares.extend(
            self.service_middlewares
                .read()
                .iter()
                .filter(|middleware| middleware.service == *service)
                .cloned(),
        );
        middlewares
    }

    fn pipeline_for(&self, service: &Service) -> ResolvePipeline {
        let middlewares = self.service_middlewares_for(service);
        if middlewares.is_empty() {
            return self.default_pipeline.clone();
        }

        let mut pipeline = ResolvePipelineBuilder::new();
        pipeline.extend(&self.default_pipeline);
        for ServiceMiddleware { middleware, mode, .. } in middlewares {
            pipeline.use_boxed(middleware, mode);
        }
        pipeline.build()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    #[allow(unused_imports)]
    use std::{format, string::{String, ToString}};

    use super::ComponentRegistry;
    use crate::{
        pipeline::{middleware_fn, InsertionMode, Next, PipelinePhase, ResolveRequest},
        registration::{Registration, RegistrationBuilder},
        service::Service,
        sources::RegistrationSource,
        InstantiateErrorKind,
    };

    use alloc::{sync::Arc, vec, vec::Vec};
    use core::sync::atomic::{AtomicU8, Ordering};
    use tracing_test::traced_test;

    struct Logger(&'static str);

    fn logger(name: &'static str) -> RegistrationBuilder<Logger> {
        RegistrationBuilder::provide(move || Ok::<_, InstantiateErrorKind>(Logger(name)))
    }

    #[test]
    #[traced_test]
    fn test_last_registration_wins() {
        let registry = ComponentRegistry::new();
        let first = registry.register(logger("first"));
        let second = registry.register(logger("second"));

        let service = Service::of::<Logger>();
        assert_eq!(registry.try_get_registration(&service).unwrap().id(), second.id());
        assert_eq!(
            registry.registrations_for(&service).iter().map(|r| r.id()).collect::<Vec<_>>(),
            vec![first.id(), second.id()]
        );
    }

    #[test]
    #[traced_test]
    fn test_preserve_existing_defaults() {
        let registry = ComponentRegistry::new();
        let first = registry.register(logger("first"));
        registry.register(logger("second").preserve_existing_defaults());

        assert_eq!(
            registry.try_get_registration(&Service::of::<Logger>()).unwrap().id(),
            first.id()
        );

        let registry = ComponentRegistry::new();
        let only = registry.register(logger("only").preserve_existing_defaults());
        assert_eq!(
            registry.try_get_registration(&Service::of::<Logger>()).unwrap().id(),
            only.id()
        );
    }

    #[test]
    #[traced_test]
    fn test_lookup_sees_later_registrations() {
        let registry = ComponentRegistry::new();
        let service = Service::of::<Logger>();

        assert!(!registry.is_registered(&service));
        registry.register(logger("late"));
        assert!(registry.is_registered(&service));
    }

    #[test]
    #[traced_test]
    fn test_layered_registry() {
        let parent = Arc::new(ComponentRegistry::new());
        let inherited = parent.register(logger("parent"));

        let child = ComponentRegistry::layered(parent.clone());
        let local = child.register(logger("child"));

        let service = Service::of::<Logger>();
        assert_eq!(child.try_get_registration(&service).unwrap().id(), local.id());
        assert_eq!(child.registrations_for(&service).len(), 2);
        assert!(child.owns(local.id()));
        assert!(!child.owns(inherited.id()));
        // The parent never sees child registrations
        assert_eq!(parent.registrations_for(&service).len(), 1);
    }

    #[test]
    #[traced_test]
    fn test_on_registered() {
        let registry = ComponentRegistry::new();
        let call_count = Arc::new(AtomicU8::new(0));

        registry.on_registered({
            let call_count = call_count.clone();
            move |registration: &Registration| {
                assert_eq!(registration.services(), &[Service::of::<Logger>()]);
                call_count.fetch_add(1, Ordering::SeqCst);
            }
        });
        registry.register(logger("first"));
        registry.register(logger("second"));

        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    struct RecursiveSource {
        call_count: Arc<AtomicU8>,
    }

    impl RegistrationSource for RecursiveSource {
        fn registrations_for(&self, service: &Service, registry: &ComponentRegistry) -> Vec<Registration> {
            if *service != Service::of::<Logger>() {
                return Vec::new();
            }
            self.call_count.fetch_add(1, Ordering::SeqCst);
            // Asking for the service being initialized sees static registrations only
            assert!(!registry.is_registered(service));
            vec![logger("synthesized").build()]
        }
    }

    #[test]
    #[traced_test]
    fn test_source_recursion_guard() {
        let call_count = Arc::new(AtomicU8::new(0));
        let registry = ComponentRegistry::new();
        registry.add_source(RecursiveSource {
            call_count: call_count.clone(),
        });

        let service = Service::of::<Logger>();
        let synthesized = registry.try_get_registration(&service).unwrap();
        assert!(registry.owns(synthesized.id()));
        // Synthesized registrations are reused, sources aren't asked again
        registry.register(RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(1u8)));
        assert_eq!(registry.try_get_registration(&service).unwrap().id(), synthesized.id());
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_service_pipeline() {
        let registry = ComponentRegistry::new();
        let service = Service::of::<Logger>();
        assert_eq!(registry.service_pipeline(&service).len(), 4);

        registry.use_service_middleware(
            service.clone(),
            middleware_fn(PipelinePhase::ResolveRequestStart, |request: &mut ResolveRequest<'_>, next: Next<'_>| {
                next.run(request)
            }),
            InsertionMode::EndOfPhase,
        );

        let pipeline = registry.service_pipeline(&service);
        assert_eq!(pipeline.len(), 5);
        assert_eq!(pipeline.phases()[0], PipelinePhase::ResolveRequestStart);
        assert_eq!(registry.service_pipeline(&Service::of::<u8>()).len(), 4);
    }
}
