use alloc::{
    boxed::Box,
    collections::BTreeSet,
    sync::{Arc, Weak},
    vec::Vec,
};
use core::{
    fmt::{self, Debug, Formatter},
    ops::Deref,
    sync::atomic::{AtomicU8, Ordering},
};
use parking_lot::Mutex;
use tracing::{debug, error, info_span, warn};

use crate::{
    any::Instance,
    cache::SharingCache,
    config::Config,
    context::downcast_instance,
    disposer::Disposer,
    errors::{DisposeErrorKind, InstantiateErrorKind, ResolveErrorKind, ScopeErrorKind},
    operation::ResolveOperation,
    parameter::Parameter,
    registration::{Registration, RegistrationId},
    registry::{ComponentRegistry, RegistryBuilder},
    scope::{ScopeId, ScopeTag},
    service::{Service, ServiceKey},
    sources::{Lazy, ServiceCollection},
};

const ACTIVE: u8 = 0;
const DISPOSING: u8 = 1;
const DISPOSED: u8 = 2;

/// Passed to scope-ending handlers. The scope itself can't resolve anything at this point.
#[derive(Debug, Clone, Copy)]
pub struct ScopeEnding<'a> {
    pub id: ScopeId,
    pub tag: Option<&'a ScopeTag>,
}

type EndingHandler = Box<dyn FnOnce(&ScopeEnding<'_>) -> Result<(), InstantiateErrorKind> + Send>;

/// Node of the lifetime scope tree: owns shared instances and the disposer releasing them.
///
/// Handles are cheap to clone. The scope is disposed explicitly with [`Self::dispose`],
/// by disposing an ancestor, or when its last handle drops.
#[derive(Clone)]
pub struct LifetimeScope {
    pub(crate) inner: Arc<ScopeInner>,
}

impl LifetimeScope {
    #[must_use]
    pub(crate) fn root(registry: Arc<ComponentRegistry>, config: Config) -> Self {
        let tag = Some(config.root_tag.clone());
        Self::from_inner(ScopeInner {
            id: ScopeId::next(),
            tag,
            parent: None,
            registry,
            owns_registry: true,
            config: Arc::new(config),
            cache: SharingCache::new(),
            disposer: Disposer::new(),
            children: Mutex::new(Vec::new()),
            ending_handlers: Mutex::new(Vec::new()),
            provided: Mutex::new(BTreeSet::new()),
            state: AtomicU8::new(ACTIVE),
        })
    }

    fn from_inner(inner: ScopeInner) -> Self {
        let scope = Self { inner: Arc::new(inner) };
        if scope.inner.owns_registry {
            let weak = Arc::downgrade(&scope.inner);
            scope.inner.registry.on_registered(move |registration| {
                if let Some(inner) = weak.upgrade() {
                    LifetimeScope { inner }.track_provided(registration);
                }
            });
            for registration in scope.inner.registry.registrations() {
                scope.track_provided(&registration);
            }
        }
        debug!(scope = %scope.id(), tag = ?scope.tag(), "Scope created");
        scope
    }

    /// Provided instances with a release action are released with this scope even if never resolved.
    /// Each registration is tracked at most once per scope.
    pub(crate) fn track_provided(&self, registration: &Registration) {
        if !registration.released_eagerly() {
            return;
        }
        let mut provided = self.inner.provided.lock();
        if !provided.insert(registration.id()) {
            return;
        }
        let Some(action) = registration
            .activator()
            .provided_instance()
            .and_then(|instance| registration.release_action(instance))
        else {
            return;
        };
        if self.inner.disposer.track(action).is_err() {
            warn!(registration = %registration, "Scope disposed before tracking a provided instance");
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.inner.id
    }

    #[inline]
    #[must_use]
    pub fn tag(&self) -> Option<&ScopeTag> {
        self.inner.tag.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<&LifetimeScope> {
        self.inner.parent.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.inner.registry
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    #[inline]
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) != ACTIVE
    }

    /// Creates child scope builder
    #[inline]
    #[must_use]
    pub fn enter(&self) -> ChildScopeBuilder<'_> {
        ChildScopeBuilder {
            parent: self,
            tag: None,
            configure: None,
        }
    }

    /// Creates an untagged child scope sharing this scope's registry.
    ///
    /// # Errors
    /// Returns [`ScopeErrorKind::Disposed`] if this scope is disposed.
    #[inline]
    pub fn begin_scope(&self) -> Result<LifetimeScope, ScopeErrorKind> {
        self.enter().build()
    }

    /// # Errors
    /// - Returns [`ScopeErrorKind::Disposed`] if this scope is disposed.
    /// - Returns [`ScopeErrorKind::DuplicateTag`] if this scope or an ancestor already has the tag.
    #[inline]
    pub fn begin_tagged_scope(&self, tag: impl Into<ScopeTag>) -> Result<LifetimeScope, ScopeErrorKind> {
        self.enter().with_tag(tag).build()
    }

    /// Resolves the default registration of `T`.
    ///
    /// # Errors
    /// - [`ResolveErrorKind::NoRegistration`] if nothing provides `T`.
    /// - [`ResolveErrorKind::CircularDependency`] if `T` depends on itself without lazy indirection.
    /// - [`ResolveErrorKind::Disposed`] if the scope is disposed.
    /// - Any error of the activation of `T` or of its dependencies.
    #[inline]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_typed(&Service::of::<T>(), Vec::new())
    }

    /// # Errors
    /// Same as [`Self::resolve`].
    #[inline]
    pub fn resolve_keyed<T: Send + Sync + 'static>(&self, key: impl Into<ServiceKey>) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_typed(&Service::keyed::<T>(key), Vec::new())
    }

    /// # Errors
    /// Same as [`Self::resolve`].
    #[inline]
    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_keyed(name)
    }

    /// Parameters are visible to the activator of `T` only, not to its dependencies.
    ///
    /// # Errors
    /// Same as [`Self::resolve`].
    #[inline]
    pub fn resolve_with_parameters<T: Send + Sync + 'static>(&self, parameters: Vec<Parameter>) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_typed(&Service::of::<T>(), parameters)
    }

    /// Resolves every registration of `T`, oldest first.
    ///
    /// # Errors
    /// Returns the first error of an element's activation.
    pub fn resolve_all<T: Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ResolveErrorKind> {
        let collection = self.resolve_typed::<ServiceCollection>(&Service::collection_of(Service::of::<T>()), Vec::new())?;
        collection.iter().cloned().map(downcast_instance).collect()
    }

    /// # Errors
    /// Returns [`ResolveErrorKind::NoRegistration`] if `T` isn't registered.
    #[inline]
    pub fn resolve_lazy<T: Send + Sync + 'static>(&self) -> Result<Lazy<T>, ResolveErrorKind> {
        self.resolve_service(&Service::lazy_of(Service::of::<T>()), Vec::new())
            .and_then(Lazy::from_instance)
    }

    /// Untyped resolution of the service's default registration.
    ///
    /// # Errors
    /// Same as [`Self::resolve`].
    #[inline]
    pub fn resolve_service(&self, service: &Service, parameters: Vec<Parameter>) -> Result<Instance, ResolveErrorKind> {
        ResolveOperation::execute(self, service, parameters)
    }

    /// Resolves exactly the given registration for the service, bypassing default selection.
    ///
    /// # Errors
    /// Same as [`Self::resolve`].
    #[inline]
    pub fn resolve_component(&self, service: Service, registration: Arc<Registration>) -> Result<Instance, ResolveErrorKind> {
        ResolveOperation::execute_registration(self, service, registration)
    }

    /// Resolves `T` if it's registered.
    ///
    /// # Errors
    /// Errors other than a missing registration.
    pub fn try_resolve<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, ResolveErrorKind> {
        let service = Service::of::<T>();
        if !self.inner.registry.is_registered(&service) {
            return Ok(None);
        }
        self.resolve_typed(&service, Vec::new()).map(Some)
    }

    #[inline]
    #[must_use]
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.inner.registry.is_registered(&Service::of::<T>())
    }

    /// Runs the handler when the scope starts disposing. Handler errors are logged and swallowed.
    pub fn on_ending<F>(&self, handler: F)
    where
        F: FnOnce(&ScopeEnding<'_>) -> Result<(), InstantiateErrorKind> + Send + 'static,
    {
        if self.is_disposed() {
            warn!(scope = %self.id(), "Scope-ending handler added to a disposed scope, ignored");
            return;
        }
        self.inner.ending_handlers.lock().push(Box::new(handler));
    }

    /// Disposes live child scopes, then releases tracked instances in reverse activation order.
    /// Later calls do nothing.
    ///
    /// # Errors
    /// Returns [`DisposeErrorKind::ReleaseFailed`] with every failed release, including ones of child scopes.
    /// Every release is attempted regardless of earlier failures.
    #[inline]
    pub fn dispose(&self) -> Result<(), DisposeErrorKind> {
        self.inner.dispose()
    }

    /// Like [`Self::dispose`], also awaiting asynchronous release actions.
    ///
    /// # Errors
    /// Same as [`Self::dispose`].
    #[cfg(feature = "async")]
    #[inline]
    pub async fn dispose_async(&self) -> Result<(), DisposeErrorKind> {
        self.inner.dispose_async().await
    }

    #[inline]
    fn resolve_typed<T: Send + Sync + 'static>(&self, service: &Service, parameters: Vec<Parameter>) -> Result<Arc<T>, ResolveErrorKind> {
        self.resolve_service(service, parameters).and_then(downcast_instance)
    }

    pub(crate) fn ensure_active(&self) -> Result<(), ResolveErrorKind> {
        if self.is_disposed() {
            let err = ResolveErrorKind::Disposed { scope: self.id() };
            error!("{}", err);
            return Err(err);
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn cache(&self) -> &SharingCache {
        &self.inner.cache
    }

    #[inline]
    pub(crate) fn disposer(&self) -> &Disposer {
        &self.inner.disposer
    }

    /// Nearest ancestor-or-self whose own registry layer holds the registration, the root otherwise.
    #[must_use]
    pub(crate) fn registry_owner(&self, registration: RegistrationId) -> LifetimeScope {
        let mut scope = self;
        loop {
            if scope.inner.owns_registry && scope.inner.registry.owns(registration) {
                return scope.clone();
            }
            match &scope.inner.parent {
                Some(parent) => scope = parent,
                None => return scope.clone(),
            }
        }
    }

    /// Nearest ancestor-or-self tagged with one of the tags.
    #[must_use]
    pub(crate) fn find_matching(&self, tags: &[ScopeTag]) -> Option<LifetimeScope> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if current.tag().is_some_and(|tag| tags.contains(tag)) {
                return Some(current.clone());
            }
            scope = current.parent();
        }
        None
    }
}

impl Debug for LifetimeScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeScope")
            .field("id", &self.inner.id)
            .field("tag", &self.inner.tag)
            .field("parent", &self.inner.parent.as_ref().map(LifetimeScope::id))
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

pub struct ChildScopeBuilder<'a> {
    parent: &'a LifetimeScope,
    tag: Option<ScopeTag>,
    configure: Option<Box<dyn FnOnce(&mut RegistryBuilder) + 'a>>,
}

impl<'a> ChildScopeBuilder<'a> {
    #[inline]
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<ScopeTag>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Adds scope-local registrations. They see the parent's registrations, the parent never sees them.
    /// Singletons among them are owned by the new scope.
    #[inline]
    #[must_use]
    pub fn with_registrations<F>(mut self, configure: F) -> Self
    where
        F: FnOnce(&mut RegistryBuilder) + 'a,
    {
        self.configure = Some(Box::new(configure));
        self
    }

    /// # Errors
    /// - Returns [`ScopeErrorKind::Disposed`] if the parent scope is disposed.
    /// - Returns [`ScopeErrorKind::DuplicateTag`] if the parent or one of its ancestors already has the tag.
    pub fn build(self) -> Result<LifetimeScope, ScopeErrorKind> {
        let parent = self.parent;
        if parent.is_disposed() {
            let err = ScopeErrorKind::Disposed { scope: parent.id() };
            error!("{}", err);
            return Err(err);
        }
        if let Some(tag) = &self.tag {
            if parent.find_matching(core::slice::from_ref(tag)).is_some() {
                let err = ScopeErrorKind::DuplicateTag { tag: tag.clone() };
                error!("{}", err);
                return Err(err);
            }
        }

        let (registry, owns_registry) = match self.configure {
            Some(configure) => {
                let mut builder = RegistryBuilder::new();
                configure(&mut builder);
                (Arc::new(builder.build_layered(parent.inner.registry.clone())), true)
            }
            None => (parent.inner.registry.clone(), false),
        };

        let child = LifetimeScope::from_inner(ScopeInner {
            id: ScopeId::next(),
            tag: self.tag,
            parent: Some(parent.clone()),
            registry,
            owns_registry,
            config: parent.inner.config.clone(),
            cache: SharingCache::new(),
            disposer: Disposer::new(),
            children: Mutex::new(Vec::new()),
            ending_handlers: Mutex::new(Vec::new()),
            provided: Mutex::new(BTreeSet::new()),
            state: AtomicU8::new(ACTIVE),
        });

        {
            let mut children = parent.inner.children.lock();
            children.retain(|child| child.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }
        // The parent may have started disposing after the check above
        if parent.is_disposed() {
            if let Err(err) = child.dispose() {
                error!("{}", err);
            }
            let err = ScopeErrorKind::Disposed { scope: parent.id() };
            error!("{}", err);
            return Err(err);
        }

        Ok(child)
    }
}

pub(crate) struct ScopeInner {
    id: ScopeId,
    tag: Option<ScopeTag>,
    parent: Option<LifetimeScope>,
    registry: Arc<ComponentRegistry>,
    owns_registry: bool,
    config: Arc<Config>,
    cache: SharingCache,
    disposer: Disposer,
    children: Mutex<Vec<Weak<ScopeInner>>>,
    ending_handlers: Mutex<Vec<EndingHandler>>,
    provided: Mutex<BTreeSet<RegistrationId>>,
    state: AtomicU8,
}

impl ScopeInner {
    /// Returns `false` if disposal already started elsewhere.
    fn begin_dispose(&self) -> bool {
        self.state
            .compare_exchange(ACTIVE, DISPOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn notify_ending(&self) {
        let handlers = core::mem::take(&mut *self.ending_handlers.lock());
        let ending = ScopeEnding {
            id: self.id,
            tag: self.tag.as_ref(),
        };
        for handler in handlers {
            if let Err(err) = handler(&ending) {
                warn!("Scope-ending handler failed: {}", err);
            }
        }
    }

    /// Live children, newest first.
    fn take_children(&self) -> Vec<Arc<ScopeInner>> {
        let children = core::mem::take(&mut *self.children.lock());
        children.iter().rev().filter_map(Weak::upgrade).collect()
    }

    fn finish_dispose(&self, errors: Vec<anyhow::Error>) -> Result<(), DisposeErrorKind> {
        self.cache.clear();
        self.state.store(DISPOSED, Ordering::Release);

        if errors.is_empty() {
            debug!("Scope disposed");
            Ok(())
        } else {
            let err = DisposeErrorKind::ReleaseFailed { scope: self.id, errors };
            error!("{}", err);
            Err(err)
        }
    }

    fn dispose(&self) -> Result<(), DisposeErrorKind> {
        if !self.begin_dispose() {
            debug!(scope = %self.id, "Scope already disposed");
            return Ok(());
        }
        let span = info_span!("dispose", scope = %self.id, tag = ?self.tag);
        let _guard = span.enter();
        debug!(tracked = self.disposer.len(), cached = self.cache.len(), "Disposing");

        self.notify_ending();

        let mut errors = Vec::new();
        for child in self.take_children() {
            if let Err(DisposeErrorKind::ReleaseFailed { errors: child_errors, .. }) = child.dispose() {
                errors.extend(child_errors);
            }
        }
        errors.extend(self.disposer.dispose());

        self.finish_dispose(errors)
    }

    #[cfg(feature = "async")]
    async fn dispose_async(&self) -> Result<(), DisposeErrorKind> {
        if !self.begin_dispose() {
            debug!(scope = %self.id, "Scope already disposed");
            return Ok(());
        }
        debug!(
            scope = %self.id,
            tag = ?self.tag,
            tracked = self.disposer.len(),
            cached = self.cache.len(),
            "Disposing asynchronously"
        );

        self.notify_ending();

        let mut errors = Vec::new();
        for child in self.take_children() {
            if let Err(DisposeErrorKind::ReleaseFailed { errors: child_errors, .. }) =
                Box::pin(child.dispose_async()).await
            {
                errors.extend(child_errors);
            }
        }
        errors.extend(self.disposer.dispose_async().await);

        self.finish_dispose(errors)
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            error!("{}", err);
        }
        debug!(scope = %self.id, "Scope closed on drop");
    }
}

/// Root lifetime scope built from a registry.
#[derive(Clone, Debug)]
pub struct Container {
    scope: LifetimeScope,
}

impl Container {
    /// Builds the registry and the root scope, then resolves every auto-activated registration.
    ///
    /// # Errors
    /// Returns the first error of an auto-activated registration.
    #[inline]
    pub fn new(builder: RegistryBuilder) -> Result<Self, ResolveErrorKind> {
        Self::with_config(builder, Config::default())
    }

    /// # Errors
    /// Returns the first error of an auto-activated registration.
    pub fn with_config(builder: RegistryBuilder, config: Config) -> Result<Self, ResolveErrorKind> {
        let registry = Arc::new(builder.build());
        let scope = LifetimeScope::root(registry.clone(), config);

        for registration in registry.auto_activated() {
            let Some(service) = registration.services().first().cloned() else {
                continue;
            };
            debug!(registration = %registration, "Auto-activating");
            scope.resolve_component(service, registration)?;
        }
        Ok(Self { scope })
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> &LifetimeScope {
        &self.scope
    }
}

impl Deref for Container {
    type Target = LifetimeScope;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.scope
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::Container;
    use crate::{
        context::ResolveContext,
        disposer::Dispose,
        inject::{Inject, InjectAll},
        parameter::Parameter,
        registration::RegistrationBuilder,
        registry::RegistryBuilder,
        service::Service,
        sources::Lazy,
        DisposeErrorKind, InstantiateErrorKind, ResolveErrorKind, ScopeErrorKind,
    };

    use alloc::{
        format,
        string::{String, ToString as _},
        sync::Arc,
        vec,
        vec::Vec,
    };
    use core::sync::atomic::{AtomicU8, Ordering};
    use parking_lot::Mutex;
    use std::thread;
    use tracing::debug;
    use tracing_test::traced_test;

    struct Logger;
    struct UserService(Arc<Logger>);

    type ReleaseLog = Arc<Mutex<Vec<&'static str>>>;

    struct Tracked {
        name: &'static str,
        log: ReleaseLog,
    }

    impl Dispose for Tracked {
        fn dispose(&self) -> anyhow::Result<()> {
            debug!(name = self.name, "Dispose");
            self.log.lock().push(self.name);
            Ok(())
        }
    }

    fn tracked(name: &'static str, log: &ReleaseLog) -> RegistrationBuilder<Tracked> {
        let log = log.clone();
        RegistrationBuilder::provide(move || {
            Ok::<_, InstantiateErrorKind>(Tracked {
                name,
                log: log.clone(),
            })
        })
        .keyed(name)
        .instance_per_lifetime_scope()
        .disposable()
    }

    #[test]
    #[traced_test]
    fn test_transient_shares_singleton() {
        let container = Container::new(
            RegistryBuilder::new()
                .register(RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Logger)).single_instance())
                .register(RegistrationBuilder::provide(|Inject(logger): Inject<Logger>| {
                    Ok::<_, InstantiateErrorKind>(UserService(logger))
                })),
        )
        .unwrap();

        let first = container.resolve::<UserService>().unwrap();
        let second = container.resolve::<UserService>().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first.0, &second.0));
    }

    #[test]
    #[traced_test]
    fn test_sharing_lifetimes() {
        let container = Container::new(
            RegistryBuilder::new()
                .register(RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Logger)).single_instance())
                .register(
                    RegistrationBuilder::provide(|Inject(logger): Inject<Logger>| Ok::<_, InstantiateErrorKind>(UserService(logger)))
                        .instance_per_lifetime_scope(),
                ),
        )
        .unwrap();
        let child = container.begin_scope().unwrap();

        let root_service = container.resolve::<UserService>().unwrap();
        let child_service = child.resolve::<UserService>().unwrap();

        assert!(Arc::ptr_eq(&child_service, &child.resolve::<UserService>().unwrap()));
        assert!(!Arc::ptr_eq(&root_service, &child_service));
        assert!(Arc::ptr_eq(&root_service.0, &child_service.0));

        child.dispose().unwrap();
        assert!(Arc::ptr_eq(&root_service, &container.resolve::<UserService>().unwrap()));
    }

    #[test]
    #[traced_test]
    fn test_matching_scope() {
        struct Unit;

        let container = Container::new(
            RegistryBuilder::new().register(
                RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Unit)).instance_per_matching_lifetime_scope(["tag"]),
            ),
        )
        .unwrap();

        let untagged = container.begin_scope().unwrap();
        assert!(matches!(
            untagged.resolve::<Unit>(),
            Err(ResolveErrorKind::NoMatchingScope { .. })
        ));
        assert!(matches!(
            container.resolve::<Unit>(),
            Err(ResolveErrorKind::NoMatchingScope { .. })
        ));

        let tagged = container.begin_tagged_scope("tag").unwrap();
        let first = tagged.begin_scope().unwrap();
        let second = tagged.begin_scope().unwrap();

        let unit = first.resolve::<Unit>().unwrap();
        assert!(Arc::ptr_eq(&unit, &second.resolve::<Unit>().unwrap()));
        assert!(Arc::ptr_eq(&unit, &tagged.resolve::<Unit>().unwrap()));
    }

    #[test]
    #[traced_test]
    fn test_circular_dependency() {
        #[allow(dead_code)]
        struct A(Arc<B>);
        #[allow(dead_code)]
        struct B(Arc<A>);

        let container = Container::new(
            RegistryBuilder::new()
                .register(RegistrationBuilder::provide(|Inject(b): Inject<B>| Ok::<_, InstantiateErrorKind>(A(b))))
                .register(RegistrationBuilder::provide(|Inject(a): Inject<A>| Ok::<_, InstantiateErrorKind>(B(a)))),
        )
        .unwrap();

        match container.resolve::<A>() {
            Err(err @ ResolveErrorKind::CircularDependency { .. }) => {
                let ResolveErrorKind::CircularDependency { path } = &err else {
                    unreachable!();
                };
                assert_eq!(path, &vec![Service::of::<A>(), Service::of::<B>(), Service::of::<A>()]);

                let message = err.to_string();
                assert!(message.contains('A'));
                assert!(message.contains('B'));
            }
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("cycle resolved"),
        }
    }

    #[test]
    #[traced_test]
    fn test_lazy_breaks_cycle() {
        struct A(Lazy<B>);
        #[allow(dead_code)]
        struct B(Arc<A>);

        let container = Container::new(
            RegistryBuilder::new()
                .register(RegistrationBuilder::provide(|b: Lazy<B>| Ok::<_, InstantiateErrorKind>(A(b))).instance_per_lifetime_scope())
                .register(RegistrationBuilder::provide(|Inject(a): Inject<A>| Ok::<_, InstantiateErrorKind>(B(a)))),
        )
        .unwrap();

        let b = container.resolve::<B>().unwrap();
        assert!(!b.0 .0.is_value_created());

        let lazy_b = b.0 .0.get().unwrap();
        assert!(Arc::ptr_eq(&lazy_b.0, &b.0));
        assert!(b.0 .0.is_value_created());
    }

    #[test]
    #[traced_test]
    fn test_lazy_resolves_once() {
        struct Heavy;

        let call_count = Arc::new(AtomicU8::new(0));
        let container = Container::new(RegistryBuilder::new().register(RegistrationBuilder::provide({
            let call_count = call_count.clone();
            move || {
                call_count.fetch_add(1, Ordering::SeqCst);
                Ok::<_, InstantiateErrorKind>(Heavy)
            }
        })))
        .unwrap();

        let lazy = container.resolve_lazy::<Heavy>().unwrap();
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        let first = lazy.get().unwrap();
        let second = lazy.clone().get().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        assert!(matches!(
            container.resolve_lazy::<Logger>(),
            Err(ResolveErrorKind::NoRegistration { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_lazy_after_dispose() {
        struct Heavy;

        let container = Container::new(
            RegistryBuilder::new().register(RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Heavy))),
        )
        .unwrap();
        let child = container.begin_scope().unwrap();
        let lazy = child.resolve_lazy::<Heavy>().unwrap();

        child.dispose().unwrap();
        assert!(matches!(lazy.get(), Err(ResolveErrorKind::Disposed { .. })));
    }

    #[test]
    #[traced_test]
    fn test_lazy_self_access_during_construction() {
        struct Shared;
        struct Session;

        let container = Container::new(
            RegistryBuilder::new()
                .register(
                    RegistrationBuilder::provide(|lazy: Lazy<Shared>| {
                        lazy.get()?;
                        Ok::<_, InstantiateErrorKind>(Shared)
                    })
                    .single_instance(),
                )
                .register(
                    RegistrationBuilder::delegate(|context| {
                        context.scope().resolve::<Session>()?;
                        Ok(Session)
                    })
                    .instance_per_lifetime_scope(),
                ),
        )
        .unwrap();

        match container.resolve::<Session>().err().unwrap().root_cause() {
            ResolveErrorKind::CircularDependency { path } => {
                assert_eq!(path, &vec![Service::of::<Session>(), Service::of::<Session>()]);
            }
            err => panic!("unexpected error: {err}"),
        }

        for _ in 0..2 {
            let err = container.resolve::<Shared>().err().unwrap();
            match err.root_cause() {
                ResolveErrorKind::CircularDependency { path } => {
                    assert_eq!(path, &vec![Service::of::<Shared>(), Service::of::<Shared>()]);
                }
                err => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(container.cache().len(), 0);
    }

    #[test]
    #[traced_test]
    fn test_dispose_order() {
        let log = ReleaseLog::default();
        let container = Container::new(
            RegistryBuilder::new()
                .register(tracked("first", &log))
                .register(tracked("second", &log))
                .register(tracked("child", &log)),
        )
        .unwrap();
        let child = container.begin_scope().unwrap();

        container.resolve_keyed::<Tracked>("first").unwrap();
        container.resolve_keyed::<Tracked>("second").unwrap();
        child.resolve_keyed::<Tracked>("child").unwrap();

        container.dispose().unwrap();
        assert_eq!(*log.lock(), vec!["child", "second", "first"]);
        assert!(child.is_disposed());

        container.dispose().unwrap();
        assert_eq!(log.lock().len(), 3);

        assert!(matches!(
            container.resolve_keyed::<Tracked>("first"),
            Err(ResolveErrorKind::Disposed { .. })
        ));
        assert!(matches!(container.begin_scope(), Err(ScopeErrorKind::Disposed { .. })));
    }

    #[test]
    #[traced_test]
    fn test_dependent_disposed_before_dependency() {
        struct Repository {
            _database: Arc<Tracked>,
            log: ReleaseLog,
        }

        impl Dispose for Repository {
            fn dispose(&self) -> anyhow::Result<()> {
                self.log.lock().push("repository");
                Ok(())
            }
        }

        let log = ReleaseLog::default();
        let container = Container::new(
            RegistryBuilder::new()
                .register(
                    RegistrationBuilder::provide({
                        let log = log.clone();
                        move || {
                            Ok::<_, InstantiateErrorKind>(Tracked {
                                name: "database",
                                log: log.clone(),
                            })
                        }
                    })
                    .instance_per_lifetime_scope()
                    .disposable(),
                )
                .register(
                    RegistrationBuilder::provide({
                        let log = log.clone();
                        move |Inject(database): Inject<Tracked>| {
                            Ok::<_, InstantiateErrorKind>(Repository {
                                _database: database,
                                log: log.clone(),
                            })
                        }
                    })
                    .instance_per_lifetime_scope()
                    .disposable(),
                ),
        )
        .unwrap();
        let child = container.begin_scope().unwrap();

        child.resolve::<Repository>().unwrap();
        child.resolve::<Tracked>().unwrap();

        child.dispose().unwrap();
        assert_eq!(*log.lock(), vec!["repository", "database"]);
    }

    #[test]
    #[traced_test]
    fn test_dispose_on_drop() {
        let log = ReleaseLog::default();
        let container = Container::new(RegistryBuilder::new().register(tracked("scoped", &log))).unwrap();

        {
            let child = container.begin_scope().unwrap();
            child.resolve_keyed::<Tracked>("scoped").unwrap();
        }
        assert_eq!(*log.lock(), vec!["scoped"]);
    }

    #[test]
    #[traced_test]
    fn test_release_failures_collected() {
        struct Faulty;

        impl Dispose for Faulty {
            fn dispose(&self) -> anyhow::Result<()> {
                Err(anyhow::anyhow!("connection already closed"))
            }
        }

        let log = ReleaseLog::default();
        let container = Container::new(
            RegistryBuilder::new()
                .register(tracked("healthy", &log))
                .register(
                    RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Faulty))
                        .instance_per_lifetime_scope()
                        .disposable(),
                ),
        )
        .unwrap();
        container.resolve_keyed::<Tracked>("healthy").unwrap();
        container.resolve::<Faulty>().unwrap();

        match container.dispose() {
            Err(DisposeErrorKind::ReleaseFailed { errors, .. }) => assert_eq!(errors.len(), 1),
            Ok(()) => panic!("release failure swallowed"),
        }
        assert_eq!(*log.lock(), vec!["healthy"]);
    }

    #[test]
    #[traced_test]
    fn test_ownership_and_release_actions() {
        let log = ReleaseLog::default();
        let container = Container::new(
            RegistryBuilder::new()
                .register(tracked("external", &log).externally_owned())
                .register(
                    RegistrationBuilder::instance(Tracked {
                        name: "provided",
                        log: log.clone(),
                    })
                    .keyed("provided")
                    .on_release({
                        let log = log.clone();
                        move |tracked: Arc<Tracked>| log.lock().push(tracked.name)
                    }),
                ),
        )
        .unwrap();
        container.resolve_keyed::<Tracked>("external").unwrap();

        container.dispose().unwrap();
        container.dispose().unwrap();
        assert_eq!(*log.lock(), vec!["provided"]);
    }

    #[test]
    #[traced_test]
    fn test_provided_instance_released_once() {
        let log = ReleaseLog::default();
        let container = Container::new(
            RegistryBuilder::new().register(
                RegistrationBuilder::instance(Tracked {
                    name: "provided",
                    log: log.clone(),
                })
                .disposable(),
            ),
        )
        .unwrap();

        let child = container.begin_scope().unwrap();
        let first = child.resolve::<Tracked>().unwrap();
        assert!(Arc::ptr_eq(&first, &container.resolve::<Tracked>().unwrap()));
        child.dispose().unwrap();
        assert!(log.lock().is_empty());

        container.dispose().unwrap();
        assert_eq!(*log.lock(), vec!["provided"]);
    }

    #[test]
    #[traced_test]
    fn test_late_provided_instance_released() {
        let log = ReleaseLog::default();
        let container = Container::new(RegistryBuilder::new()).unwrap();

        container.registry().register(
            RegistrationBuilder::instance(Tracked {
                name: "resolved",
                log: log.clone(),
            })
            .disposable(),
        );
        container.registry().register(
            RegistrationBuilder::instance(Tracked {
                name: "unused",
                log: log.clone(),
            })
            .keyed("unused")
            .disposable(),
        );

        container.resolve::<Tracked>().unwrap();
        container.resolve::<Tracked>().unwrap();
        assert!(log.lock().is_empty());

        container.dispose().unwrap();
        assert_eq!(*log.lock(), vec!["unused", "resolved"]);
    }

    #[test]
    #[traced_test]
    fn test_child_scope_registrations() {
        struct Local;

        let log = ReleaseLog::default();
        let container = Container::new(
            RegistryBuilder::new().register(RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Logger)).single_instance()),
        )
        .unwrap();

        let child = container
            .enter()
            .with_tag("request")
            .with_registrations(|builder| {
                builder
                    .add_registration(RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Local)).single_instance())
                    .add_registration(tracked("local", &log).single_instance());
            })
            .build()
            .unwrap();
        let grandchild = child.begin_scope().unwrap();

        assert!(child.is_registered::<Local>());
        assert!(!container.is_registered::<Local>());
        assert!(Arc::ptr_eq(&child.resolve::<Local>().unwrap(), &grandchild.resolve::<Local>().unwrap()));
        assert!(Arc::ptr_eq(&child.resolve::<Logger>().unwrap(), &container.resolve::<Logger>().unwrap()));

        grandchild.resolve_keyed::<Tracked>("local").unwrap();
        grandchild.dispose().unwrap();
        assert!(log.lock().is_empty());

        child.dispose().unwrap();
        assert_eq!(*log.lock(), vec!["local"]);
        assert!(!container.is_disposed());
    }

    #[test]
    #[traced_test]
    fn test_scope_tags() {
        let container = Container::new(RegistryBuilder::new()).unwrap();
        let request = container.begin_tagged_scope("request").unwrap();

        assert_eq!(request.tag().map(|tag| tag.as_str()), Some("request"));
        assert_eq!(request.parent().map(|parent| parent.id()), Some(container.id()));
        assert!(matches!(
            request.begin_scope().unwrap().begin_tagged_scope("request"),
            Err(ScopeErrorKind::DuplicateTag { .. })
        ));
        assert!(matches!(
            container.begin_tagged_scope("root"),
            Err(ScopeErrorKind::DuplicateTag { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_on_ending() {
        let call_count = Arc::new(AtomicU8::new(0));
        let container = Container::new(RegistryBuilder::new()).unwrap();
        let child = container.begin_tagged_scope("request").unwrap();

        child.on_ending({
            let call_count = call_count.clone();
            move |ending| {
                assert_eq!(ending.tag.map(|tag| tag.as_str()), Some("request"));
                call_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        child.on_ending(|_| Err(anyhow::anyhow!("ignored").into()));

        container.dispose().unwrap();
        child.dispose().unwrap();
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_parameters() {
        struct Endpoint(u16);

        let container = Container::new(RegistryBuilder::new().register(RegistrationBuilder::delegate(
            |context: &ResolveContext<'_>| {
                let port = context.named_parameter::<u16>("port").map_or(80, |port| *port);
                Ok(Endpoint(port))
            },
        )))
        .unwrap();

        assert_eq!(
            container
                .resolve_with_parameters::<Endpoint>(vec![Parameter::named("port", 8080u16)])
                .unwrap()
                .0,
            8080
        );
        assert_eq!(container.resolve::<Endpoint>().unwrap().0, 80);
    }

    #[test]
    #[traced_test]
    fn test_typed_parameter_overrides_dependency() {
        let container = Container::new(
            RegistryBuilder::new()
                .register(RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Logger)).single_instance())
                .register(RegistrationBuilder::provide(|Inject(logger): Inject<Logger>| {
                    Ok::<_, InstantiateErrorKind>(UserService(logger))
                })),
        )
        .unwrap();
        let registered = container.resolve::<Logger>().unwrap();

        let service = container
            .resolve_with_parameters::<UserService>(vec![Parameter::typed(Logger)])
            .unwrap();
        assert!(!Arc::ptr_eq(&service.0, &registered));
        assert!(Arc::ptr_eq(&container.resolve::<UserService>().unwrap().0, &registered));
    }

    #[test]
    #[traced_test]
    fn test_hooks() {
        struct Counter(u8);

        let log = ReleaseLog::default();
        let container = Container::new(
            RegistryBuilder::new().register(
                RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Counter(1)))
                    .on_preparing({
                        let log = log.clone();
                        move |_| log.lock().push("preparing")
                    })
                    .on_activating({
                        let log = log.clone();
                        move |event| {
                            log.lock().push("activating");
                            if let Some(counter) = event.instance_mut() {
                                counter.0 += 1;
                            }
                            Ok(())
                        }
                    })
                    .on_activated({
                        let log = log.clone();
                        move |event| {
                            assert_eq!(event.instance().0, 2);
                            log.lock().push("activated");
                            Ok(())
                        }
                    }),
            ),
        )
        .unwrap();

        assert_eq!(container.resolve::<Counter>().unwrap().0, 2);
        assert_eq!(*log.lock(), vec!["preparing", "activating", "activated"]);
    }

    #[test]
    #[traced_test]
    fn test_activated_handlers_run_after_operation() {
        struct Inner;
        #[allow(dead_code)]
        struct Outer(Arc<Inner>);

        let log = ReleaseLog::default();
        let container = Container::new(
            RegistryBuilder::new()
                .register(
                    RegistrationBuilder::provide({
                        let log = log.clone();
                        move || {
                            log.lock().push("inner created");
                            Ok::<_, InstantiateErrorKind>(Inner)
                        }
                    })
                    .on_activated({
                        let log = log.clone();
                        move |_| {
                            log.lock().push("inner activated");
                            Ok(())
                        }
                    }),
                )
                .register(
                    RegistrationBuilder::provide({
                        let log = log.clone();
                        move |Inject(inner): Inject<Inner>| {
                            log.lock().push("outer created");
                            Ok::<_, InstantiateErrorKind>(Outer(inner))
                        }
                    })
                    .on_activated({
                        let log = log.clone();
                        move |_| {
                            log.lock().push("outer activated");
                            Ok(())
                        }
                    }),
                ),
        )
        .unwrap();

        container.resolve::<Outer>().unwrap();
        assert_eq!(
            *log.lock(),
            vec!["inner created", "outer created", "inner activated", "outer activated"]
        );
    }

    #[test]
    #[traced_test]
    fn test_activated_failure() {
        let container = Container::new(RegistryBuilder::new().register(
            RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Logger)).on_activated(|_| Err(anyhow::anyhow!("audit failed").into())),
        ))
        .unwrap();

        assert!(matches!(
            container.resolve::<Logger>(),
            Err(ResolveErrorKind::Completion { .. })
        ));
    }

    #[test]
    #[traced_test]
    fn test_activated_handlers_all_run() {
        struct Clock;

        let log = ReleaseLog::default();
        let container = Container::new(
            RegistryBuilder::new()
                .register(RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Clock)).on_activated({
                    let log = log.clone();
                    move |_| {
                        log.lock().push("clock activated");
                        Err(anyhow::anyhow!("clock audit failed").into())
                    }
                }))
                .register(
                    RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Logger))
                        .on_activated({
                            let log = log.clone();
                            move |event| {
                                event.context().resolve::<Clock>()?;
                                log.lock().push("first");
                                Err(anyhow::anyhow!("first failed").into())
                            }
                        })
                        .on_activated({
                            let log = log.clone();
                            move |_| {
                                log.lock().push("second");
                                Err(anyhow::anyhow!("second failed").into())
                            }
                        }),
                ),
        )
        .unwrap();

        match container.resolve::<Logger>() {
            Err(err @ ResolveErrorKind::Completion { .. }) => {
                let ResolveErrorKind::Completion { service, .. } = &err else {
                    unreachable!();
                };
                assert_eq!(service, &Service::of::<Logger>());
                assert!(err.to_string().contains("first failed"));
            }
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("failing handlers ignored"),
        }
        assert_eq!(*log.lock(), vec!["first", "second", "clock activated"]);
    }

    #[test]
    #[traced_test]
    fn test_tracked_when_activating_fails() {
        let log = ReleaseLog::default();
        let container = Container::new(
            RegistryBuilder::new().register(tracked("half-built", &log).on_activating(|_| Err(anyhow::anyhow!("not ready").into()))),
        )
        .unwrap();

        assert!(matches!(
            container.resolve_keyed::<Tracked>("half-built"),
            Err(ResolveErrorKind::Activation { .. })
        ));
        container.dispose().unwrap();
        assert_eq!(*log.lock(), vec!["half-built"]);
    }

    #[test]
    #[traced_test]
    fn test_activation_errors() {
        struct Database;
        #[allow(dead_code)]
        struct Repository(Arc<Database>);

        let container = Container::new(
            RegistryBuilder::new()
                .register(RegistrationBuilder::provide(|| {
                    Err::<Database, _>(InstantiateErrorKind::Custom(anyhow::anyhow!("connection refused")))
                }))
                .register(RegistrationBuilder::provide(|Inject(database): Inject<Database>| {
                    Ok::<_, InstantiateErrorKind>(Repository(database))
                })),
        )
        .unwrap();

        match container.resolve::<Repository>() {
            Err(ResolveErrorKind::Activation { service, .. }) => assert_eq!(service, Service::of::<Database>()),
            Err(err) => panic!("unexpected error: {err}"),
            Ok(_) => panic!("failing factory resolved"),
        }
        assert!(matches!(
            container.resolve::<Logger>(),
            Err(ResolveErrorKind::NoRegistration { .. })
        ));
        assert!(container.try_resolve::<Logger>().unwrap().is_none());
    }

    #[test]
    #[traced_test]
    fn test_decorators() {
        struct Greeting(String);

        let container = Container::new(
            RegistryBuilder::new()
                .register(RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Greeting("hello".to_string()))).single_instance())
                .decorate(|_: &ResolveContext<'_>, inner: Arc<Greeting>| Ok(Greeting(format!("{}, world", inner.0))))
                .decorate(|_: &ResolveContext<'_>, inner: Arc<Greeting>| Ok(Greeting(format!("{}!", inner.0)))),
        )
        .unwrap();

        let greeting = container.resolve::<Greeting>().unwrap();
        assert_eq!(greeting.0, "hello, world!");
        assert!(Arc::ptr_eq(&greeting, &container.resolve::<Greeting>().unwrap()));
    }

    #[test]
    #[traced_test]
    fn test_collections() {
        struct Plugin(&'static str);
        struct Host(Vec<Arc<Plugin>>);

        let call_count = Arc::new(AtomicU8::new(0));
        let container = Container::new(
            RegistryBuilder::new()
                .register(
                    RegistrationBuilder::provide({
                        let call_count = call_count.clone();
                        move || {
                            call_count.fetch_add(1, Ordering::SeqCst);
                            Ok::<_, InstantiateErrorKind>(Plugin("metrics"))
                        }
                    })
                    .single_instance(),
                )
                .register(RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Plugin("auth"))))
                .register(RegistrationBuilder::provide(|InjectAll(plugins): InjectAll<Plugin>| {
                    Ok::<_, InstantiateErrorKind>(Host(plugins))
                })),
        )
        .unwrap();

        let names = |plugins: &[Arc<Plugin>]| plugins.iter().map(|plugin| plugin.0).collect::<Vec<_>>();
        assert_eq!(names(&container.resolve_all::<Plugin>().unwrap()), vec!["metrics", "auth"]);
        assert_eq!(names(&container.resolve::<Host>().unwrap().0), vec!["metrics", "auth"]);
        assert_eq!(container.resolve::<Plugin>().unwrap().0, "auth");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        assert!(container.resolve_all::<Logger>().unwrap().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_collection_in_child_scope() {
        struct Plugin(&'static str);

        let container = Container::new(
            RegistryBuilder::new().register(RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Plugin("root")))),
        )
        .unwrap();
        assert_eq!(container.resolve_all::<Plugin>().unwrap().len(), 1);

        let child = container
            .enter()
            .with_registrations(|builder| {
                builder.add_registration(RegistrationBuilder::provide(|| Ok::<_, InstantiateErrorKind>(Plugin("child"))));
            })
            .build()
            .unwrap();

        let plugins = child.resolve_all::<Plugin>().unwrap();
        assert_eq!(plugins.iter().map(|plugin| plugin.0).collect::<Vec<_>>(), vec!["root", "child"]);
        assert_eq!(container.resolve_all::<Plugin>().unwrap().len(), 1);
    }

    #[test]
    #[traced_test]
    fn test_auto_activate() {
        let call_count = Arc::new(AtomicU8::new(0));
        let registry = RegistryBuilder::new().register(
            RegistrationBuilder::provide({
                let call_count = call_count.clone();
                move || {
                    call_count.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, InstantiateErrorKind>(Logger)
                }
            })
            .single_instance()
            .auto_activate(),
        );

        let container = Container::new(registry).unwrap();
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        container.resolve::<Logger>().unwrap();
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_concurrent_singleton() {
        let call_count = Arc::new(AtomicU8::new(0));
        let container = Container::new(
            RegistryBuilder::new().register(
                RegistrationBuilder::provide({
                    let call_count = call_count.clone();
                    move || {
                        call_count.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(core::time::Duration::from_millis(10));
                        Ok::<_, InstantiateErrorKind>(Logger)
                    }
                })
                .single_instance(),
            ),
        )
        .unwrap();

        let handles = (0..8)
            .map(|_| {
                let container = container.clone();
                thread::spawn(move || container.begin_scope().unwrap().resolve::<Logger>().unwrap())
            })
            .collect::<Vec<_>>();
        let loggers = handles.into_iter().map(|handle| handle.join().unwrap()).collect::<Vec<_>>();

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(loggers.iter().all(|logger| Arc::ptr_eq(logger, &loggers[0])));
    }

    #[cfg(feature = "async")]
    mod r#async {
        use super::ReleaseLog;
        use crate::{
            disposer::AsyncDispose, registration::RegistrationBuilder, registry::RegistryBuilder, Container, DisposeErrorKind,
            InstantiateErrorKind,
        };

        use alloc::{sync::Arc, vec};
        use tracing_test::traced_test;

        struct Pool {
            log: ReleaseLog,
        }

        impl AsyncDispose for Pool {
            async fn dispose_async(&self) -> anyhow::Result<()> {
                tokio::task::yield_now().await;
                self.log.lock().push("pool");
                Ok(())
            }
        }

        fn container(log: &ReleaseLog) -> Container {
            let log = log.clone();
            Container::new(
                RegistryBuilder::new().register(
                    RegistrationBuilder::provide(move || Ok::<_, InstantiateErrorKind>(Pool { log: log.clone() }))
                        .single_instance()
                        .async_disposable(),
                ),
            )
            .unwrap()
        }

        #[tokio::test]
        #[traced_test]
        async fn test_dispose_async() {
            let log = ReleaseLog::default();
            let container = container(&log);
            let child = container.begin_scope().unwrap();

            child.resolve::<Pool>().unwrap();
            container
                .on_ending({
                    let log = log.clone();
                    move |_| {
                        log.lock().push("ending");
                        Ok(())
                    }
                });

            container.dispose_async().await.unwrap();
            assert_eq!(*log.lock(), vec!["ending", "pool"]);
            assert!(child.is_disposed());
        }

        #[test]
        #[traced_test]
        fn test_sync_dispose_of_async_component() {
            let log = ReleaseLog::default();
            let container = container(&log);
            let pool: Arc<Pool> = container.resolve().unwrap();

            assert!(matches!(
                container.dispose(),
                Err(DisposeErrorKind::ReleaseFailed { .. })
            ));
            assert!(pool.log.lock().is_empty());
        }
    }
}
