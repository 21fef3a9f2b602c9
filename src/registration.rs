mod builder;
mod events;

use alloc::{borrow::Cow, collections::BTreeMap, sync::Arc, vec::Vec};
use core::{
    fmt::{self, Debug, Display, Formatter},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    activator::Activator,
    any::{Instance, TypeInfo},
    disposer::ReleaseAction,
    finalizer::ReleaseFactory,
    pipeline::ResolvePipeline,
    scope::ScopeTag,
    service::Service,
};

pub use builder::RegistrationBuilder;
pub(crate) use events::{ActivatedHandler, ActivatingHandler, PreparingHandler};
pub use events::{ActivatedEvent, ActivatingEvent, PreparingEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegistrationId(u64);

impl RegistrationId {
    #[must_use]
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);

        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for RegistrationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which lifetime scope activates and owns an instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lifetime {
    /// The scope whose registry layer holds the registration: the root for container registrations.
    Root,
    /// The scope the request was made from.
    CurrentScope,
    /// The nearest enclosing scope carrying one of the tags.
    MatchingScope(Vec<ScopeTag>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sharing {
    Shared,
    None,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    OwnedByLifetimeScope,
    ExternallyOwned,
}

/// Immutable key-value data attached to a registration.
#[derive(Clone, Default)]
pub struct Metadata(BTreeMap<Cow<'static, str>, Instance>);

impl Metadata {
    #[inline]
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        self.0.get(key).and_then(|value| value.clone().downcast().ok())
    }

    #[inline]
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub(crate) fn insert(&mut self, key: Cow<'static, str>, value: Instance) {
        self.0.insert(key, value);
    }
}

impl Debug for Metadata {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RegistrationOptions {
    pub(crate) preserve_existing_defaults: bool,
    pub(crate) auto_activate: bool,
    pub(crate) adapter: bool,
}

impl RegistrationOptions {
    /// Registration never replaces an earlier default for its services.
    #[inline]
    #[must_use]
    pub fn preserve_existing_defaults(&self) -> bool {
        self.preserve_existing_defaults
    }

    /// Registration is resolved once when the container is built.
    #[inline]
    #[must_use]
    pub fn auto_activate(&self) -> bool {
        self.auto_activate
    }

    /// Registration was produced by a source adapting other registrations.
    /// Such registrations aren't inherited by child registry layers.
    #[inline]
    #[must_use]
    pub fn adapter(&self) -> bool {
        self.adapter
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReleaseKind {
    /// Component's own disposal, honouring ownership.
    Dispose,
    /// Explicit release action, run even for externally owned components.
    OnRelease,
}

#[derive(Clone)]
pub(crate) struct Release {
    pub(crate) kind: ReleaseKind,
    pub(crate) factory: ReleaseFactory,
}

/// Immutable description of how to build a component and under which policies.
pub struct Registration {
    id: RegistrationId,
    activator: Arc<dyn Activator>,
    lifetime: Lifetime,
    sharing: Sharing,
    ownership: Ownership,
    services: Vec<Service>,
    metadata: Metadata,
    options: RegistrationOptions,
    release: Option<Release>,
    pipeline: ResolvePipeline,
}

impl Registration {
    #[inline]
    #[must_use]
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn activator(&self) -> &dyn Activator {
        &*self.activator
    }

    /// Most specific type the activator produces.
    #[inline]
    #[must_use]
    pub fn limit_type(&self) -> TypeInfo {
        self.activator.limit_type()
    }

    #[inline]
    #[must_use]
    pub fn lifetime(&self) -> &Lifetime {
        &self.lifetime
    }

    #[inline]
    #[must_use]
    pub fn sharing(&self) -> Sharing {
        self.sharing
    }

    #[inline]
    #[must_use]
    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    #[inline]
    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[inline]
    #[must_use]
    pub fn options(&self) -> &RegistrationOptions {
        &self.options
    }

    #[inline]
    #[must_use]
    pub fn pipeline(&self) -> &ResolvePipeline {
        &self.pipeline
    }

    #[inline]
    #[must_use]
    pub(crate) fn tracks_release(&self) -> bool {
        match &self.release {
            Some(Release {
                kind: ReleaseKind::OnRelease,
                ..
            }) => true,
            Some(Release {
                kind: ReleaseKind::Dispose, ..
            }) => self.ownership == Ownership::OwnedByLifetimeScope,
            None => false,
        }
    }

    /// Provided instances with a release action are tracked when their scope is created, not on activation.
    #[inline]
    #[must_use]
    pub(crate) fn released_eagerly(&self) -> bool {
        self.activator.provided_instance().is_some() && self.tracks_release()
    }

    #[must_use]
    pub(crate) fn release_action(&self, instance: &Instance) -> Option<ReleaseAction> {
        if !self.tracks_release() {
            return None;
        }
        self.release.as_ref().map(|release| (release.factory)(instance.clone()))
    }
}

impl Debug for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("limit_type", &self.limit_type().name)
            .field("services", &self.services)
            .field("lifetime", &self.lifetime)
            .field("sharing", &self.sharing)
            .field("ownership", &self.ownership)
            .field("metadata", &self.metadata)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Display for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.limit_type(), self.id)
    }
}
