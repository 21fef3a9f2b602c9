use alloc::{sync::Arc, vec::Vec};
use core::any::type_name;
use tracing::{debug, debug_span};

use crate::{context::ResolveContext, dependency_resolver::DependencyResolver, errors::ResolveErrorKind};

/// Resolves `Dep`, preferring a typed parameter of the request over the container.
pub struct Inject<Dep>(pub Arc<Dep>);

impl<Dep: Send + Sync + 'static> DependencyResolver for Inject<Dep> {
    type Error = ResolveErrorKind;

    fn resolve(context: &ResolveContext<'_>) -> Result<Self, Self::Error> {
        let span = debug_span!("inject", dependency = type_name::<Dep>());
        let _guard = span.enter();

        if let Some(dependency) = context.parameter::<Dep>() {
            debug!("Found in parameters");
            return Ok(Self(dependency));
        }
        context.resolve().map(Self)
    }
}

/// Resolves every registration of `Dep`, in registration order.
pub struct InjectAll<Dep>(pub Vec<Arc<Dep>>);

impl<Dep: Send + Sync + 'static> DependencyResolver for InjectAll<Dep> {
    type Error = ResolveErrorKind;

    #[inline]
    fn resolve(context: &ResolveContext<'_>) -> Result<Self, Self::Error> {
        context.resolve_all().map(Self)
    }
}

/// Resolves `Dep` if it's registered.
pub struct InjectOptional<Dep>(pub Option<Arc<Dep>>);

impl<Dep: Send + Sync + 'static> DependencyResolver for InjectOptional<Dep> {
    type Error = ResolveErrorKind;

    fn resolve(context: &ResolveContext<'_>) -> Result<Self, Self::Error> {
        if let Some(dependency) = context.parameter::<Dep>() {
            return Ok(Self(Some(dependency)));
        }
        context.try_resolve().map(Self)
    }
}
