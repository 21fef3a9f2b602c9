use alloc::sync::Arc;
use core::marker::PhantomData;
use tracing::debug;

use crate::{
    any::{Instance, TypeInfo},
    context::ResolveContext,
    dependency_resolver::DependencyResolver,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    instantiator::Instantiator,
};

pub type ActivatorResult = Result<Instance, InstantiatorErrorKind<ResolveErrorKind, InstantiateErrorKind>>;

/// Strategy producing an instance for a registration.
pub trait Activator: Send + Sync + 'static {
    fn limit_type(&self) -> TypeInfo;

    /// # Errors
    /// - [`InstantiatorErrorKind::Deps`] if a dependency can't be resolved; it's propagated unchanged.
    /// - [`InstantiatorErrorKind::Factory`] if the construction logic itself fails.
    fn activate(&self, context: &ResolveContext<'_>) -> ActivatorResult;

    /// Instance handed over at registration time, if this activator only returns it.
    #[inline]
    fn provided_instance(&self) -> Option<&Instance> {
        None
    }
}

/// Activates by resolving the instantiator's argument list from the container.
pub(crate) struct InstantiatorActivator<Inst, Deps> {
    instantiator: Inst,
    _deps: PhantomData<fn() -> Deps>,
}

impl<Inst, Deps> InstantiatorActivator<Inst, Deps> {
    #[inline]
    #[must_use]
    pub(crate) const fn new(instantiator: Inst) -> Self {
        Self {
            instantiator,
            _deps: PhantomData,
        }
    }
}

impl<Inst, Deps> Activator for InstantiatorActivator<Inst, Deps>
where
    Inst: Instantiator<Deps> + Send + Sync,
    Inst::Provides: Send + Sync,
    Deps: DependencyResolver + 'static,
{
    #[inline]
    fn limit_type(&self) -> TypeInfo {
        TypeInfo::of::<Inst::Provides>()
    }

    fn activate(&self, context: &ResolveContext<'_>) -> ActivatorResult {
        let dependencies = match Deps::resolve(context) {
            Ok(dependencies) => dependencies,
            Err(err) => return Err(InstantiatorErrorKind::Deps(err.into())),
        };
        let dependency = match self.instantiator.clone().instantiate(dependencies) {
            Ok(dependency) => dependency,
            Err(err) => return Err(InstantiatorErrorKind::Factory(err.into())),
        };

        debug!("Activated");

        Ok(Arc::new(dependency))
    }
}

/// Activates through a factory receiving the resolve context.
pub(crate) struct DelegateActivator<F, T> {
    factory: F,
    _provides: PhantomData<fn() -> T>,
}

impl<F, T> DelegateActivator<F, T> {
    #[inline]
    #[must_use]
    pub(crate) const fn new(factory: F) -> Self {
        Self {
            factory,
            _provides: PhantomData,
        }
    }
}

impl<F, T> Activator for DelegateActivator<F, T>
where
    F: Fn(&ResolveContext<'_>) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    #[inline]
    fn limit_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn activate(&self, context: &ResolveContext<'_>) -> ActivatorResult {
        match (self.factory)(context) {
            Ok(dependency) => {
                debug!("Activated");
                Ok(Arc::new(dependency))
            }
            // Nested resolution failures aren't this factory's own failure
            Err(InstantiateErrorKind::Resolve(err)) => Err(InstantiatorErrorKind::Deps(*err)),
            Err(err) => Err(InstantiatorErrorKind::Factory(err)),
        }
    }
}

pub(crate) struct ProvidedInstanceActivator {
    instance: Instance,
    type_info: TypeInfo,
}

impl ProvidedInstanceActivator {
    #[inline]
    #[must_use]
    pub(crate) fn new<T: Send + Sync + 'static>(instance: T) -> Self {
        Self {
            instance: Arc::new(instance),
            type_info: TypeInfo::of::<T>(),
        }
    }
}

impl Activator for ProvidedInstanceActivator {
    #[inline]
    fn limit_type(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    fn activate(&self, _context: &ResolveContext<'_>) -> ActivatorResult {
        Ok(self.instance.clone())
    }

    #[inline]
    fn provided_instance(&self) -> Option<&Instance> {
        Some(&self.instance)
    }
}
