use alloc::{sync::Arc, vec::Vec};
use core::marker::PhantomData;

use super::Registration;
use crate::{
    any::Instance, context::ResolveContext, errors::InstantiateErrorKind, parameter::Parameter, service::Service,
};

pub(crate) type PreparingHandler = Arc<dyn Fn(&mut PreparingEvent<'_>) + Send + Sync>;
pub(crate) type ActivatingHandler =
    Arc<dyn Fn(ResolveContext<'_>, &Service, &mut Instance) -> Result<(), InstantiateErrorKind> + Send + Sync>;
pub(crate) type ActivatedHandler =
    Arc<dyn Fn(ResolveContext<'_>, &Service, &Instance) -> Result<(), InstantiateErrorKind> + Send + Sync>;

#[inline]
#[must_use]
pub(crate) fn activating_handler<F>(handler: F) -> ActivatingHandler
where
    F: Fn(ResolveContext<'_>, &Service, &mut Instance) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
{
    Arc::new(handler)
}

#[inline]
#[must_use]
pub(crate) fn activated_handler<F>(handler: F) -> ActivatedHandler
where
    F: Fn(ResolveContext<'_>, &Service, &Instance) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
{
    Arc::new(handler)
}

/// Raised before activation. Handlers may change the parameters the activator sees.
pub struct PreparingEvent<'a> {
    pub(crate) service: &'a Service,
    pub(crate) registration: &'a Registration,
    pub(crate) parameters: &'a mut Vec<Parameter>,
}

impl PreparingEvent<'_> {
    #[inline]
    #[must_use]
    pub fn service(&self) -> &Service {
        self.service
    }

    #[inline]
    #[must_use]
    pub fn registration(&self) -> &Registration {
        self.registration
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        self.parameters
    }

    #[inline]
    pub fn parameters_mut(&mut self) -> &mut Vec<Parameter> {
        self.parameters
    }
}

/// Raised right after activation, before the instance is shared or decorated.
pub struct ActivatingEvent<'a, T> {
    pub(crate) context: ResolveContext<'a>,
    pub(crate) service: &'a Service,
    pub(crate) instance: &'a mut Instance,
    pub(crate) _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Send + Sync + 'static> ActivatingEvent<'a, T> {
    #[inline]
    #[must_use]
    pub fn context(&self) -> &ResolveContext<'a> {
        &self.context
    }

    #[inline]
    #[must_use]
    pub fn service(&self) -> &Service {
        self.service
    }

    #[inline]
    #[must_use]
    pub fn instance(&self) -> Option<Arc<T>> {
        self.instance.clone().downcast().ok()
    }

    /// Mutable access for property injection.
    /// `None` when something else already holds the instance, as with provided instances.
    #[inline]
    #[must_use]
    pub fn instance_mut(&mut self) -> Option<&mut T> {
        Arc::get_mut(self.instance)?.downcast_mut()
    }

    /// Substitutes the instance. The replacement is what gets tracked, shared and returned.
    #[inline]
    pub fn replace_instance(&mut self, instance: T) {
        *self.instance = Arc::new(instance);
    }
}

/// Raised once the whole resolve operation succeeded.
pub struct ActivatedEvent<'a, T> {
    pub(crate) context: ResolveContext<'a>,
    pub(crate) service: &'a Service,
    pub(crate) instance: Arc<T>,
}

impl<'a, T> ActivatedEvent<'a, T> {
    /// Context joined to the finished operation; resolving through it is allowed.
    #[inline]
    #[must_use]
    pub fn context(&self) -> &ResolveContext<'a> {
        &self.context
    }

    #[inline]
    #[must_use]
    pub fn service(&self) -> &Service {
        self.service
    }

    #[inline]
    #[must_use]
    pub fn instance(&self) -> &Arc<T> {
        &self.instance
    }
}
