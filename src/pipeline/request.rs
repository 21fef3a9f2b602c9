use alloc::{sync::Arc, vec::Vec};

use crate::{
    any::Instance, container::LifetimeScope, context::ResolveContext, operation::ResolveOperation,
    parameter::Parameter, registration::Registration, service::Service,
};

/// State of a single request flowing through the composed pipeline.
pub struct ResolveRequest<'a> {
    pub(crate) operation: &'a ResolveOperation,
    pub(crate) scope: LifetimeScope,
    pub(crate) activation_scope: LifetimeScope,
    pub(crate) service: Service,
    pub(crate) registration: Arc<Registration>,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) instance: Option<Instance>,
}

impl<'a> ResolveRequest<'a> {
    #[inline]
    #[must_use]
    pub(crate) fn new(
        operation: &'a ResolveOperation,
        scope: LifetimeScope,
        service: Service,
        registration: Arc<Registration>,
        parameters: Vec<Parameter>,
    ) -> Self {
        Self {
            operation,
            activation_scope: scope.clone(),
            scope,
            service,
            registration,
            parameters,
            instance: None,
        }
    }

    /// Scope the request was made from.
    #[inline]
    #[must_use]
    pub fn scope(&self) -> &LifetimeScope {
        &self.scope
    }

    /// Scope that activates, shares and tracks the instance. Chosen by scope selection.
    #[inline]
    #[must_use]
    pub fn activation_scope(&self) -> &LifetimeScope {
        &self.activation_scope
    }

    #[inline]
    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    #[inline]
    #[must_use]
    pub fn registration(&self) -> &Arc<Registration> {
        &self.registration
    }

    #[inline]
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    #[inline]
    pub fn parameters_mut(&mut self) -> &mut Vec<Parameter> {
        &mut self.parameters
    }

    #[inline]
    #[must_use]
    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    #[inline]
    pub fn set_instance(&mut self, instance: Instance) {
        self.instance = Some(instance);
    }

    #[inline]
    pub fn take_instance(&mut self) -> Option<Instance> {
        self.instance.take()
    }

    /// Context for resolving dependencies of this request's component.
    /// Nested requests join the same operation and see the request's parameters.
    #[inline]
    #[must_use]
    pub fn context(&self) -> ResolveContext<'_> {
        ResolveContext::new(self.operation, &self.activation_scope, &self.parameters)
    }
}
