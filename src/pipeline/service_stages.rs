use alloc::vec;
use tracing::{debug, error};

use super::{registration_stages::activation_error, Next, PipelinePhase, ResolveMiddleware, ResolveRequest};
use crate::{
    cache::SlotState,
    context::ResolveContext,
    errors::ResolveErrorKind,
    registration::{Lifetime, Sharing},
};

/// Picks the scope that activates, shares and owns the instance.
pub(crate) struct ScopeSelectionMiddleware;

impl ResolveMiddleware for ScopeSelectionMiddleware {
    #[inline]
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::ScopeSelection
    }

    fn execute(&self, request: &mut ResolveRequest<'_>, next: Next<'_>) -> Result<(), ResolveErrorKind> {
        let activation_scope = match request.registration.lifetime() {
            Lifetime::CurrentScope => request.scope.clone(),
            Lifetime::Root => request.scope.registry_owner(request.registration.id()),
            Lifetime::MatchingScope(tags) => match request.scope.find_matching(tags) {
                Some(scope) => scope,
                None => {
                    let err = ResolveErrorKind::NoMatchingScope {
                        service: request.service.clone(),
                        tags: tags.clone(),
                    };
                    error!("{}", err);
                    return Err(err);
                }
            },
        };
        activation_scope.ensure_active()?;

        debug!(activation_scope = %activation_scope.id(), "Scope selected");
        request.activation_scope = activation_scope;
        next.run(request)
    }
}

/// Fails re-entrant requests for a (scope, registration) pair already in flight in this operation.
pub(crate) struct CycleDetectionMiddleware;

impl ResolveMiddleware for CycleDetectionMiddleware {
    #[inline]
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::CycleDetection
    }

    fn execute(&self, request: &mut ResolveRequest<'_>, next: Next<'_>) -> Result<(), ResolveErrorKind> {
        let operation = request.operation;
        let _frame = match operation.enter_frame(request.activation_scope.id(), request.registration.id(), &request.service) {
            Ok(frame) => frame,
            Err(err) => {
                error!("{}", err);
                return Err(err);
            }
        };
        next.run(request)
    }
}

/// Returns the activation scope's cached instance, or activates it once under the slot's lock.
/// A thread re-entering a slot it is still building gets a circular dependency error.
pub(crate) struct SharingMiddleware;

impl ResolveMiddleware for SharingMiddleware {
    #[inline]
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Sharing
    }

    fn execute(&self, request: &mut ResolveRequest<'_>, next: Next<'_>) -> Result<(), ResolveErrorKind> {
        if request.registration.sharing() == Sharing::None {
            return next.run(request);
        }

        let registration = request.registration.id();
        let slot = request.activation_scope.cache().slot(registration);
        let guard = slot.lock();

        let state = guard.borrow().clone();
        match state {
            SlotState::Ready(instance) => {
                debug!("Found in cache");
                request.instance = Some(instance);
                return Ok(());
            }
            // Re-entered from a separate operation on this thread, e.g. `Lazy::get` inside the factory
            SlotState::Building(building) => {
                let err = ResolveErrorKind::CircularDependency {
                    path: vec![building, request.service.clone()],
                };
                error!("{}", err);
                return Err(err);
            }
            SlotState::Empty => debug!("Not found in cache"),
        }

        *guard.borrow_mut() = SlotState::Building(request.service.clone());
        let result = next.run(request);

        let mut state = guard.borrow_mut();
        match (&result, request.instance.as_ref()) {
            (Ok(()), Some(instance)) => {
                *state = SlotState::Ready(instance.clone());
                request.activation_scope.cache().record_activation(registration);
                debug!("Cached");
            }
            _ => *state = SlotState::Empty,
        }
        result
    }
}

/// Applies the registered decorators of the service's type, in registration order.
pub(crate) struct DecorationMiddleware;

impl ResolveMiddleware for DecorationMiddleware {
    #[inline]
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Decoration
    }

    fn execute(&self, request: &mut ResolveRequest<'_>, next: Next<'_>) -> Result<(), ResolveErrorKind> {
        next.run(request)?;

        if request.service.is_wrapper() {
            return Ok(());
        }
        let decorators = request.activation_scope.registry().decorators_for(request.service.type_info());
        if decorators.is_empty() {
            return Ok(());
        }
        let Some(mut instance) = request.instance.take() else {
            return Ok(());
        };

        let context = ResolveContext::new(request.operation, &request.activation_scope, &request.parameters);
        for decorator in &decorators {
            instance = decorator
                .decorate(&context, instance)
                .map_err(|err| activation_error(&request.service, err))?;
        }
        debug!(count = decorators.len(), "Decorated");

        request.instance = Some(instance);
        Ok(())
    }
}
