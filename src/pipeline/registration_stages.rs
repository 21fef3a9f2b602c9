use alloc::{boxed::Box, sync::Arc, vec::Vec};
use tracing::{debug, error};

use super::{Next, PipelinePhase, ResolveMiddleware, ResolveRequest};
use crate::{
    context::ResolveContext,
    errors::{InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind},
    operation::Completion,
    registration::{ActivatedHandler, ActivatingHandler, PreparingEvent, PreparingHandler},
    service::Service,
};

/// Factory failures get the service as context, nested resolution failures pass through unchanged.
pub(crate) fn activation_error(service: &Service, err: InstantiateErrorKind) -> ResolveErrorKind {
    match err {
        InstantiateErrorKind::Resolve(err) => *err,
        source => ResolveErrorKind::Activation {
            service: service.clone(),
            source,
        },
    }
}

pub(crate) struct PreparingMiddleware {
    handlers: Arc<[PreparingHandler]>,
}

impl PreparingMiddleware {
    #[inline]
    #[must_use]
    pub(crate) fn new(handlers: Vec<PreparingHandler>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }
}

impl ResolveMiddleware for PreparingMiddleware {
    #[inline]
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::ParameterSelection
    }

    fn execute(&self, request: &mut ResolveRequest<'_>, next: Next<'_>) -> Result<(), ResolveErrorKind> {
        {
            let mut event = PreparingEvent {
                service: &request.service,
                registration: &request.registration,
                parameters: &mut request.parameters,
            };
            for handler in self.handlers.iter() {
                handler(&mut event);
            }
        }
        next.run(request)
    }
}

/// Queues the activated handlers once the instance is fully built.
pub(crate) struct ActivatedMiddleware {
    handlers: Arc<[ActivatedHandler]>,
}

impl ActivatedMiddleware {
    #[inline]
    #[must_use]
    pub(crate) fn new(handlers: Vec<ActivatedHandler>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }
}

impl ResolveMiddleware for ActivatedMiddleware {
    #[inline]
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Activation
    }

    fn execute(&self, request: &mut ResolveRequest<'_>, next: Next<'_>) -> Result<(), ResolveErrorKind> {
        next.run(request)?;

        let Some(instance) = request.instance.clone() else {
            return Ok(());
        };
        let handlers = self.handlers.clone();
        let service = request.service.clone();

        request.operation.enqueue_completion(Completion {
            scope: request.activation_scope.clone(),
            service: request.service.clone(),
            run: Box::new(move |context: &ResolveContext<'_>| {
                let mut first_err = None;
                for handler in handlers.iter() {
                    if let Err(err) = handler(*context, &service, &instance) {
                        if first_err.is_none() {
                            first_err = Some(err);
                        } else {
                            error!("{}", err);
                        }
                    }
                }
                match first_err {
                    Some(err) => Err(err),
                    None => Ok(()),
                }
            }),
        });
        debug!("Activated handlers queued");
        Ok(())
    }
}

/// Hands the produced instance to the activation scope's disposer, including when an inner stage failed after producing it.
pub(crate) struct DisposalTrackingMiddleware;

impl ResolveMiddleware for DisposalTrackingMiddleware {
    #[inline]
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Activation
    }

    fn execute(&self, request: &mut ResolveRequest<'_>, next: Next<'_>) -> Result<(), ResolveErrorKind> {
        let result = next.run(request);

        if request.registration.released_eagerly() {
            // Already tracked unless it came from a source after the owning scope was created
            request
                .activation_scope
                .registry_owner(request.registration.id())
                .track_provided(&request.registration);
            return result;
        }
        let Some(action) = request
            .instance
            .as_ref()
            .and_then(|instance| request.registration.release_action(instance))
        else {
            return result;
        };

        match request.activation_scope.disposer().track(action) {
            Ok(()) => {
                debug!("Tracked for disposal");
                result
            }
            Err(action) => {
                // The scope ended while activating: release right away instead of leaking
                if let Err(err) = action.run() {
                    error!("{:#}", err);
                }
                let err = ResolveErrorKind::Disposed {
                    scope: request.activation_scope.id(),
                };
                error!("{}", err);
                Err(err)
            }
        }
    }
}

pub(crate) struct ActivatingMiddleware {
    handlers: Arc<[ActivatingHandler]>,
}

impl ActivatingMiddleware {
    #[inline]
    #[must_use]
    pub(crate) fn new(handlers: Vec<ActivatingHandler>) -> Self {
        Self {
            handlers: handlers.into(),
        }
    }
}

impl ResolveMiddleware for ActivatingMiddleware {
    #[inline]
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Activation
    }

    fn execute(&self, request: &mut ResolveRequest<'_>, next: Next<'_>) -> Result<(), ResolveErrorKind> {
        next.run(request)?;

        let Some(mut instance) = request.instance.take() else {
            return Ok(());
        };
        let result = {
            let context = ResolveContext::new(request.operation, &request.activation_scope, &request.parameters);
            self.handlers
                .iter()
                .try_for_each(|handler| handler(context, &request.service, &mut instance))
        };
        // Put back even on failure, so the instance is still tracked for disposal
        request.instance = Some(instance);

        result.map_err(|err| activation_error(&request.service, err))
    }
}

/// Innermost stage: runs the registration's activator.
pub(crate) struct ActivatorMiddleware;

impl ResolveMiddleware for ActivatorMiddleware {
    #[inline]
    fn phase(&self) -> PipelinePhase {
        PipelinePhase::Activation
    }

    fn execute(&self, request: &mut ResolveRequest<'_>, next: Next<'_>) -> Result<(), ResolveErrorKind> {
        let registration = request.registration.clone();
        let result = registration.activator().activate(&request.context());

        match result {
            Ok(instance) => {
                request.instance = Some(instance);
                next.run(request)
            }
            Err(InstantiatorErrorKind::Deps(err)) => Err(err),
            Err(InstantiatorErrorKind::Factory(err)) => {
                let err = activation_error(&request.service, err);
                error!("{}", err);
                Err(err)
            }
        }
    }
}
