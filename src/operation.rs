use alloc::{boxed::Box, collections::VecDeque, sync::Arc, vec::Vec};
use core::cell::{Cell, RefCell};
use tracing::{debug, error, info_span};

use crate::{
    any::Instance,
    container::LifetimeScope,
    context::ResolveContext,
    errors::{InstantiateErrorKind, ResolveErrorKind},
    parameter::Parameter,
    pipeline::{Next, ResolveRequest},
    registration::{Registration, RegistrationId},
    scope::ScopeId,
    service::Service,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OperationState {
    Idle,
    InProgress,
    Succeeded,
    Failed,
}

struct Frame {
    scope: ScopeId,
    registration: RegistrationId,
    service: Service,
}

pub(crate) type CompletionFn = Box<dyn for<'c> FnOnce(&ResolveContext<'c>) -> Result<(), InstantiateErrorKind>>;

/// Activated handlers of one instance, deferred until the outermost request finishes.
pub(crate) struct Completion {
    pub(crate) scope: LifetimeScope,
    pub(crate) service: Service,
    pub(crate) run: CompletionFn,
}

/// One top-level resolve call together with every nested request it triggers.
///
/// Confined to the calling thread: nested requests and completion handlers share it through
/// [`ResolveContext`], so frames and completions live in plain cells.
pub(crate) struct ResolveOperation {
    stack: RefCell<Vec<Frame>>,
    completions: RefCell<VecDeque<Completion>>,
    state: Cell<OperationState>,
    max_depth: usize,
}

impl ResolveOperation {
    #[inline]
    #[must_use]
    pub(crate) const fn new(max_depth: usize) -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
            completions: RefCell::new(VecDeque::new()),
            state: Cell::new(OperationState::Idle),
            max_depth,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn state(&self) -> OperationState {
        self.state.get()
    }

    /// Resolves the service's default registration as a new operation.
    pub(crate) fn execute(scope: &LifetimeScope, service: &Service, parameters: Vec<Parameter>) -> Result<Instance, ResolveErrorKind> {
        let operation = Self::new(scope.config().max_resolve_depth);
        operation.run(|operation| operation.resolve_service(scope, service, parameters))
    }

    /// Resolves exactly the given registration as a new operation.
    pub(crate) fn execute_registration(
        scope: &LifetimeScope,
        service: Service,
        registration: Arc<Registration>,
    ) -> Result<Instance, ResolveErrorKind> {
        let operation = Self::new(scope.config().max_resolve_depth);
        operation.run(|operation| operation.execute_request(scope, service, registration, Vec::new()))
    }

    fn run(&self, resolve: impl FnOnce(&Self) -> Result<Instance, ResolveErrorKind>) -> Result<Instance, ResolveErrorKind> {
        self.state.set(OperationState::InProgress);

        let result = resolve(self).and_then(|instance| self.complete().map(|()| instance));
        match &result {
            Ok(_) => self.state.set(OperationState::Succeeded),
            Err(err) => {
                self.state.set(OperationState::Failed);
                error!("{}", err);
            }
        }
        debug!(state = ?self.state(), "Operation finished");
        result
    }

    pub(crate) fn resolve_service(
        &self,
        scope: &LifetimeScope,
        service: &Service,
        parameters: Vec<Parameter>,
    ) -> Result<Instance, ResolveErrorKind> {
        scope.ensure_active()?;

        let Some(registration) = scope.registry().try_get_registration(service) else {
            let err = ResolveErrorKind::NoRegistration { service: service.clone() };
            debug!("{}", err);
            return Err(err);
        };
        self.execute_request(scope, service.clone(), registration, parameters)
    }

    pub(crate) fn execute_request(
        &self,
        scope: &LifetimeScope,
        service: Service,
        registration: Arc<Registration>,
        parameters: Vec<Parameter>,
    ) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!(
            "resolve",
            %service,
            registration = %registration.id(),
            scope = %scope.id(),
            depth = self.depth()
        );
        let _guard = span.enter();

        let service_pipeline = scope.registry().service_pipeline(&service);
        let registration_pipeline = registration.pipeline().clone();

        let mut request = ResolveRequest::new(self, scope.clone(), service, registration, parameters);
        Next::new(service_pipeline.middlewares(), registration_pipeline.middlewares()).run(&mut request)?;

        match request.take_instance() {
            Some(instance) => Ok(instance),
            None => Err(ResolveErrorKind::Activation {
                service: request.service,
                source: InstantiateErrorKind::Custom(anyhow::anyhow!("Resolve pipeline completed without an instance")),
            }),
        }
    }

    /// Pushes a frame for the request, failing on a repeated (scope, registration) pair or on excess depth.
    /// The frame is popped when the guard drops.
    pub(crate) fn enter_frame(
        &self,
        scope: ScopeId,
        registration: RegistrationId,
        service: &Service,
    ) -> Result<FrameGuard<'_>, ResolveErrorKind> {
        let mut stack = self.stack.borrow_mut();

        if let Some(start) = stack
            .iter()
            .position(|frame| frame.scope == scope && frame.registration == registration)
        {
            let mut path: Vec<Service> = stack[start..].iter().map(|frame| frame.service.clone()).collect();
            path.push(service.clone());
            return Err(ResolveErrorKind::CircularDependency { path });
        }
        if stack.len() >= self.max_depth {
            return Err(ResolveErrorKind::MaxDepthExceeded {
                depth: self.max_depth,
                service: service.clone(),
            });
        }

        stack.push(Frame {
            scope,
            registration,
            service: service.clone(),
        });
        Ok(FrameGuard { operation: self })
    }

    #[inline]
    #[must_use]
    pub(crate) fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    #[inline]
    pub(crate) fn enqueue_completion(&self, completion: Completion) {
        self.completions.borrow_mut().push_back(completion);
    }

    /// Runs queued completions in FIFO order, including ones enqueued by the handlers themselves.
    /// Every completion runs; the first failure is returned and later ones are logged.
    fn complete(&self) -> Result<(), ResolveErrorKind> {
        let mut first_err = None;

        loop {
            let Some(Completion { scope, service, run }) = self.completions.borrow_mut().pop_front() else {
                break;
            };

            let context = ResolveContext::new(self, &scope, &[]);
            if let Err(source) = run(&context) {
                let err = ResolveErrorKind::Completion { service, source };
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
    }
}

pub(crate) struct FrameGuard<'a> {
    operation: &'a ResolveOperation,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.operation.stack.borrow_mut().pop();
    }
}
