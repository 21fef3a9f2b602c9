use alloc::sync::Arc;
use core::any::type_name;

use super::{phase::PipelinePhase, request::ResolveRequest};
use crate::errors::ResolveErrorKind;

/// A single stage of the resolve pipeline.
///
/// A stage may act before calling `next`, after it returns, or both.
/// Not calling `next` short-circuits the rest of the pipeline.
pub trait ResolveMiddleware: Send + Sync + 'static {
    fn phase(&self) -> PipelinePhase;

    /// # Errors
    /// Any error aborts the pipeline and is returned to the caller of the resolve operation.
    fn execute(&self, request: &mut ResolveRequest<'_>, next: Next<'_>) -> Result<(), ResolveErrorKind>;

    #[must_use]
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

pub(crate) type BoxedMiddleware = Arc<dyn ResolveMiddleware>;

/// Remainder of the composed pipeline: the rest of the service stages followed by the registration stages.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    outer: &'a [BoxedMiddleware],
    inner: &'a [BoxedMiddleware],
}

impl<'a> Next<'a> {
    #[inline]
    #[must_use]
    pub(crate) const fn new(outer: &'a [BoxedMiddleware], inner: &'a [BoxedMiddleware]) -> Self {
        Self { outer, inner }
    }

    /// Runs the remaining stages.
    ///
    /// # Errors
    /// Returns the first error produced by a remaining stage.
    pub fn run(self, request: &mut ResolveRequest<'_>) -> Result<(), ResolveErrorKind> {
        if let Some((middleware, outer)) = self.outer.split_first() {
            return middleware.execute(request, Next { outer, inner: self.inner });
        }
        if let Some((middleware, inner)) = self.inner.split_first() {
            return middleware.execute(request, Next { outer: &[], inner });
        }
        Ok(())
    }
}

#[inline]
#[must_use]
pub fn middleware_fn<F>(phase: PipelinePhase, f: F) -> MiddlewareFn<F>
where
    F: Fn(&mut ResolveRequest<'_>, Next<'_>) -> Result<(), ResolveErrorKind> + Send + Sync + 'static,
{
    MiddlewareFn { phase, f }
}

#[derive(Clone)]
pub struct MiddlewareFn<F> {
    phase: PipelinePhase,
    f: F,
}

impl<F> ResolveMiddleware for MiddlewareFn<F>
where
    F: Fn(&mut ResolveRequest<'_>, Next<'_>) -> Result<(), ResolveErrorKind> + Send + Sync + 'static,
{
    #[inline]
    fn phase(&self) -> PipelinePhase {
        self.phase
    }

    #[inline]
    fn execute(&self, request: &mut ResolveRequest<'_>, next: Next<'_>) -> Result<(), ResolveErrorKind> {
        (self.f)(request, next)
    }
}
