use alloc::{sync::Arc, vec::Vec};

use super::{
    middleware::{BoxedMiddleware, Next, ResolveMiddleware},
    phase::{InsertionMode, PipelinePhase},
    request::ResolveRequest,
};
use crate::errors::ResolveErrorKind;

#[derive(Clone, Default)]
pub struct ResolvePipelineBuilder {
    middlewares: Vec<BoxedMiddleware>,
}

impl ResolvePipelineBuilder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the middleware keeping the list ordered by phase.
    pub fn use_middleware(&mut self, middleware: impl ResolveMiddleware, mode: InsertionMode) -> &mut Self {
        self.use_boxed(Arc::new(middleware), mode)
    }

    pub(crate) fn use_boxed(&mut self, middleware: BoxedMiddleware, mode: InsertionMode) -> &mut Self {
        let phase = middleware.phase();
        let index = match mode {
            InsertionMode::StartOfPhase => self.middlewares.iter().position(|existing| existing.phase() >= phase),
            InsertionMode::EndOfPhase => self.middlewares.iter().position(|existing| existing.phase() > phase),
        }
        .unwrap_or(self.middlewares.len());

        self.middlewares.insert(index, middleware);
        self
    }

    #[inline]
    pub(crate) fn extend(&mut self, other: &ResolvePipeline) -> &mut Self {
        for middleware in other.middlewares() {
            self.use_boxed(middleware.clone(), InsertionMode::EndOfPhase);
        }
        self
    }

    /// Appends the middleware after every other one, regardless of phase ordering.
    #[inline]
    pub(crate) fn push_terminal(&mut self, middleware: BoxedMiddleware) -> &mut Self {
        self.middlewares.push(middleware);
        self
    }

    #[inline]
    #[must_use]
    pub fn build(self) -> ResolvePipeline {
        ResolvePipeline {
            middlewares: self.middlewares.into(),
        }
    }
}

#[derive(Clone)]
pub struct ResolvePipeline {
    middlewares: Arc<[BoxedMiddleware]>,
}

impl Default for ResolvePipeline {
    fn default() -> Self {
        ResolvePipelineBuilder::new().build()
    }
}

impl ResolvePipeline {
    /// Runs only this pipeline's stages against the request.
    ///
    /// # Errors
    /// Returns the first error produced by a stage.
    #[inline]
    pub fn invoke(&self, request: &mut ResolveRequest<'_>) -> Result<(), ResolveErrorKind> {
        Next::new(&self.middlewares, &[]).run(request)
    }

    #[inline]
    #[must_use]
    pub(crate) fn middlewares(&self) -> &[BoxedMiddleware] {
        &self.middlewares
    }

    #[inline]
    #[must_use]
    pub fn phases(&self) -> Vec<PipelinePhase> {
        self.middlewares.iter().map(|middleware| middleware.phase()).collect()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}
