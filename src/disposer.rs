use alloc::{boxed::Box, sync::Arc, vec::Vec};
use parking_lot::Mutex;
use tracing::{debug, error};

#[cfg(feature = "async")]
use core::{future::Future, pin::Pin};

use crate::{any::Instance, finalizer::ReleaseFactory};

/// Component that releases resources when its owning lifetime scope ends.
pub trait Dispose: Send + Sync + 'static {
    /// # Errors
    /// The error is collected into [`crate::DisposeErrorKind::ReleaseFailed`]; remaining components are still released.
    fn dispose(&self) -> anyhow::Result<()>;
}

/// Component that releases resources asynchronously.
/// Only [`crate::LifetimeScope::dispose_async`] can release it.
#[cfg(feature = "async")]
pub trait AsyncDispose: Send + Sync + 'static {
    /// # Errors
    /// The error is collected into [`crate::DisposeErrorKind::ReleaseFailed`]; remaining components are still released.
    fn dispose_async(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

#[cfg(feature = "async")]
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

pub(crate) enum ReleaseAction {
    Sync(Box<dyn FnOnce() -> anyhow::Result<()> + Send>),
    #[cfg(feature = "async")]
    Async(Box<dyn FnOnce() -> BoxFuture + Send>),
}

impl ReleaseAction {
    /// Runs a synchronous action. Asynchronous ones can't be run here and are reported as failures.
    pub(crate) fn run(self) -> anyhow::Result<()> {
        match self {
            Self::Sync(action) => action(),
            #[cfg(feature = "async")]
            Self::Async(_) => Err(anyhow::anyhow!(
                "Component requires asynchronous disposal, dispose the scope with `dispose_async`"
            )),
        }
    }

    #[cfg(feature = "async")]
    pub(crate) async fn run_async(self) -> anyhow::Result<()> {
        match self {
            Self::Sync(action) => action(),
            Self::Async(action) => action().await,
        }
    }
}

#[must_use]
pub(crate) fn dispose_factory<T: Dispose>() -> ReleaseFactory {
    Arc::new(|instance: Instance| {
        ReleaseAction::Sync(Box::new(move || {
            let component = instance
                .downcast::<T>()
                .map_err(|_| anyhow::anyhow!("Release action received an instance of another type"))?;
            component.dispose()
        }))
    })
}

#[cfg(feature = "async")]
#[must_use]
pub(crate) fn async_dispose_factory<T: AsyncDispose>() -> ReleaseFactory {
    Arc::new(|instance: Instance| {
        ReleaseAction::Async(Box::new(move || -> BoxFuture {
            Box::pin(async move {
                let component = instance
                    .downcast::<T>()
                    .map_err(|_| anyhow::anyhow!("Release action received an instance of another type"))?;
                component.dispose_async().await
            })
        }))
    })
}

#[derive(Default)]
struct DisposerState {
    entries: Vec<ReleaseAction>,
    closed: bool,
}

/// Release actions of one lifetime scope, run in reverse order of tracking.
#[derive(Default)]
pub(crate) struct Disposer {
    state: Mutex<DisposerState>,
}

impl Disposer {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Tracks the action until disposal.
    ///
    /// # Errors
    /// Hands the action back if the disposer is already closed.
    pub(crate) fn track(&self, action: ReleaseAction) -> Result<(), ReleaseAction> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(action);
        }
        state.entries.push(action);
        Ok(())
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Closes the disposer and takes its entries. Later calls get nothing.
    fn close(&self) -> Vec<ReleaseAction> {
        let mut state = self.state.lock();
        state.closed = true;
        core::mem::take(&mut state.entries)
    }

    /// Runs every tracked action LIFO, collecting failures instead of stopping at the first one.
    pub(crate) fn dispose(&self) -> Vec<anyhow::Error> {
        let mut entries = self.close();
        let mut errors = Vec::new();

        while let Some(action) = entries.pop() {
            if let Err(err) = action.run() {
                error!("{:#}", err);
                errors.push(err);
            }
        }
        debug!(failed = errors.len(), "Disposer closed");
        errors
    }

    #[cfg(feature = "async")]
    pub(crate) async fn dispose_async(&self) -> Vec<anyhow::Error> {
        let mut entries = self.close();
        let mut errors = Vec::new();

        while let Some(action) = entries.pop() {
            if let Err(err) = action.run_async().await {
                error!("{:#}", err);
                errors.push(err);
            }
        }
        debug!(failed = errors.len(), "Disposer closed");
        errors
    }
}
