use alloc::{boxed::Box, sync::Arc};

use crate::{any::Instance, disposer::ReleaseAction};

/// Typed release action run when the owning lifetime scope ends.
pub trait Finalizer<Dep>: Clone + Send + Sync + 'static {
    fn finalize(&mut self, dependency: Arc<Dep>);
}

impl<F, Dep> Finalizer<Dep> for F
where
    F: FnMut(Arc<Dep>) + Clone + Send + Sync + 'static,
{
    #[inline]
    fn finalize(&mut self, dependency: Arc<Dep>) {
        self(dependency);
    }
}

/// Turns an instance into the disposer entry that releases it.
pub(crate) type ReleaseFactory = Arc<dyn Fn(Instance) -> ReleaseAction + Send + Sync>;

#[must_use]
pub(crate) fn boxed_finalizer_factory<Dep, Fin>(finalizer: Fin) -> ReleaseFactory
where
    Dep: Send + Sync + 'static,
    Fin: Finalizer<Dep>,
{
    Arc::new(move |instance: Instance| {
        let mut finalizer = finalizer.clone();
        ReleaseAction::Sync(Box::new(move || {
            let dependency = instance
                .downcast::<Dep>()
                .map_err(|_| anyhow::anyhow!("Release action received an instance of another type"))?;
            finalizer.finalize(dependency);
            Ok(())
        }))
    })
}
