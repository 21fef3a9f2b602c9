use alloc::sync::Arc;

use crate::{
    any::{Instance, TypeInfo},
    context::{downcast_instance, ResolveContext},
    errors::InstantiateErrorKind,
};

type DecorateFn = Arc<dyn Fn(&ResolveContext<'_>, Instance) -> Result<Instance, InstantiateErrorKind> + Send + Sync>;

/// Wraps every instance of one type produced for a typed or keyed service.
#[derive(Clone)]
pub(crate) struct Decorator {
    type_info: TypeInfo,
    decorate: DecorateFn,
}

impl Decorator {
    #[must_use]
    pub(crate) fn new<T, F>(decorate: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ResolveContext<'_>, Arc<T>) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self {
            type_info: TypeInfo::of::<T>(),
            decorate: decorate_fn(move |context, instance| {
                let instance = downcast_instance::<T>(instance)?;
                Ok(Arc::new(decorate(context, instance)?))
            }),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    pub(crate) fn decorate(&self, context: &ResolveContext<'_>, instance: Instance) -> Result<Instance, InstantiateErrorKind> {
        (self.decorate)(context, instance)
    }
}

#[inline]
fn decorate_fn<F>(decorate: F) -> DecorateFn
where
    F: Fn(&ResolveContext<'_>, Instance) -> Result<Instance, InstantiateErrorKind> + Send + Sync + 'static,
{
    Arc::new(decorate)
}
