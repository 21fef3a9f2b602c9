use alloc::boxed::Box;

use super::dependency_resolver::ResolveErrorKind;

/// Failure raised by user construction logic: factories, hooks and release actions.
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    /// A nested resolution failed; it is propagated to the caller unchanged.
    #[error(transparent)]
    Resolve(Box<ResolveErrorKind>),
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

impl From<ResolveErrorKind> for InstantiateErrorKind {
    #[inline]
    fn from(err: ResolveErrorKind) -> Self {
        Self::Resolve(Box::new(err))
    }
}
