use alloc::vec::Vec;

use crate::scope::{ScopeId, ScopeTag};

#[derive(thiserror::Error, Debug)]
pub enum ScopeErrorKind {
    #[error("Scope tag `{tag}` is already used by an enclosing scope")]
    DuplicateTag { tag: ScopeTag },
    #[error("Lifetime scope {scope} has been disposed, child scopes can't be created")]
    Disposed { scope: ScopeId },
}

#[derive(thiserror::Error, Debug)]
pub enum DisposeErrorKind {
    #[error("{} release action(s) failed while disposing lifetime scope {scope}", errors.len())]
    ReleaseFailed { scope: ScopeId, errors: Vec<anyhow::Error> },
}
