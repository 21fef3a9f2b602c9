use alloc::vec::Vec;
use core::{
    any::TypeId,
    fmt::{self, Display, Formatter},
};

use super::instantiate::InstantiateErrorKind;
use crate::{
    any::TypeInfo,
    scope::{ScopeId, ScopeTag},
    service::Service,
};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No registration found for service {service}")]
    NoRegistration { service: Service },
    #[error("Circular dependency detected: {}", Joined(path.as_slice(), " -> "))]
    CircularDependency { path: Vec<Service> },
    #[error(
        "\
        No scope with a tag matching [{}] is visible from the scope in which {service} was requested. \
        Resolve it from a scope tagged with one of these tags or from one of its descendants\
        ",
        Joined(tags.as_slice(), ", "),
    )]
    NoMatchingScope { service: Service, tags: Vec<ScopeTag> },
    #[error("Lifetime scope {scope} has been disposed, no further resolution is possible")]
    Disposed { scope: ScopeId },
    #[error("Activation of {service} failed: {source}")]
    Activation {
        service: Service,
        #[source]
        source: InstantiateErrorKind,
    },
    #[error("Activated handler of {service} failed: {source}")]
    Completion {
        service: Service,
        #[source]
        source: InstantiateErrorKind,
    },
    #[error("Maximum resolve depth {depth} exceeded while resolving {service}. This usually means a runaway dependency chain")]
    MaxDepthExceeded { depth: usize, service: Service },
    #[error("Incorrect instance type. Actual: {actual:?}, expected: {}", expected.name)]
    IncorrectType { expected: TypeInfo, actual: TypeId },
}

impl ResolveErrorKind {
    /// Strips the nesting added by factories propagating errors of their own dependencies.
    #[must_use]
    pub fn root_cause(&self) -> &ResolveErrorKind {
        match self {
            Self::Activation {
                source: InstantiateErrorKind::Resolve(inner),
                ..
            }
            | Self::Completion {
                source: InstantiateErrorKind::Resolve(inner),
                ..
            } => inner.root_cause(),
            _ => self,
        }
    }
}

struct Joined<'a, T>(&'a [T], &'static str);

impl<T: Display> Display for Joined<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, item) in self.0.iter().enumerate() {
            if index != 0 {
                f.write_str(self.1)?;
            }
            write!(f, "{item}")?;
        }
        Ok(())
    }
}
