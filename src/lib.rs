#![no_std]

extern crate alloc;

#[macro_use]
pub(crate) mod macros;

pub(crate) mod activator;
pub(crate) mod any;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod dependency_resolver;
pub(crate) mod disposer;
pub(crate) mod errors;
pub(crate) mod finalizer;
pub(crate) mod inject;
pub(crate) mod instantiator;
pub(crate) mod operation;
pub(crate) mod parameter;
pub mod pipeline;
pub(crate) mod registration;
pub(crate) mod registry;
pub(crate) mod scope;
pub(crate) mod service;
pub(crate) mod sources;

pub use activator::{Activator, ActivatorResult};
pub use any::{Instance, TypeInfo};
pub use config::Config;
pub use container::{ChildScopeBuilder, Container, LifetimeScope, ScopeEnding};
pub use context::ResolveContext;
pub use dependency_resolver::DependencyResolver;
pub use disposer::Dispose;
#[cfg(feature = "async")]
pub use disposer::AsyncDispose;
pub use errors::{DisposeErrorKind, InstantiateErrorKind, InstantiatorErrorKind, ResolveErrorKind, ScopeErrorKind};
pub use finalizer::Finalizer;
pub use inject::{Inject, InjectAll, InjectOptional};
pub use instantiator::Instantiator;
pub use parameter::Parameter;
pub use registration::{
    ActivatedEvent, ActivatingEvent, Lifetime, Metadata, Ownership, PreparingEvent, Registration, RegistrationBuilder, RegistrationId,
    RegistrationOptions, Sharing,
};
pub use registry::{ComponentRegistry, RegistryBuilder};
pub use scope::{ScopeId, ScopeTag};
pub use service::{KeyValue, Service, ServiceKey};
pub use sources::{Lazy, RegistrationSource, ServiceCollection};
