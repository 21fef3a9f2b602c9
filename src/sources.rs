mod collection;
mod lazy;

use alloc::vec::Vec;

use crate::{registration::Registration, registry::ComponentRegistry, service::Service};

pub use collection::ServiceCollection;
pub(crate) use collection::CollectionSource;
pub use lazy::Lazy;
pub(crate) use lazy::LazySource;

/// Synthesizes registrations for services with no static registration.
///
/// Sources are asked in the order they were added, only when static lookup finds nothing.
/// The registry may be queried for other services; querying the service being answered
/// sees static registrations only. Registrations that adapt other registrations should be
/// marked with [`crate::RegistrationBuilder::as_adapter`] so child layers re-adapt them.
pub trait RegistrationSource: Send + Sync + 'static {
    fn registrations_for(&self, service: &Service, registry: &ComponentRegistry) -> Vec<Registration>;
}
