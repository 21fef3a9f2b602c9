use alloc::{sync::Arc, vec, vec::Vec};
use core::slice;

use super::RegistrationSource;
use crate::{
    activator::{Activator, ActivatorResult},
    any::{Instance, TypeInfo},
    context::ResolveContext,
    errors::InstantiatorErrorKind,
    registration::{Registration, RegistrationBuilder},
    registry::ComponentRegistry,
    service::Service,
};

/// Instances of every registration of a service, in registration order.
pub struct ServiceCollection(Vec<Instance>);

impl ServiceCollection {
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, Instance> {
        self.0.iter()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

struct CollectionActivator {
    element: Service,
}

impl Activator for CollectionActivator {
    #[inline]
    fn limit_type(&self) -> TypeInfo {
        TypeInfo::of::<ServiceCollection>()
    }

    fn activate(&self, context: &ResolveContext<'_>) -> ActivatorResult {
        match context.resolve_each(&self.element) {
            Ok(instances) => Ok(Arc::new(ServiceCollection(instances))),
            Err(err) => Err(InstantiatorErrorKind::Deps(err)),
        }
    }
}

/// Answers `Service::Collection(s)` with a transient registration resolving every registration of `s`.
pub(crate) struct CollectionSource;

impl RegistrationSource for CollectionSource {
    fn registrations_for(&self, service: &Service, _registry: &ComponentRegistry) -> Vec<Registration> {
        let Service::Collection(element) = service else {
            return Vec::new();
        };

        vec![RegistrationBuilder::<ServiceCollection>::from_activator(CollectionActivator {
            element: (**element).clone(),
        })
        .with_service(service.clone())
        .as_adapter()
        .build()]
    }
}
