use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
use core::cell::RefCell;
use parking_lot::{Mutex, ReentrantMutex};
use tracing::debug;

use crate::{any::Instance, registration::RegistrationId, service::Service};

#[derive(Clone, Default)]
pub(crate) enum SlotState {
    #[default]
    Empty,
    /// The thread holding the slot is constructing the instance for this service.
    Building(Service),
    Ready(Instance),
}

impl SlotState {
    #[inline]
    #[must_use]
    pub(crate) fn instance(&self) -> Option<&Instance> {
        match self {
            Self::Ready(instance) => Some(instance),
            _ => None,
        }
    }
}

/// Slot holding a shared instance. Locking it is the per-registration activation gate.
///
/// The lock is re-entrant so a thread coming back to a slot it is still building
/// sees [`SlotState::Building`] instead of blocking on itself.
pub(crate) type SharedSlot = Arc<ReentrantMutex<RefCell<SlotState>>>;

/// Shared instances of one lifetime scope, keyed by registration.
pub(crate) struct SharingCache {
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    slots: BTreeMap<RegistrationId, SharedSlot>,
    activated: Vec<RegistrationId>,
}

impl SharingCache {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Slot for the registration, created empty on first use.
    #[must_use]
    pub(crate) fn slot(&self, registration: RegistrationId) -> SharedSlot {
        self.inner.lock().slots.entry(registration).or_default().clone()
    }

    #[inline]
    pub(crate) fn record_activation(&self, registration: RegistrationId) {
        self.inner.lock().activated.push(registration);
    }

    #[must_use]
    #[cfg(test)]
    pub(crate) fn get(&self, registration: RegistrationId) -> Option<Instance> {
        let slot = self.inner.lock().slots.get(&registration).cloned()?;
        let instance = slot.lock().borrow().instance().cloned();
        instance
    }

    #[inline]
    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().activated.len()
    }

    /// Drops the cache's references in reverse activation order.
    pub(crate) fn clear(&self) {
        let CacheInner { mut slots, mut activated } = core::mem::take(&mut *self.inner.lock());

        while let Some(registration) = activated.pop() {
            if let Some(slot) = slots.remove(&registration) {
                let state = core::mem::take(&mut *slot.lock().borrow_mut());
                drop(state);
                debug!(%registration, "Shared instance released");
            }
        }
    }
}
