use alloc::{borrow::Cow, boxed::Box, string::String, sync::Arc};
use core::{
    any::Any,
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
};

use crate::any::TypeInfo;

/// Value usable as a service key.
///
/// Implemented for every `Ord + Debug` type, so enums, integers and strings can all
/// qualify a service. Keys of different types never compare equal.
pub trait KeyValue: Any + Debug + Send + Sync {
    #[doc(hidden)]
    fn as_any(&self) -> &dyn Any;

    #[doc(hidden)]
    fn key_type(&self) -> TypeInfo;

    #[doc(hidden)]
    fn key_cmp(&self, other: &dyn KeyValue) -> Ordering;
}

impl<T> KeyValue for T
where
    T: Ord + Debug + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn key_type(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn key_cmp(&self, other: &dyn KeyValue) -> Ordering {
        match other.as_any().downcast_ref::<T>() {
            Some(other) => self.cmp(other),
            None => self.key_type().cmp(&other.key_type()),
        }
    }
}

#[derive(Clone)]
pub struct ServiceKey(Arc<dyn KeyValue>);

impl ServiceKey {
    #[inline]
    #[must_use]
    pub fn new<K: KeyValue>(key: K) -> Self {
        Self(Arc::new(key))
    }

    #[inline]
    #[must_use]
    pub fn downcast_ref<K: KeyValue>(&self) -> Option<&K> {
        self.0.as_any().downcast_ref()
    }
}

impl From<&'static str> for ServiceKey {
    fn from(name: &'static str) -> Self {
        Self::new(Cow::<'static, str>::Borrowed(name))
    }
}

impl From<String> for ServiceKey {
    fn from(name: String) -> Self {
        Self::new(Cow::<'static, str>::Owned(name))
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ServiceKey {}

impl PartialOrd for ServiceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.key_cmp(&*other.0)
    }
}

impl Debug for ServiceKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&*self.0, f)
    }
}

/// Identifies what is wanted from the container.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Service {
    Typed(TypeInfo),
    Keyed { type_info: TypeInfo, key: ServiceKey },
    /// Every registration of the inner service.
    Collection(Box<Service>),
    /// A handle resolving the inner service on first access.
    Lazy(Box<Service>),
}

impl Service {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Typed(TypeInfo::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn keyed<T: ?Sized + 'static>(key: impl Into<ServiceKey>) -> Self {
        Self::Keyed {
            type_info: TypeInfo::of::<T>(),
            key: key.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn collection_of(service: Service) -> Self {
        Self::Collection(Box::new(service))
    }

    #[inline]
    #[must_use]
    pub fn lazy_of(service: Service) -> Self {
        Self::Lazy(Box::new(service))
    }

    /// Type of the instance an activator for this service must produce.
    /// Wrapper services report the type of the wrapped service.
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        match self {
            Self::Typed(type_info) | Self::Keyed { type_info, .. } => *type_info,
            Self::Collection(inner) | Self::Lazy(inner) => inner.type_info(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_wrapper(&self) -> bool {
        matches!(self, Self::Collection(_) | Self::Lazy(_))
    }
}

impl From<TypeInfo> for Service {
    fn from(type_info: TypeInfo) -> Self {
        Self::Typed(type_info)
    }
}

impl Display for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Typed(type_info) => write!(f, "{type_info}"),
            Self::Keyed { type_info, key } => write!(f, "{type_info} ({key:?})"),
            Self::Collection(inner) => write!(f, "Collection<{inner}>"),
            Self::Lazy(inner) => write!(f, "Lazy<{inner}>"),
        }
    }
}
