use alloc::{borrow::Cow, sync::Arc};

use crate::any::{Instance, TypeInfo};

/// Value supplied to a resolve call for the top-level component's activator.
///
/// Parameters are not forwarded to the component's dependencies.
#[derive(Clone)]
pub enum Parameter {
    Named { name: Cow<'static, str>, value: Instance },
    Typed { type_info: TypeInfo, value: Instance },
}

impl Parameter {
    #[inline]
    #[must_use]
    pub fn named<T: Send + Sync + 'static>(name: impl Into<Cow<'static, str>>, value: T) -> Self {
        Self::Named {
            name: name.into(),
            value: Arc::new(value),
        }
    }

    #[inline]
    #[must_use]
    pub fn typed<T: Send + Sync + 'static>(value: T) -> Self {
        Self::Typed {
            type_info: TypeInfo::of::<T>(),
            value: Arc::new(value),
        }
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &Instance {
        match self {
            Self::Named { value, .. } | Self::Typed { value, .. } => value,
        }
    }
}

pub(crate) fn find_typed<T: Send + Sync + 'static>(parameters: &[Parameter]) -> Option<Arc<T>> {
    let type_info = TypeInfo::of::<T>();
    parameters.iter().find_map(|parameter| match parameter {
        Parameter::Typed { type_info: actual, value } if *actual == type_info => value.clone().downcast().ok(),
        _ => None,
    })
}

pub(crate) fn find_named<T: Send + Sync + 'static>(parameters: &[Parameter], name: &str) -> Option<Arc<T>> {
    parameters.iter().find_map(|parameter| match parameter {
        Parameter::Named { name: actual, value } if actual == name => value.clone().downcast().ok(),
        _ => None,
    })
}
