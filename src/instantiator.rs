use crate::{dependency_resolver::DependencyResolver, errors::InstantiateErrorKind};

/// Construction logic whose arguments are resolved from the container.
///
/// Implemented for closures of up to twelve [`DependencyResolver`] arguments returning a `Result`,
/// so `|Inject(logger): Inject<Logger>| Ok(Service(logger))` is an instantiator.
pub trait Instantiator<Deps>: Clone + 'static
where
    Deps: DependencyResolver,
{
    type Provides: 'static;
    type Error: Into<InstantiateErrorKind>;

    /// # Errors
    /// Returns the factory's own failure.
    fn instantiate(&mut self, dependencies: Deps) -> Result<Self::Provides, Self::Error>;
}

macro_rules! impl_instantiator {
    (
        [$($ty:ident),*]
    ) => {
        #[allow(non_snake_case)]
        impl<F, Response, Err, $($ty,)*> Instantiator<($($ty,)*)> for F
        where
            F: FnMut($($ty,)*) -> Result<Response, Err> + Clone + 'static,
            Response: 'static,
            Err: Into<InstantiateErrorKind>,
            $( $ty: DependencyResolver, )*
        {
            type Provides = Response;
            type Error = Err;

            fn instantiate(&mut self, ($($ty,)*): ($($ty,)*)) -> Result<Self::Provides, Self::Error> {
                self($($ty,)*)
            }
        }
    };
}

all_the_tuples!(impl_instantiator);

/// Wraps a value into a trait object box, for instantiators providing `Box<dyn Trait>`.
///
/// ```ignore
/// RegistrationBuilder::provide(|| Ok(boxed!(PostgresRepo; Repo + Send + Sync)))
/// ```
#[macro_export]
macro_rules! boxed {
    ($val:expr ; $trait:tt $($super_traits:tt)*) => {{
        Box::new($val) as Box<dyn $r#trait $($super_traits)*>
    }};
}
