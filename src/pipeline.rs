mod builder;
mod middleware;
mod phase;
mod request;

pub(crate) mod registration_stages;
pub(crate) mod service_stages;

pub(crate) use middleware::BoxedMiddleware;

pub use builder::{ResolvePipeline, ResolvePipelineBuilder};
pub use middleware::{middleware_fn, MiddlewareFn, Next, ResolveMiddleware};
pub use phase::{InsertionMode, PipelinePhase};
pub use request::ResolveRequest;
