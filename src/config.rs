use crate::scope::ScopeTag;

/// Config for a container
/// ## Fields
/// - `max_resolve_depth`:
///   Maximum number of nested requests in one resolve operation.
///   Deeper chains fail with [`crate::ResolveErrorKind::MaxDepthExceeded`] instead of overflowing the stack.
///
/// - `root_tag`:
///   Tag of the root lifetime scope, so matching-scope registrations can target it.
#[derive(Clone, Debug)]
pub struct Config {
    pub max_resolve_depth: usize,
    pub root_tag: ScopeTag,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_resolve_depth: 50,
            root_tag: ScopeTag::ROOT,
        }
    }
}
