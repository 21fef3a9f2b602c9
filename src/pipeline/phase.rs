/// Ordered stages of the composed resolve pipeline.
///
/// Phases up to [`PipelinePhase::ServicePipelineEnd`] belong to the service pipeline,
/// the rest to the registration pipeline, which always runs nested inside it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelinePhase {
    ResolveRequestStart,
    ScopeSelection,
    CycleDetection,
    Sharing,
    Decoration,
    ServicePipelineEnd,
    RegistrationPipelineStart,
    ParameterSelection,
    Activation,
}

impl PipelinePhase {
    #[inline]
    #[must_use]
    pub fn is_service_phase(self) -> bool {
        self <= Self::ServicePipelineEnd
    }
}

/// Where a middleware lands among the middleware of its own phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InsertionMode {
    StartOfPhase,
    #[default]
    EndOfPhase,
}
