pub mod constraints;
pub mod decision;
pub mod normalize;
pub mod pipeline;
pub mod reconcile;
pub mod reset;
pub mod stages;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use decision::{prompt_connection_settings, AlwaysContinue, DecisionSource};
pub use normalize::{normalize, Canonical, NormalizedRow};
pub use pipeline::{
    step_fn, Pipeline, PipelineOutcome, PipelineReport, PipelineState, Recovery, Stage, StageStep,
};
pub use reconcile::{
    default_comparisons, Comparison, ComparisonResult, ComparisonSpec, ReconciliationReport,
    Reconciler,
};
pub use reset::{ResetService, ResetSummary};
pub use stages::{standard_pipeline, StageOptions, DESTRUCTIVE_PROMPT};
