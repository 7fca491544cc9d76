//! Pipeline controller. Sequences stages and owns the single rollback path.
//!
//! Each stage runs its action, then its optional verification, with a
//! continuation gate after each. Any error from either step is caught here
//! and only here: the controller logs it, runs the recovery (a full reset)
//! exactly once, and ends the run `Aborted`. There is no retry and no resume.
//!
//! Declining a gate is not a failure. The run ends `UserAborted` and the
//! stores are left exactly as they are.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use graphport_common::{MigrationError, Result};

use crate::decision::DecisionSource;

const CONTINUE_PROMPT: &str = "Continue to next stage?";

/// One fallible unit of stage work.
#[async_trait]
pub trait StageStep: Send + Sync {
    async fn run(&self) -> Result<()>;
}

struct FnStep<F>(F);

#[async_trait]
impl<F, Fut> StageStep for FnStep<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn run(&self) -> Result<()> {
        (self.0)().await
    }
}

/// Wrap an async closure as a stage step.
pub fn step_fn<F, Fut>(f: F) -> impl StageStep
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    FnStep(f)
}

/// The recovery action run on any stage failure.
#[async_trait]
pub trait Recovery: Send + Sync {
    async fn recover(&self) -> Result<()>;
}

/// A named action with an optional verification step.
pub struct Stage {
    name: String,
    action: Box<dyn StageStep>,
    verify: Option<Box<dyn StageStep>>,
}

impl Stage {
    pub fn new(name: impl Into<String>, action: impl StageStep + 'static) -> Self {
        Self {
            name: name.into(),
            action: Box::new(action),
            verify: None,
        }
    }

    pub fn with_verify(mut self, verify: impl StageStep + 'static) -> Self {
        self.verify = Some(Box::new(verify));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_verify(&self) -> bool {
        self.verify.is_some()
    }
}

/// Controller states, in the order a run passes through them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Pending,
    Running(usize),
    Verifying(usize),
    Failed(usize),
    ResettingEnvironment,
    Aborted,
    UserAborted,
    Completed,
}

/// How a run ended.
#[derive(Debug)]
pub enum PipelineOutcome {
    Completed {
        stages_run: usize,
    },
    /// A continuation gate was declined. No reset ran.
    UserAborted {
        stage: Option<String>,
    },
    /// A stage failed and the environment was reset.
    Aborted {
        stage: String,
        error: MigrationError,
        /// Set when the reset itself also failed.
        reset_error: Option<MigrationError>,
    },
}

impl PipelineOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, PipelineOutcome::Completed { .. })
    }

    /// Process exit status: 0 completed, 1 failed, 2 aborted by the operator.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineOutcome::Completed { .. } => 0,
            PipelineOutcome::Aborted { .. } => 1,
            PipelineOutcome::UserAborted { .. } => 2,
        }
    }
}

/// Result of a run: the outcome plus every state visited.
#[derive(Debug)]
pub struct PipelineReport {
    pub outcome: PipelineOutcome,
    pub trace: Vec<PipelineState>,
    pub resets: usize,
}

enum StageFlow {
    Continue,
    Declined,
}

/// Process-scoped run state. Discarded when the run ends.
struct PipelineRun {
    cursor: usize,
    trace: Vec<PipelineState>,
    resets: usize,
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            cursor: 0,
            trace: vec![PipelineState::Pending],
            resets: 0,
        }
    }

    fn enter(&mut self, state: PipelineState) {
        debug!(cursor = self.cursor, state = ?state, "Pipeline transition");
        self.trace.push(state);
    }

    fn finish(self, outcome: PipelineOutcome) -> PipelineReport {
        PipelineReport {
            outcome,
            trace: self.trace,
            resets: self.resets,
        }
    }
}

/// Ordered stages plus the recovery to run when one fails.
pub struct Pipeline {
    stages: Vec<Stage>,
    recovery: Arc<dyn Recovery>,
    preflight: Option<String>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>, recovery: Arc<dyn Recovery>) -> Self {
        Self {
            stages,
            recovery,
            preflight: None,
        }
    }

    /// Ask `prompt` once before the first stage. Declining touches nothing.
    pub fn confirm_before_start(mut self, prompt: impl Into<String>) -> Self {
        self.preflight = Some(prompt.into());
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Execute every stage in order.
    pub async fn run(&self, decisions: &dyn DecisionSource) -> PipelineReport {
        let mut run = PipelineRun::new();

        if let Some(prompt) = &self.preflight {
            if !decisions.confirm(prompt) {
                info!("Aborting pipeline before reset");
                run.enter(PipelineState::UserAborted);
                return run.finish(PipelineOutcome::UserAborted { stage: None });
            }
        }

        for (index, stage) in self.stages.iter().enumerate() {
            run.cursor = index;
            info!(stage = stage.name(), "--- Running {} ---", stage.name());

            match Self::run_stage(&mut run, index, stage, decisions).await {
                Ok(StageFlow::Continue) => {}
                Ok(StageFlow::Declined) => {
                    info!(stage = stage.name(), "Aborting pipeline");
                    run.enter(PipelineState::UserAborted);
                    return run.finish(PipelineOutcome::UserAborted {
                        stage: Some(stage.name().to_string()),
                    });
                }
                Err(err) => return self.abort(run, index, stage, err).await,
            }
        }

        run.enter(PipelineState::Completed);
        info!(stages = self.stages.len(), "Migration pipeline completed successfully");
        run.finish(PipelineOutcome::Completed {
            stages_run: self.stages.len(),
        })
    }

    async fn run_stage(
        run: &mut PipelineRun,
        index: usize,
        stage: &Stage,
        decisions: &dyn DecisionSource,
    ) -> Result<StageFlow> {
        run.enter(PipelineState::Running(index));
        stage.action.run().await?;
        info!(stage = stage.name(), "Stage '{}' completed.", stage.name());
        if !decisions.confirm(CONTINUE_PROMPT) {
            return Ok(StageFlow::Declined);
        }

        if let Some(verify) = &stage.verify {
            run.enter(PipelineState::Verifying(index));
            verify.run().await?;
            info!(stage = stage.name(), "Stage '{}' verified.", stage.name());
            if !decisions.confirm(CONTINUE_PROMPT) {
                return Ok(StageFlow::Declined);
            }
        }

        Ok(StageFlow::Continue)
    }

    async fn abort(
        &self,
        mut run: PipelineRun,
        index: usize,
        stage: &Stage,
        err: MigrationError,
    ) -> PipelineReport {
        error!(stage = stage.name(), error = %err, "Error during stage '{}'", stage.name());
        run.enter(PipelineState::Failed(index));
        run.enter(PipelineState::ResettingEnvironment);

        warn!("Running environment reset to clean up...");
        run.resets += 1;
        let reset_error = match self.recovery.recover().await {
            Ok(()) => {
                info!("Environment reset");
                None
            }
            Err(reset_err) => {
                error!(error = %reset_err, "Environment reset failed; manual cleanup required");
                Some(reset_err)
            }
        };

        run.enter(PipelineState::Aborted);
        run.finish(PipelineOutcome::Aborted {
            stage: stage.name().to_string(),
            error: err,
            reset_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::decision::AlwaysContinue;
    use crate::testing::{CountingRecovery, ScriptedDecisions};

    fn counting_stage(name: &str, counter: Arc<AtomicUsize>) -> Stage {
        Stage::new(
            name,
            step_fn(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        )
    }

    fn failing_step(message: &'static str) -> impl StageStep {
        step_fn(move || async move { Err(MigrationError::Verification(message.into())) })
    }

    #[tokio::test]
    async fn all_succeeding_stages_complete_without_reset() {
        let runs = Arc::new(AtomicUsize::new(0));
        let recovery = Arc::new(CountingRecovery::default());
        let pipeline = Pipeline::new(
            vec![
                counting_stage("one", runs.clone()),
                counting_stage("two", runs.clone()).with_verify(step_fn(|| async { Ok(()) })),
            ],
            recovery.clone(),
        );

        let report = pipeline.run(&AlwaysContinue).await;

        assert!(report.outcome.is_completed());
        assert_eq!(report.outcome.exit_code(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(recovery.calls(), 0);
        assert_eq!(report.resets, 0);
        assert_eq!(
            report.trace,
            vec![
                PipelineState::Pending,
                PipelineState::Running(0),
                PipelineState::Running(1),
                PipelineState::Verifying(1),
                PipelineState::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn failing_action_resets_once_and_skips_later_stages() {
        let later = Arc::new(AtomicUsize::new(0));
        let recovery = Arc::new(CountingRecovery::default());
        let pipeline = Pipeline::new(
            vec![
                Stage::new("explode", failing_step("boom")),
                counting_stage("never", later.clone()),
            ],
            recovery.clone(),
        );

        let report = pipeline.run(&AlwaysContinue).await;

        match &report.outcome {
            PipelineOutcome::Aborted { stage, error, reset_error } => {
                assert_eq!(stage, "explode");
                assert!(error.to_string().contains("boom"));
                assert!(reset_error.is_none());
            }
            other => panic!("expected Aborted, got {other:?}"),
        }
        assert_eq!(report.outcome.exit_code(), 1);
        assert_eq!(recovery.calls(), 1);
        assert_eq!(later.load(Ordering::SeqCst), 0);
        assert_eq!(
            report.trace,
            vec![
                PipelineState::Pending,
                PipelineState::Running(0),
                PipelineState::Failed(0),
                PipelineState::ResettingEnvironment,
                PipelineState::Aborted,
            ]
        );
    }

    #[tokio::test]
    async fn failing_verify_is_handled_like_failing_action() {
        let recovery = Arc::new(CountingRecovery::default());
        let pipeline = Pipeline::new(
            vec![Stage::new("export", step_fn(|| async { Ok(()) }))
                .with_verify(failing_step("missing files"))],
            recovery.clone(),
        );

        let report = pipeline.run(&AlwaysContinue).await;

        assert!(matches!(report.outcome, PipelineOutcome::Aborted { .. }));
        assert_eq!(recovery.calls(), 1);
        assert_eq!(
            report.trace[1..],
            [
                PipelineState::Running(0),
                PipelineState::Verifying(0),
                PipelineState::Failed(0),
                PipelineState::ResettingEnvironment,
                PipelineState::Aborted,
            ]
        );
    }

    #[tokio::test]
    async fn declining_gate_exits_cleanly_without_reset() {
        let later = Arc::new(AtomicUsize::new(0));
        let recovery = Arc::new(CountingRecovery::default());
        let pipeline = Pipeline::new(
            vec![
                counting_stage("first", Arc::new(AtomicUsize::new(0))),
                counting_stage("second", later.clone()),
            ],
            recovery.clone(),
        );
        let decisions = ScriptedDecisions::new().answers([false]);

        let report = pipeline.run(&decisions).await;

        match &report.outcome {
            PipelineOutcome::UserAborted { stage } => assert_eq!(stage.as_deref(), Some("first")),
            other => panic!("expected UserAborted, got {other:?}"),
        }
        assert_eq!(report.outcome.exit_code(), 2);
        assert_eq!(recovery.calls(), 0);
        assert_eq!(later.load(Ordering::SeqCst), 0);
        assert_eq!(report.trace.last(), Some(&PipelineState::UserAborted));
    }

    #[tokio::test]
    async fn gate_is_asked_after_action_and_after_verify() {
        let pipeline = Pipeline::new(
            vec![Stage::new("only", step_fn(|| async { Ok(()) }))
                .with_verify(step_fn(|| async { Ok(()) }))],
            Arc::new(CountingRecovery::default()),
        );
        let decisions = ScriptedDecisions::new();

        pipeline.run(&decisions).await;

        assert_eq!(decisions.prompts().len(), 2);
    }

    #[tokio::test]
    async fn preflight_decline_touches_nothing() {
        let runs = Arc::new(AtomicUsize::new(0));
        let recovery = Arc::new(CountingRecovery::default());
        let pipeline = Pipeline::new(vec![counting_stage("reset", runs.clone())], recovery.clone())
            .confirm_before_start("This will wipe both graphs. Continue?");
        let decisions = ScriptedDecisions::new().answers([false]);

        let report = pipeline.run(&decisions).await;

        assert!(matches!(report.outcome, PipelineOutcome::UserAborted { stage: None }));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(recovery.calls(), 0);
        assert_eq!(report.trace, vec![PipelineState::Pending, PipelineState::UserAborted]);
    }

    #[tokio::test]
    async fn reset_failure_still_aborts_and_keeps_stage_error() {
        let recovery = Arc::new(CountingRecovery::failing("falkor unreachable"));
        let pipeline = Pipeline::new(vec![Stage::new("load", failing_step("bad csv"))], recovery.clone());

        let report = pipeline.run(&AlwaysContinue).await;

        match &report.outcome {
            PipelineOutcome::Aborted { error, reset_error, .. } => {
                assert!(error.to_string().contains("bad csv"));
                let reset_error = reset_error.as_ref().expect("reset error recorded");
                assert!(reset_error.to_string().contains("falkor unreachable"));
            }
            other => panic!("expected Aborted, got {other:?}"),
        }
        assert_eq!(recovery.calls(), 1);
        assert_eq!(report.trace.last(), Some(&PipelineState::Aborted));
    }

    #[tokio::test]
    async fn empty_pipeline_completes() {
        let pipeline = Pipeline::new(vec![], Arc::new(CountingRecovery::default()));
        let report = pipeline.run(&AlwaysContinue).await;
        assert!(matches!(report.outcome, PipelineOutcome::Completed { stages_run: 0 }));
    }
}
