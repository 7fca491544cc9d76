pub mod checks;
pub mod clean;
pub mod compare;
pub mod export;
pub mod load;
pub mod seed;

use std::sync::Arc;

use graphport_common::Config;
use graphport_graph::Stores;

use crate::pipeline::{step_fn, Pipeline, Stage};
use crate::reconcile::{default_comparisons, Reconciler};
use crate::reset::ResetService;

use self::checks::{ExportCheck, PopulatedCheck};
use self::clean::CleanStep;
use self::compare::CompareStep;
use self::export::ExportStep;
use self::load::LoadStep;
use self::seed::SeedStep;

pub const DESTRUCTIVE_PROMPT: &str = "This will reset the environment (delete data on both graphs \
     including constraints and empty the export directory). Continue?";

#[derive(Debug, Clone, Copy, Default)]
pub struct StageOptions {
    /// Reset everything and seed the source with the sample dataset first.
    pub seed_source: bool,
    /// Fail the compare stage when any comparison mismatches.
    pub strict_compare: bool,
}

/// The standard migration: export, load, compare, clean. With
/// `seed_source` it is preceded by a reset and a seed, and guarded by a
/// destructive-action prompt.
pub fn standard_pipeline(config: Arc<Config>, stores: Stores, options: StageOptions) -> Pipeline {
    let reset = Arc::new(ResetService::new(stores.clone(), config.export_dir.clone()));
    let mut stages = Vec::new();

    if options.seed_source {
        let service = reset.clone();
        stages.push(Stage::new(
            "Reset Environment",
            step_fn(move || {
                let service = service.clone();
                async move { service.reset().await.map(|_| ()) }
            }),
        ));
        stages.push(
            Stage::new("Create Source Graph", SeedStep::new(config.clone(), stores.source.clone()))
                .with_verify(PopulatedCheck::new(stores.source.clone())),
        );
    }

    stages.push(
        Stage::new("Export from Source", ExportStep::new(config.clone(), stores.source.clone()))
            .with_verify(ExportCheck::new(config.export_dir.clone())),
    );
    stages.push(
        Stage::new(
            "Create Target Graph",
            LoadStep::new(config.clone(), stores.target.clone(), stores.target_admin.clone()),
        )
        .with_verify(PopulatedCheck::new(stores.target.clone())),
    );

    let compare = CompareStep::new(Reconciler::new(&stores, default_comparisons()));
    let strict = compare.strict_check();
    let compare_stage = Stage::new("Compare Graphs", compare);
    stages.push(if options.strict_compare {
        compare_stage.with_verify(strict)
    } else {
        compare_stage
    });

    stages.push(Stage::new("Clean Target Graph", CleanStep::new(stores.target.clone())));

    let pipeline = Pipeline::new(stages, reset);
    if options.seed_source {
        pipeline.confirm_before_start(DESTRUCTIVE_PROMPT)
    } else {
        pipeline
    }
}
