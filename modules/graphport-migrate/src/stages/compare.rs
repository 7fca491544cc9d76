use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use graphport_common::{MigrationError, Result};

use crate::pipeline::StageStep;
use crate::reconcile::{Reconciler, ReconciliationReport};

type ReportSlot = Arc<Mutex<Option<ReconciliationReport>>>;

/// Runs reconciliation and keeps the report for an optional strict check.
pub struct CompareStep {
    reconciler: Arc<Reconciler>,
    report: ReportSlot,
}

impl CompareStep {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            report: Arc::default(),
        }
    }

    /// A verify step that fails when the last comparison had any mismatch.
    pub fn strict_check(&self) -> StrictCheck {
        StrictCheck {
            report: self.report.clone(),
        }
    }
}

#[async_trait]
impl StageStep for CompareStep {
    async fn run(&self) -> Result<()> {
        let report = self.reconciler.run().await?;
        let mut slot = self
            .report
            .lock()
            .map_err(|_| MigrationError::Verification("comparison report unavailable".into()))?;
        *slot = Some(report);
        Ok(())
    }
}

pub struct StrictCheck {
    report: ReportSlot,
}

#[async_trait]
impl StageStep for StrictCheck {
    async fn run(&self) -> Result<()> {
        let mismatched: Vec<String> = {
            let slot = self
                .report
                .lock()
                .map_err(|_| MigrationError::Verification("comparison report unavailable".into()))?;
            let report = slot
                .as_ref()
                .ok_or_else(|| MigrationError::Verification("graphs were not compared".into()))?;
            report.mismatches().iter().map(|r| r.name.clone()).collect()
        };
        if mismatched.is_empty() {
            Ok(())
        } else {
            Err(MigrationError::Verification(format!(
                "graphs differ: {}",
                mismatched.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::Comparison;
    use crate::testing::{mock_stores, MockStore};

    fn compare_step(source_nodes: i64, target_nodes: i64) -> CompareStep {
        let source = Arc::new(MockStore::source().with_nodes(source_nodes));
        let target = Arc::new(MockStore::target().with_nodes(target_nodes));
        CompareStep::new(Reconciler::new(
            &mock_stores(&source, &target),
            vec![Comparison::shared("node_count", "MATCH (n) RETURN count(n) AS count")],
        ))
    }

    #[tokio::test]
    async fn mismatch_passes_the_stage_but_fails_strict_check() {
        let step = compare_step(3, 2);
        step.run().await.unwrap();
        let err = step.strict_check().run().await.unwrap_err();
        assert!(err.to_string().contains("node_count"));
    }

    #[tokio::test]
    async fn strict_check_passes_on_match() {
        let step = compare_step(4, 4);
        step.run().await.unwrap();
        step.strict_check().run().await.unwrap();
    }

    #[tokio::test]
    async fn strict_check_before_compare_fails() {
        let step = compare_step(1, 1);
        assert!(step.strict_check().run().await.is_err());
    }

    #[tokio::test]
    async fn poisoned_report_slot_fails_the_stage() {
        let step = compare_step(2, 2);
        let slot = step.report.clone();
        let _ = std::thread::spawn(move || {
            let _held = slot.lock().unwrap();
            panic!("writer died while holding the report");
        })
        .join();

        let err = step.run().await.unwrap_err();
        assert!(err.to_string().contains("comparison report unavailable"), "{err}");
    }
}
