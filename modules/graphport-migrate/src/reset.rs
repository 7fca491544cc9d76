//! Environment reset: the pipeline's only recovery action.
//!
//! Wipes both graphs, their constraints, and every exported CSV. Assumes
//! nothing about how far a previous run got, so running it twice is the
//! same as running it once.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use graphport_common::{Result, Scalar};
use graphport_graph::cypher;
use graphport_graph::Stores;

use crate::pipeline::Recovery;

/// Unique constraints the load stage may create on the target.
pub const TRACKED_CONSTRAINTS: [(&str, &str); 2] = [("User", "name"), ("Post", "name")];

const DELETE_ALL: &str = "MATCH (n) DETACH DELETE n";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ResetSummary {
    pub files_removed: usize,
    pub source_constraints_dropped: usize,
    pub target_constraints_dropped: usize,
}

pub struct ResetService {
    stores: Stores,
    export_dir: PathBuf,
}

impl ResetService {
    pub fn new(stores: Stores, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            stores,
            export_dir: export_dir.into(),
        }
    }

    /// Clear artifacts, then the source, then the target. Each part runs even
    /// when an earlier one failed; the first failure is returned.
    pub async fn reset(&self) -> Result<ResetSummary> {
        let results = [
            ("export directory", clear_artifacts(&self.export_dir).await),
            ("Neo4j", self.reset_source().await),
            ("FalkorDB", self.reset_target().await),
        ];
        for (part, result) in &results {
            if let Err(e) = result {
                warn!(part, error = %e, "Reset step failed");
            }
        }
        let [(_, files), (_, source), (_, target)] = results;
        let summary = ResetSummary {
            files_removed: files?,
            source_constraints_dropped: source?,
            target_constraints_dropped: target?,
        };
        info!(
            files_removed = summary.files_removed,
            source_constraints = summary.source_constraints_dropped,
            target_constraints = summary.target_constraints_dropped,
            "Environment reset complete"
        );
        Ok(summary)
    }

    async fn reset_source(&self) -> Result<usize> {
        let source = &self.stores.source;
        info!("Deleting all nodes and relationships from Neo4j");
        source.execute(DELETE_ALL).await?;

        let mut dropped = 0;
        for row in source.execute("SHOW CONSTRAINTS").await? {
            let Some(name) = row.field("name").and_then(Scalar::as_str) else {
                warn!(row = ?row, "Constraint row without a name (skipped)");
                continue;
            };
            info!(constraint = name, "Dropping Neo4j constraint");
            source
                .execute(&format!(
                    "DROP CONSTRAINT {} IF EXISTS",
                    cypher::identifier(name)
                ))
                .await?;
            dropped += 1;
        }
        Ok(dropped)
    }

    async fn reset_target(&self) -> Result<usize> {
        info!("Deleting all nodes and relationships from FalkorDB");
        self.stores.target.execute(DELETE_ALL).await?;

        let mut dropped = 0;
        for (label, property) in TRACKED_CONSTRAINTS {
            match self
                .stores
                .target_admin
                .drop_unique_constraint(label, property)
                .await
            {
                Ok(()) => {
                    info!(label, property, "Dropped FalkorDB constraint");
                    dropped += 1;
                }
                Err(e) if e.is_missing_constraint() => {
                    debug!(label, property, "No FalkorDB constraint to drop");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(dropped)
    }
}

#[async_trait]
impl Recovery for ResetService {
    async fn recover(&self) -> Result<()> {
        self.reset().await.map(|_| ())
    }
}

/// Delete every `*.csv` directly under `dir`. A missing directory is clean.
async fn clear_artifacts(dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Export directory absent; nothing to clear");
            return Ok(0);
        }
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "csv") {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(file = %path.display(), "Deleted export file");
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::testing::{mock_stores, MockStore};

    fn populated() -> (Arc<MockStore>, Arc<MockStore>) {
        let source = Arc::new(
            MockStore::source()
                .with_nodes(12)
                .with_constraint("user_name_constraint", "User", "name")
                .with_constraint("post_title_constraint", "Post", "name"),
        );
        let target = Arc::new(
            MockStore::target()
                .with_nodes(12)
                .with_constraint("user_unique", "User", "name"),
        );
        (source, target)
    }

    #[tokio::test]
    async fn reset_wipes_stores_constraints_and_csvs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("users.csv"), "name\nalice\n").unwrap();
        std::fs::write(dir.path().join("created.csv"), "x\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();
        let (source, target) = populated();
        let service = ResetService::new(mock_stores(&source, &target), dir.path());

        let summary = service.reset().await.unwrap();

        assert_eq!(
            summary,
            ResetSummary {
                files_removed: 2,
                source_constraints_dropped: 2,
                target_constraints_dropped: 1,
            }
        );
        assert_eq!(source.node_count(), 0);
        assert_eq!(target.node_count(), 0);
        assert!(source.constraint_names().is_empty());
        assert!(target.constraint_names().is_empty());
        assert!(source.ran("DROP CONSTRAINT `user_name_constraint` IF EXISTS"));
        assert!(dir.path().join("notes.txt").exists());
        assert!(!dir.path().join("users.csv").exists());
    }

    #[tokio::test]
    async fn reset_twice_is_reset_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("users.csv"), "name\n").unwrap();
        let (source, target) = populated();
        let service = ResetService::new(mock_stores(&source, &target), dir.path());

        service.reset().await.unwrap();
        let second = service.reset().await.unwrap();

        assert_eq!(second, ResetSummary::default());
        assert_eq!(source.node_count(), 0);
        assert_eq!(target.node_count(), 0);
        assert!(target.constraint_names().is_empty());
    }

    #[tokio::test]
    async fn missing_export_dir_counts_as_clean() {
        let dir = tempfile::tempdir().unwrap();
        let (source, target) = populated();
        let service = ResetService::new(mock_stores(&source, &target), dir.path().join("never"));

        let summary = service.reset().await.unwrap();
        assert_eq!(summary.files_removed, 0);
    }

    #[tokio::test]
    async fn other_target_failures_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockStore::source());
        let target = Arc::new(MockStore::target().fail_on("CONSTRAINT DROP Post", "READONLY replica"));
        let service = ResetService::new(mock_stores(&source, &target), dir.path());

        let err = service.reset().await.unwrap_err();
        assert!(err.to_string().contains("READONLY"));
    }

    #[tokio::test]
    async fn artifact_failure_still_wipes_both_stores() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("export");
        std::fs::write(&not_a_dir, "a file where the export directory should be").unwrap();
        let (source, target) = populated();
        let service = ResetService::new(mock_stores(&source, &target), not_a_dir.clone());

        assert!(service.reset().await.is_err());
        assert_eq!(source.node_count(), 0);
        assert_eq!(target.node_count(), 0);
        assert!(source.constraint_names().is_empty());
        assert!(target.constraint_names().is_empty());
    }

    #[tokio::test]
    async fn recovery_runs_a_full_reset() {
        let dir = tempfile::tempdir().unwrap();
        let (source, target) = populated();
        let service = ResetService::new(mock_stores(&source, &target), dir.path());

        service.recover().await.unwrap();
        assert_eq!(source.node_count(), 0);
    }
}
