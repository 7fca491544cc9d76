//! Verification steps run after a stage's action.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use graphport_common::{MigrationError, Result};
use graphport_graph::StoreClient;

use crate::pipeline::StageStep;
use crate::stages::export::EXPORT_FILES;

/// All five export files exist in `dir`.
pub fn check_export_output(dir: &Path) -> Result<()> {
    let missing: Vec<&str> = EXPORT_FILES
        .iter()
        .copied()
        .filter(|file| !dir.join(file).exists())
        .collect();
    if !missing.is_empty() {
        return Err(MigrationError::Verification(format!(
            "Export check failed: missing files {}",
            missing.join(", ")
        )));
    }
    info!(dir = %dir.display(), "Export output verified: all expected CSV files are present");
    Ok(())
}

/// The store holds at least one node. Returns the count.
pub async fn check_populated(store: &dyn StoreClient) -> Result<i64> {
    let rows = store.execute("MATCH (n) RETURN count(n)").await?;
    let count = rows
        .first()
        .and_then(|row| row.first())
        .and_then(|v| v.as_i64())
        .ok_or_else(|| {
            MigrationError::Verification(format!("{} returned no node count", store.kind()))
        })?;
    if count < 1 {
        return Err(MigrationError::Verification(format!(
            "{} graph check failed: no nodes found",
            store.kind()
        )));
    }
    info!(store = %store.kind(), count, "Graph populated");
    Ok(count)
}

pub struct ExportCheck {
    dir: PathBuf,
}

impl ExportCheck {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl StageStep for ExportCheck {
    async fn run(&self) -> Result<()> {
        check_export_output(&self.dir)
    }
}

pub struct PopulatedCheck {
    store: Arc<dyn StoreClient>,
}

impl PopulatedCheck {
    pub fn new(store: Arc<dyn StoreClient>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StageStep for PopulatedCheck {
    async fn run(&self) -> Result<()> {
        check_populated(self.store.as_ref()).await.map(|_| ())
    }
}
