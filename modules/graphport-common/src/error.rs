use std::fmt::Display;
use std::path::PathBuf;

use thiserror::Error;

use crate::StoreKind;

/// Fatal faults. Any of these unwinds the current stage and triggers a reset.
///
/// Reconciliation mismatches and user aborts are not errors and never appear here.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("{store} query execution failed: {message}")]
    QueryFailed { store: StoreKind, message: String },

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("Artifact never appeared: {} (gave up after {attempts} attempts)", path.display())]
    ArtifactTimeout { path: PathBuf, attempts: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed constraint list {input:?}: {reason}")]
    ConstraintFormat { input: String, reason: String },

    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl MigrationError {
    /// Wrap a driver error as a failed query against `store`.
    pub fn query(store: StoreKind, err: impl Display) -> Self {
        MigrationError::QueryFailed {
            store,
            message: err.to_string(),
        }
    }

    /// True when the store reported that a constraint being dropped does not exist.
    pub fn is_missing_constraint(&self) -> bool {
        match self {
            MigrationError::QueryFailed { message, .. } => {
                let msg = message.to_lowercase();
                msg.contains("no such constraint") || msg.contains("constraint does not exist")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
