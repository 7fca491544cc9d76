use std::sync::Arc;

use async_trait::async_trait;

use graphport_common::{RawRow, Result, StoreKind};

/// Query capability of a graph store. Rows come back in the store's native shape.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Which side of the migration this store is.
    fn kind(&self) -> StoreKind;

    /// Run one query and collect every row. Failures surface as
    /// `MigrationError::QueryFailed` carrying the driver's message.
    async fn execute(&self, query: &str) -> Result<Vec<RawRow>>;
}

/// Constraint DDL for stores that do not expose it through their query language.
#[async_trait]
pub trait ConstraintAdmin: Send + Sync {
    async fn create_unique_constraint(&self, label: &str, property: &str) -> Result<()>;

    /// Fails with a "no such constraint" query error when nothing was there.
    async fn drop_unique_constraint(&self, label: &str, property: &str) -> Result<()>;
}

/// Both store handles a migration needs.
#[derive(Clone)]
pub struct Stores {
    pub source: Arc<dyn StoreClient>,
    pub target: Arc<dyn StoreClient>,
    pub target_admin: Arc<dyn ConstraintAdmin>,
}

impl Stores {
    pub fn new<T>(source: Arc<dyn StoreClient>, target: Arc<T>) -> Self
    where
        T: StoreClient + ConstraintAdmin + 'static,
    {
        Self {
            source,
            target: target.clone(),
            target_admin: target,
        }
    }
}
