use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use graphport_common::Result;
use graphport_graph::StoreClient;

use crate::pipeline::StageStep;

const CLEANUP: [(&str, &str); 3] = [
    (":User nodes", "MATCH (n:User) REMOVE n.element_id"),
    (":Post nodes", "MATCH (n:Post) REMOVE n.element_id"),
    ("all relationships", "MATCH (n)-[r]->(m) REMOVE r.element_id"),
];

/// Strip the migration-only `element_id` properties from the target.
pub async fn clean_target(target: &dyn StoreClient) -> Result<()> {
    for (scope, statement) in CLEANUP {
        info!("Removing element_id from {scope}");
        target.execute(statement).await?;
    }
    info!("element_id removal complete");
    Ok(())
}

pub struct CleanStep {
    target: Arc<dyn StoreClient>,
}

impl CleanStep {
    pub fn new(target: Arc<dyn StoreClient>) -> Self {
        Self { target }
    }
}

#[async_trait]
impl StageStep for CleanStep {
    async fn run(&self) -> Result<()> {
        clean_target(self.target.as_ref()).await
    }
}
