//! Bulk-load the exported CSVs into the target, then recreate constraints.
//!
//! Nodes keep the source `elementId` as an `element_id` property so
//! relationships can be matched to their endpoints; the clean stage strips it
//! once reconciliation is done.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use graphport_common::{Config, Result};
use graphport_graph::{cypher, ConstraintAdmin, StoreClient};

use crate::constraints::{read_constraints, CONSTRAINTS_FILE};
use crate::pipeline::StageStep;

struct Load {
    file: &'static str,
    clause: &'static str,
    description: &'static str,
}

const LOADS: [Load; 4] = [
    Load {
        file: "users.csv",
        clause: "CREATE (:User {element_id: row.element_id, name: row.name, \
                 age: toInteger(row.age), city: row.city, email: row.email})",
        description: "Users",
    },
    Load {
        file: "posts.csv",
        clause: "CREATE (:Post {element_id: row.element_id, name: row.name, \
                 likes: toInteger(row.likes), category: row.category, image_url: row.image_url})",
        description: "Posts",
    },
    Load {
        file: "friends_with.csv",
        clause: "MATCH (u1:User {element_id: row.start_id}), (u2:User {element_id: row.end_id}) \
                 CREATE (u1)-[:FRIENDS_WITH {since: row.since, element_id: row.element_id}]->(u2)",
        description: "FRIENDS_WITH relationships",
    },
    Load {
        file: "created.csv",
        clause: "MATCH (u:User {element_id: row.start_id}), (p:Post {element_id: row.end_id}) \
                 CREATE (u)-[:CREATED {timestamp: toInteger(row.timestamp), element_id: row.element_id}]->(p)",
        description: "CREATED relationships",
    },
];

/// Join the target's import base URL and a file name. A bare scheme
/// (`file://`) still gets a separating slash, giving `file:///users.csv`.
pub fn import_url(base: &str, file: &str) -> String {
    if base.ends_with('/') && !base.ends_with("://") {
        format!("{base}{file}")
    } else {
        format!("{base}/{file}")
    }
}

fn load_statement(base: &str, load: &Load) -> String {
    format!(
        "LOAD CSV WITH HEADERS FROM {} AS row {} RETURN count(*) AS created",
        cypher::string_literal(&import_url(base, load.file)),
        load.clause
    )
}

pub async fn load_dataset(
    config: &Config,
    target: &dyn StoreClient,
    admin: &dyn ConstraintAdmin,
) -> Result<()> {
    for load in &LOADS {
        let rows = target
            .execute(&load_statement(&config.falkor_import_url, load))
            .await?;
        let created = rows
            .first()
            .and_then(|row| row.first())
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        info!(file = load.file, created, "Created {created} {}", load.description);
    }

    let constraints = read_constraints(&config.export_dir.join(CONSTRAINTS_FILE))?;
    for (label, property) in constraints.iter().filter_map(|c| c.unique_node_target()) {
        info!(label, property, "Creating UNIQUE constraint on :{label}({property})");
        admin.create_unique_constraint(label, property).await?;
    }
    Ok(())
}

pub struct LoadStep {
    config: Arc<Config>,
    target: Arc<dyn StoreClient>,
    admin: Arc<dyn ConstraintAdmin>,
}

impl LoadStep {
    pub fn new(
        config: Arc<Config>,
        target: Arc<dyn StoreClient>,
        admin: Arc<dyn ConstraintAdmin>,
    ) -> Self {
        Self {
            config,
            target,
            admin,
        }
    }
}

#[async_trait]
impl StageStep for LoadStep {
    async fn run(&self) -> Result<()> {
        load_dataset(&self.config, self.target.as_ref(), self.admin.as_ref()).await
    }
}
