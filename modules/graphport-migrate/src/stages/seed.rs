//! Seed the source with the sample social graph.
//!
//! The CSVs live in the Neo4j server's import directory (see
//! `demos/sample_data`) and are addressed through `seed_data_url`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use graphport_common::{Config, Result};
use graphport_graph::{cypher, StoreClient};

use crate::pipeline::StageStep;

fn seed_statements(base: &str) -> Vec<String> {
    let from = |file: &str| cypher::string_literal(&format!("{base}{file}"));
    vec![
        format!(
            "LOAD CSV WITH HEADERS FROM {} AS row \
             CREATE (:User {{name: row.name, age: toInteger(row.age), \
             email: CASE WHEN row.email = '' THEN NULL ELSE row.email END, \
             city: CASE WHEN row.city = '' THEN NULL ELSE row.city END}})",
            from("users.csv")
        ),
        format!(
            "LOAD CSV WITH HEADERS FROM {} AS row \
             CREATE (:Post {{name: row.name, likes: toInteger(row.likes), \
             category: CASE WHEN row.category = '' THEN NULL ELSE row.category END, \
             image_url: CASE WHEN row.image_url = '' THEN NULL ELSE row.image_url END}})",
            from("posts.csv")
        ),
        format!(
            "LOAD CSV WITH HEADERS FROM {} AS row \
             MATCH (u1:User {{name: row.start_username}}), (u2:User {{name: row.end_username}}) \
             CREATE (u1)-[:FRIENDS_WITH {{since: date(row.since)}}]->(u2)",
            from("friends_with.csv")
        ),
        format!(
            "LOAD CSV WITH HEADERS FROM {} AS row \
             MATCH (u:User {{name: row.username}}), (p:Post {{name: row.postname}}) \
             CREATE (u)-[:CREATED {{timestamp: datetime(row.timestamp)}}]->(p)",
            from("created.csv")
        ),
        "CREATE CONSTRAINT user_name_constraint IF NOT EXISTS \
         FOR (u:User) REQUIRE u.name IS UNIQUE"
            .to_string(),
        "CREATE CONSTRAINT post_title_constraint IF NOT EXISTS \
         FOR (p:Post) REQUIRE p.name IS UNIQUE"
            .to_string(),
    ]
}

pub async fn seed_source(config: &Config, source: &dyn StoreClient) -> Result<()> {
    let statements = seed_statements(&config.seed_data_url);
    for statement in &statements {
        source.execute(statement).await?;
    }
    info!(statements = statements.len(), url = config.seed_data_url.as_str(), "Seeded source graph");
    Ok(())
}

pub struct SeedStep {
    config: Arc<Config>,
    source: Arc<dyn StoreClient>,
}

impl SeedStep {
    pub fn new(config: Arc<Config>, source: Arc<dyn StoreClient>) -> Self {
        Self { config, source }
    }
}

#[async_trait]
impl StageStep for SeedStep {
    async fn run(&self) -> Result<()> {
        seed_source(&self.config, self.source.as_ref()).await
    }
}
