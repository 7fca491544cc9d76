pub mod client;
pub mod cypher;
pub mod falkor;
pub mod neo4j;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::{ConstraintAdmin, StoreClient, Stores};
pub use falkor::FalkorStore;
pub use neo4j::Neo4jStore;
