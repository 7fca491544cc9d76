//! Test utilities for spinning up real Neo4j and FalkorDB instances via testcontainers.

use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

use crate::{FalkorStore, Neo4jStore};

pub const NEO4J_PASSWORD: &str = "test1234";

/// Spin up a Neo4j container and return the container handle + connected store.
///
/// The container is dropped (and stopped) when `ContainerAsync` goes out of scope,
/// so callers must hold it alive for the duration of the test.
pub async fn neo4j_container() -> (ContainerAsync<GenericImage>, Neo4jStore) {
    let image = GenericImage::new("neo4j", "5.25.1")
        .with_exposed_port(ContainerPort::Tcp(7687))
        .with_wait_for(WaitFor::message_on_stdout("Started."))
        .with_env_var("NEO4J_AUTH", format!("neo4j/{NEO4J_PASSWORD}"))
        .with_env_var("NEO4J_PLUGINS", "[\"apoc\"]")
        .with_env_var("NEO4J_apoc_export_file_enabled", "true");

    let container: ContainerAsync<GenericImage> = image
        .start()
        .await
        .expect("Failed to start Neo4j container");

    let host_port = container
        .get_host_port_ipv4(7687)
        .await
        .expect("Failed to get Neo4j host port");

    let uri = format!("bolt://127.0.0.1:{host_port}");
    let store = Neo4jStore::connect(&uri, "neo4j", NEO4J_PASSWORD)
        .await
        .expect("Failed to connect to Neo4j");

    (container, store)
}

/// Spin up a FalkorDB container bound to `graph`.
pub async fn falkordb_container(graph: &str) -> (ContainerAsync<GenericImage>, FalkorStore) {
    let image = GenericImage::new("falkordb/falkordb", "latest")
        .with_exposed_port(ContainerPort::Tcp(6379))
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));

    let container: ContainerAsync<GenericImage> = image
        .start()
        .await
        .expect("Failed to start FalkorDB container");

    let host_port = container
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get FalkorDB host port");

    let store = FalkorStore::connect(&format!("redis://127.0.0.1:{host_port}/"), graph)
        .await
        .expect("Failed to connect to FalkorDB");

    (container, store)
}
