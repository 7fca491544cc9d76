use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::error::{MigrationError, Result};

/// Bounded poll for an artifact written asynchronously by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            attempts: 10,
        }
    }
}

/// Migration configuration. Built once at process start and shared by
/// reference with every stage.
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j (source)
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    /// Directory APOC writes exports to, as seen by the Neo4j server.
    pub neo4j_mounted_dir: String,
    /// Where the source-side sample dataset lives for `LOAD CSV`.
    pub seed_data_url: String,

    // FalkorDB (target)
    pub falkor_host: String,
    pub falkor_port: u16,
    pub falkor_graph: String,
    /// Base URL FalkorDB resolves `LOAD CSV` file names against.
    pub falkor_import_url: String,

    // Artifacts
    /// Local view of the export directory.
    pub export_dir: PathBuf,
    pub artifact_poll: PollPolicy,
}

impl Config {
    /// Load configuration from process environment variables, with the
    /// defaults of a local docker-compose setup.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let falkor_port = var("FALKOR_PORT", "6379")
            .parse()
            .map_err(|_| MigrationError::Config("FALKOR_PORT must be a port number".into()))?;

        let poll_attempts = var("ARTIFACT_POLL_ATTEMPTS", "10")
            .parse()
            .map_err(|_| MigrationError::Config("ARTIFACT_POLL_ATTEMPTS must be a number".into()))?;
        let poll_interval_ms: u64 = var("ARTIFACT_POLL_INTERVAL_MS", "500")
            .parse()
            .map_err(|_| {
                MigrationError::Config("ARTIFACT_POLL_INTERVAL_MS must be a number".into())
            })?;

        Ok(Self {
            neo4j_uri: var("NEO4J_URI", "bolt://localhost:7687"),
            neo4j_user: var("NEO4J_USER", "neo4j"),
            neo4j_password: var("NEO4J_PASSWORD", "test1234"),
            neo4j_mounted_dir: var("NEO4J_MOUNTED_DIR", "/import/neo4j_data"),
            seed_data_url: var("SEED_DATA_URL", "file:///sample_data/"),
            falkor_host: var("FALKOR_HOST", "localhost"),
            falkor_port,
            falkor_graph: var("FALKOR_GRAPH", "SocialGraph"),
            falkor_import_url: var("FALKOR_IMPORT_URL", "file://"),
            export_dir: PathBuf::from(var("EXPORT_DIR", "data/neo4j_data")),
            artifact_poll: PollPolicy {
                interval: Duration::from_millis(poll_interval_ms),
                attempts: poll_attempts,
            },
        })
    }

    /// Reject empty values. Nothing beyond non-emptiness is checked.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("NEO4J_URI", self.neo4j_uri.as_str()),
            ("NEO4J_USER", self.neo4j_user.as_str()),
            ("NEO4J_PASSWORD", self.neo4j_password.as_str()),
            ("NEO4J_MOUNTED_DIR", self.neo4j_mounted_dir.as_str()),
            ("FALKOR_HOST", self.falkor_host.as_str()),
            ("FALKOR_GRAPH", self.falkor_graph.as_str()),
            ("FALKOR_IMPORT_URL", self.falkor_import_url.as_str()),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect();
        if !missing.is_empty() {
            return Err(MigrationError::Config(format!(
                "empty values for {}",
                missing.join(", ")
            )));
        }
        if self.export_dir.as_os_str().is_empty() {
            return Err(MigrationError::Config("empty value for EXPORT_DIR".into()));
        }
        if self.artifact_poll.attempts == 0 {
            return Err(MigrationError::Config(
                "ARTIFACT_POLL_ATTEMPTS must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Connection URL for the FalkorDB redis endpoint.
    pub fn falkor_url(&self) -> String {
        format!("redis://{}:{}/", self.falkor_host, self.falkor_port)
    }

    /// Log the effective configuration without credentials.
    pub fn log_redacted(&self) {
        info!(
            neo4j_uri = self.neo4j_uri.as_str(),
            neo4j_user = self.neo4j_user.as_str(),
            neo4j_password = "***",
            neo4j_mounted_dir = self.neo4j_mounted_dir.as_str(),
            falkor = %self.falkor_url(),
            falkor_graph = self.falkor_graph.as_str(),
            export_dir = %self.export_dir.display(),
            "Configuration loaded"
        );
    }
}
