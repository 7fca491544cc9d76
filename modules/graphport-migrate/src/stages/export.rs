//! Export the source graph to CSV through APOC.
//!
//! APOC writes on the Neo4j server, into `neo4j_mounted_dir`; the same files
//! are read locally from `export_dir`. The two must be the same mount.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use graphport_common::{Config, MigrationError, PollPolicy, Result};
use graphport_graph::{cypher, StoreClient};

use crate::constraints::{write_constraints_csv, CONSTRAINTS_FILE};
use crate::normalize::parse_temporal_millis;
use crate::pipeline::StageStep;

/// Every file a complete export leaves behind.
pub const EXPORT_FILES: [&str; 5] = [
    "users.csv",
    "posts.csv",
    "friends_with.csv",
    "created.csv",
    CONSTRAINTS_FILE,
];

struct Extraction {
    file: &'static str,
    query: &'static str,
}

const EXTRACTIONS: [Extraction; 4] = [
    Extraction {
        file: "users.csv",
        query: "MATCH (u:User) RETURN elementId(u) AS element_id, u.name AS name, \
                u.age AS age, u.city AS city, u.email AS email",
    },
    Extraction {
        file: "posts.csv",
        query: "MATCH (p:Post) RETURN elementId(p) AS element_id, p.name AS name, \
                p.likes AS likes, p.category AS category, p.image_url AS image_url",
    },
    Extraction {
        file: "friends_with.csv",
        query: "MATCH (u1:User)-[r:FRIENDS_WITH]->(u2:User) RETURN elementId(r) AS element_id, \
                elementId(u1) AS start_id, elementId(u2) AS end_id, r.since AS since",
    },
    Extraction {
        file: "created.csv",
        query: "MATCH (u:User)-[r:CREATED]->(p:Post) RETURN elementId(r) AS element_id, \
                elementId(u) AS start_id, elementId(p) AS end_id, r.timestamp AS timestamp",
    },
];

/// Temporal columns APOC writes as ISO text, rewritten to epoch millis.
const TEMPORAL_COLUMNS: [(&str, &str); 2] = [("created.csv", "timestamp"), ("friends_with.csv", "since")];

pub fn apoc_export_call(query: &str, file: &str) -> String {
    format!(
        "CALL apoc.export.csv.query({}, {}, {{}})",
        cypher::string_literal(query),
        cypher::string_literal(file)
    )
}

pub async fn export_dataset(config: &Config, source: &dyn StoreClient) -> Result<()> {
    tokio::fs::create_dir_all(&config.export_dir).await?;

    let mounted = config.neo4j_mounted_dir.trim_end_matches('/');
    for extraction in &EXTRACTIONS {
        let server_path = format!("{mounted}/{}", extraction.file);
        source
            .execute(&apoc_export_call(extraction.query, &server_path))
            .await?;
        info!(file = extraction.file, "Exported {}", extraction.file);
    }

    for (file, column) in TEMPORAL_COLUMNS {
        let path = config.export_dir.join(file);
        wait_for_artifact(&path, config.artifact_poll).await?;
        let rewritten = rewrite_temporal_column(&path, column)?;
        debug!(file, column, rows = rewritten, "Converted temporal column to epoch millis");
    }

    let constraints = source.execute("SHOW CONSTRAINTS").await?;
    write_constraints_csv(&config.export_dir.join(CONSTRAINTS_FILE), &constraints)?;

    info!(dir = %config.export_dir.display(), "Export complete");
    Ok(())
}

/// Wait for a file the store writes asynchronously. Checks `attempts`
/// times, sleeping `interval` between misses.
pub async fn wait_for_artifact(path: &Path, poll: PollPolicy) -> Result<()> {
    for attempt in 1..=poll.attempts {
        if tokio::fs::try_exists(path).await? {
            debug!(file = %path.display(), attempt, "Artifact present");
            return Ok(());
        }
        if attempt < poll.attempts {
            tokio::time::sleep(poll.interval).await;
        }
    }
    Err(MigrationError::ArtifactTimeout {
        path: path.to_path_buf(),
        attempts: poll.attempts,
    })
}

/// Rewrite `column` from ISO date/datetime text to epoch milliseconds in
/// place. Unparseable values become empty cells. Returns the row count.
pub fn rewrite_temporal_column(path: &Path, column: &str) -> Result<usize> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let idx = headers.iter().position(|h| h == column).ok_or_else(|| {
        MigrationError::Verification(format!("{} has no {column} column", path.display()))
    })?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let converted: Vec<String> = record
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if i != idx || cell.is_empty() {
                    return cell.to_string();
                }
                match parse_temporal_millis(cell) {
                    Some(millis) => millis.to_string(),
                    None => {
                        warn!(file = %path.display(), column, value = cell, "Unparseable temporal value cleared");
                        String::new()
                    }
                }
            })
            .collect();
        rows.push(converted);
    }
    drop(reader);

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&headers)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(rows.len())
}

pub struct ExportStep {
    config: Arc<Config>,
    source: Arc<dyn StoreClient>,
}

impl ExportStep {
    pub fn new(config: Arc<Config>, source: Arc<dyn StoreClient>) -> Self {
        Self { config, source }
    }
}

#[async_trait]
impl StageStep for ExportStep {
    async fn run(&self) -> Result<()> {
        export_dataset(&self.config, self.source.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use graphport_common::{RawRow, Scalar};

    use super::*;
    use crate::testing::MockStore;

    fn fast_poll(attempts: u32) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(5),
            attempts,
        }
    }

    #[test]
    fn apoc_call_quotes_query_and_path() {
        let call = apoc_export_call("MATCH (u:User) RETURN u.name AS name", "/import/users.csv");
        assert_eq!(
            call,
            "CALL apoc.export.csv.query('MATCH (u:User) RETURN u.name AS name', '/import/users.csv', {})"
        );
    }

    #[tokio::test]
    async fn poll_gives_up_after_budget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("created.csv");

        let err = wait_for_artifact(&path, fast_poll(3)).await.unwrap_err();

        match err {
            MigrationError::ArtifactTimeout { path: p, attempts } => {
                assert_eq!(p, path);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected ArtifactTimeout, got {other}"),
        }
    }

    #[tokio::test]
    async fn final_miss_times_out_without_sleeping() {
        let dir = tempfile::tempdir().unwrap();
        let slow = PollPolicy {
            interval: Duration::from_secs(30),
            attempts: 1,
        };

        let waited = tokio::time::timeout(
            Duration::from_secs(5),
            wait_for_artifact(&dir.path().join("x.csv"), slow),
        )
        .await
        .expect("waited past the last attempt");
        assert!(matches!(waited, Err(MigrationError::ArtifactTimeout { attempts: 1, .. })));
    }

    #[tokio::test]
    async fn poll_sees_late_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("created.csv");
        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tokio::fs::write(writer_path, "x\n").await.unwrap();
        });

        wait_for_artifact(&path, fast_poll(200)).await.unwrap();
        writer.await.unwrap();
    }

    #[test]
    fn temporal_column_becomes_epoch_millis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("friends_with.csv");
        std::fs::write(
            &path,
            "\"element_id\",\"start_id\",\"end_id\",\"since\"\n\
             \"5:a:1\",\"4:a:0\",\"4:a:2\",\"2024-01-01\"\n\
             \"5:a:2\",\"4:a:2\",\"4:a:0\",\"2024-01-01T00:00:00Z\"\n\
             \"5:a:3\",\"4:a:0\",\"4:a:3\",\"garbage-T\"\n\
             \"5:a:4\",\"4:a:3\",\"4:a:0\",\"\"\n",
        )
        .unwrap();

        assert_eq!(rewrite_temporal_column(&path, "since").unwrap(), 4);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "element_id,start_id,end_id,since");
        assert_eq!(lines[1], "5:a:1,4:a:0,4:a:2,1704067200000");
        assert_eq!(lines[2], "5:a:2,4:a:2,4:a:0,1704067200000");
        assert_eq!(lines[3], "5:a:3,4:a:0,4:a:3,");
        assert_eq!(lines[4], "5:a:4,4:a:3,4:a:0,");
    }

    #[test]
    fn missing_temporal_column_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("created.csv");
        std::fs::write(&path, "element_id\n1\n").unwrap();
        assert!(rewrite_temporal_column(&path, "timestamp").is_err());
    }

    #[tokio::test]
    async fn export_runs_every_extraction_and_writes_constraints() {
        let dir = tempfile::tempdir().unwrap();
        // APOC writes into the shared mount; emulate it by pre-creating the
        // relationship files the poll waits for.
        std::fs::write(dir.path().join("created.csv"), "element_id,start_id,end_id,timestamp\n")
            .unwrap();
        std::fs::write(dir.path().join("friends_with.csv"), "element_id,start_id,end_id,since\n")
            .unwrap();
        let source = MockStore::source().with_constraint("user_name_constraint", "User", "name");
        let config = Config {
            export_dir: dir.path().to_path_buf(),
            artifact_poll: fast_poll(2),
            ..Config::from_lookup(|_| None).unwrap()
        };

        export_dataset(&config, &source).await.unwrap();

        let calls: Vec<String> = source
            .executed()
            .into_iter()
            .filter(|q| q.starts_with("CALL apoc.export.csv.query"))
            .collect();
        assert_eq!(calls.len(), 4);
        assert!(calls[0].contains("'/import/neo4j_data/users.csv'"));
        assert!(calls[3].contains("'/import/neo4j_data/created.csv'"));
        let constraints = std::fs::read_to_string(dir.path().join(CONSTRAINTS_FILE)).unwrap();
        assert!(constraints.contains("user_name_constraint"));
        assert!(constraints.contains("['User']"));
    }

    #[tokio::test]
    async fn export_times_out_when_apoc_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = MockStore::source().on_query("apoc", vec![RawRow::Positional(vec![Scalar::Null])]);
        let config = Config {
            export_dir: dir.path().to_path_buf(),
            artifact_poll: fast_poll(2),
            ..Config::from_lookup(|_| None).unwrap()
        };

        let err = export_dataset(&config, &source).await.unwrap_err();
        assert!(matches!(err, MigrationError::ArtifactTimeout { attempts: 2, .. }));
    }
}
