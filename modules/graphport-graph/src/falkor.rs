//! FalkorDB over the redis protocol.
//!
//! Queries go through `GRAPH.QUERY <graph> <cypher> --compact`. The compact
//! reply is `[header, rows, stats]` for queries that return data and
//! `[stats]` for pure writes. Each cell is a `[type, value]` pair, which keeps
//! doubles and booleans distinguishable from strings.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Value;
use tracing::{debug, warn};

use graphport_common::{MigrationError, RawRow, Result, Scalar, StoreKind};

use crate::{ConstraintAdmin, StoreClient};

// Compact-mode value type tags.
const VALUE_NULL: i64 = 1;
const VALUE_STRING: i64 = 2;
const VALUE_INTEGER: i64 = 3;
const VALUE_BOOLEAN: i64 = 4;
const VALUE_DOUBLE: i64 = 5;
const VALUE_ARRAY: i64 = 6;

/// One FalkorDB graph. Rows come back positional.
#[derive(Clone)]
pub struct FalkorStore {
    conn: MultiplexedConnection,
    graph: String,
}

impl FalkorStore {
    /// Connect to the redis endpoint and bind to `graph`.
    pub async fn connect(url: &str, graph: &str) -> Result<Self> {
        let client =
            redis::Client::open(url).map_err(|e| MigrationError::query(StoreKind::Target, e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| MigrationError::query(StoreKind::Target, e))?;
        Ok(Self {
            conn,
            graph: graph.to_string(),
        })
    }

    pub fn graph_name(&self) -> &str {
        &self.graph
    }

    async fn constraint_command(&self, op: &str, label: &str, property: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: Value = redis::cmd("GRAPH.CONSTRAINT")
            .arg(op)
            .arg(&self.graph)
            .arg("UNIQUE")
            .arg("NODE")
            .arg(label)
            .arg("PROPERTIES")
            .arg(1)
            .arg(property)
            .query_async(&mut conn)
            .await
            .map_err(|e| MigrationError::query(StoreKind::Target, e))?;
        Ok(())
    }
}

#[async_trait]
impl StoreClient for FalkorStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Target
    }

    async fn execute(&self, cypher: &str) -> Result<Vec<RawRow>> {
        debug!(store = %StoreKind::Target, graph = self.graph.as_str(), cypher, "Executing query");
        let mut conn = self.conn.clone();
        let reply: Value = redis::cmd("GRAPH.QUERY")
            .arg(&self.graph)
            .arg(cypher)
            .arg("--compact")
            .query_async(&mut conn)
            .await
            .map_err(|e| MigrationError::query(StoreKind::Target, e))?;
        decode_compact_reply(reply)
    }
}

#[async_trait]
impl ConstraintAdmin for FalkorStore {
    async fn create_unique_constraint(&self, label: &str, property: &str) -> Result<()> {
        // A unique constraint needs an exact-match index on the same property.
        let index = format!("CREATE INDEX FOR (n:{label}) ON (n.{property})");
        if let Err(e) = self.execute(&index).await {
            let msg = e.to_string().to_lowercase();
            if msg.contains("already indexed") || msg.contains("already exists") {
                warn!(label, property, "Index already exists (skipped)");
            } else {
                return Err(e);
            }
        }
        self.constraint_command("CREATE", label, property).await
    }

    async fn drop_unique_constraint(&self, label: &str, property: &str) -> Result<()> {
        self.constraint_command("DROP", label, property).await
    }
}

fn malformed(what: &str) -> MigrationError {
    MigrationError::query(StoreKind::Target, format!("malformed compact reply: {what}"))
}

/// Decode a `--compact` GRAPH.QUERY reply into positional rows.
pub fn decode_compact_reply(reply: Value) -> Result<Vec<RawRow>> {
    let sections = match reply {
        Value::Array(sections) => sections,
        _ => return Err(malformed("expected top-level array")),
    };
    // Write-only queries reply with the statistics section alone.
    if sections.len() < 3 {
        return Ok(Vec::new());
    }
    let rows = match sections.into_iter().nth(1) {
        Some(Value::Array(rows)) => rows,
        _ => return Err(malformed("expected row array")),
    };
    rows.into_iter()
        .map(|row| match row {
            Value::Array(cells) => cells
                .into_iter()
                .map(decode_cell)
                .collect::<Result<Vec<_>>>()
                .map(RawRow::Positional),
            _ => Err(malformed("expected row to be an array")),
        })
        .collect()
}

fn decode_cell(cell: Value) -> Result<Scalar> {
    let mut pair = match cell {
        Value::Array(pair) if pair.len() == 2 => pair.into_iter(),
        _ => return Err(malformed("expected [type, value] cell")),
    };
    let (Some(tag), Some(value)) = (pair.next(), pair.next()) else {
        return Err(malformed("expected [type, value] cell"));
    };
    let tag = match tag {
        Value::Int(t) => t,
        _ => return Err(malformed("cell type tag is not an integer")),
    };

    match tag {
        VALUE_NULL => Ok(Scalar::Null),
        VALUE_STRING => text(&value)
            .map(Scalar::Text)
            .ok_or_else(|| malformed("string cell")),
        VALUE_INTEGER => match value {
            Value::Int(i) => Ok(Scalar::Int(i)),
            other => text(&other)
                .and_then(|s| s.parse().ok())
                .map(Scalar::Int)
                .ok_or_else(|| malformed("integer cell")),
        },
        VALUE_BOOLEAN => match text(&value).as_deref() {
            Some("true") => Ok(Scalar::Bool(true)),
            Some("false") => Ok(Scalar::Bool(false)),
            _ => Err(malformed("boolean cell")),
        },
        VALUE_DOUBLE => match value {
            Value::Double(d) => Ok(Scalar::Float(d)),
            other => text(&other)
                .and_then(|s| s.parse().ok())
                .map(Scalar::Float)
                .ok_or_else(|| malformed("double cell")),
        },
        VALUE_ARRAY => match value {
            Value::Array(items) => items
                .into_iter()
                .map(decode_cell)
                .collect::<Result<Vec<_>>>()
                .map(Scalar::List),
            _ => Err(malformed("array cell")),
        },
        other => Err(MigrationError::query(
            StoreKind::Target,
            format!("unsupported value type {other} in result; return scalar properties instead"),
        )),
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(bytes) => String::from_utf8(bytes.clone()).ok(),
        Value::SimpleString(s) => Some(s.clone()),
        Value::VerbatimString { text, .. } => Some(text.clone()),
        _ => None,
    }
}
