use std::fmt;

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, DeError, Graph, Row};
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use tracing::debug;

use graphport_common::{MigrationError, RawRow, Result, Scalar, StoreKind};

use crate::cypher;
use crate::StoreClient;

/// Neo4j over bolt. Rows come back as field-named records.
///
/// The driver keys each record by field name without keeping the field
/// order, so columns are put back in the order the query projects them.
#[derive(Clone)]
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    /// Connect to Neo4j with the given credentials.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let config = ConfigBuilder::default()
            .uri(uri)
            .user(user)
            .password(password)
            .fetch_size(500)
            .max_connections(4)
            .build()
            .map_err(|e| MigrationError::query(StoreKind::Source, e))?;
        let graph = Graph::connect(config)
            .await
            .map_err(|e| MigrationError::query(StoreKind::Source, e))?;
        Ok(Self { graph })
    }

    /// Get a reference to the underlying neo4rs Graph.
    pub fn inner(&self) -> &Graph {
        &self.graph
    }
}

#[async_trait]
impl StoreClient for Neo4jStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Source
    }

    async fn execute(&self, statement: &str) -> Result<Vec<RawRow>> {
        debug!(store = %StoreKind::Source, cypher = statement, "Executing query");
        let fail = |e: neo4rs::Error| MigrationError::query(StoreKind::Source, e);

        let columns = cypher::result_columns(statement);
        let mut stream = self.graph.execute(query(statement)).await.map_err(fail)?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(fail)? {
            let fields = decode_row(&row, columns.as_deref())
                .map_err(|e| MigrationError::query(StoreKind::Source, e))?;
            rows.push(RawRow::Named(fields));
        }
        Ok(rows)
    }
}

/// Decode a record in `columns` order. Without known columns (procedure
/// calls with no `YIELD`) fields are sorted by name.
fn decode_row(
    row: &Row,
    columns: Option<&[String]>,
) -> std::result::Result<Vec<(String, Scalar)>, DeError> {
    match columns {
        Some(columns) => columns
            .iter()
            .map(|column| row.get::<Scalar>(column).map(|value| (column.clone(), value)))
            .collect(),
        None => {
            let NamedRecord(mut fields) = row.to()?;
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(fields)
        }
    }
}

/// A bolt record decoded field by field, in the driver's map order.
struct NamedRecord(Vec<(String, Scalar)>);

impl<'de> Deserialize<'de> for NamedRecord {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(RecordVisitor)
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = NamedRecord;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a bolt record")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<NamedRecord, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((key, value)) = map.next_entry::<String, Scalar>()? {
            fields.push((key, value));
        }
        Ok(NamedRecord(fields))
    }
}

#[cfg(test)]
mod tests {
    use neo4rs::{BoltList, BoltType};

    use super::*;

    const COLUMNS: [&str; 8] = [
        "u.name", "u.age", "u.city", "u.email", "u.joined", "u.likes", "u.score", "u.tag",
    ];

    fn user_row(name: &str) -> Row {
        let fields: Vec<BoltType> = COLUMNS.iter().map(|c| BoltType::from(*c)).collect();
        let data: Vec<BoltType> = vec![
            name.into(),
            30i64.into(),
            "Oslo".into(),
            format!("{name}@example.com").into(),
            "2024-01-01T00:00:00Z".into(),
            7i64.into(),
            1.5f64.into(),
            true.into(),
        ];
        Row::new(BoltList::from(fields), BoltList::from(data))
    }

    #[test]
    fn rows_decode_in_projection_order() {
        let columns = cypher::result_columns(&format!(
            "MATCH (u:User) RETURN {} ORDER BY u.name",
            COLUMNS.join(", ")
        ))
        .unwrap();

        for i in 0..20 {
            let name = format!("user{i}");
            let fields = decode_row(&user_row(&name), Some(&columns)).unwrap();
            let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
            assert_eq!(keys, COLUMNS);
            assert_eq!(fields[0].1, Scalar::Text(name));
            assert_eq!(fields[1].1, Scalar::Int(30));
            assert_eq!(fields[6].1, Scalar::Float(1.5));
            assert_eq!(fields[7].1, Scalar::Bool(true));
        }
    }

    #[test]
    fn unknown_projection_sorts_fields_by_name() {
        let fields = decode_row(&user_row("alice"), None).unwrap();
        let keys: Vec<&str> = fields.iter().map(|(k, _)| k.as_str()).collect();
        let mut sorted = COLUMNS.to_vec();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn missing_column_is_an_error() {
        let columns = vec!["u.name".to_string(), "u.nickname".to_string()];
        assert!(decode_row(&user_row("alice"), Some(&columns)).is_err());
    }
}
