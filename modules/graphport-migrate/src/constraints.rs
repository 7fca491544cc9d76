//! `constraints.csv`: the exported `SHOW CONSTRAINTS` table.
//!
//! List columns (`labelsOrTypes`, `properties`) are written as bracketed,
//! single-quoted lists and read back with [`parse_string_list`], a small
//! tokenizer that accepts exactly that shape and nothing else.

use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

use tracing::debug;

use graphport_common::{MigrationError, RawRow, Result, Scalar};

pub const CONSTRAINTS_FILE: &str = "constraints.csv";

/// Column layout of Neo4j 5 `SHOW CONSTRAINTS`, used when there are no rows
/// to take the header from.
pub const CONSTRAINT_HEADERS: [&str; 8] = [
    "id",
    "name",
    "type",
    "entityType",
    "labelsOrTypes",
    "properties",
    "ownedIndex",
    "propertyType",
];

/// One row of `constraints.csv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintRecord {
    pub name: String,
    pub kind: String,
    pub entity_type: String,
    pub labels: Vec<String>,
    pub properties: Vec<String>,
}

impl ConstraintRecord {
    /// `(label, property)` for a node uniqueness constraint. Only the first
    /// label and property are used; composite constraints are narrowed.
    pub fn unique_node_target(&self) -> Option<(&str, &str)> {
        let unique = matches!(self.kind.as_str(), "UNIQUENESS" | "NODE_PROPERTY_UNIQUENESS");
        if !unique || self.entity_type != "NODE" {
            return None;
        }
        Some((self.labels.first()?.as_str(), self.properties.first()?.as_str()))
    }
}

/// Parse `['a', "b"]` into its strings. An empty cell is an empty list.
pub fn parse_string_list(input: &str) -> Result<Vec<String>> {
    let fail = |reason: &str| MigrationError::ConstraintFormat {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| fail("expected a bracketed list"))?;

    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        skip_whitespace(&mut chars);
        let Some(quote) = chars.next() else {
            if items.is_empty() {
                break;
            }
            return Err(fail("trailing comma"));
        };
        if quote != '\'' && quote != '"' {
            return Err(fail("expected a quoted string"));
        }

        let mut item = String::new();
        loop {
            match chars.next() {
                None => return Err(fail("unterminated string")),
                Some('\\') => match chars.next() {
                    Some(c) => item.push(c),
                    None => return Err(fail("dangling escape")),
                },
                Some(c) if c == quote => break,
                Some(c) => item.push(c),
            }
        }
        items.push(item);

        skip_whitespace(&mut chars);
        match chars.next() {
            None => break,
            Some(',') => {}
            Some(_) => return Err(fail("expected ',' between items")),
        }
    }
    Ok(items)
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.peek().is_some_and(|c| c.is_whitespace()) {
        chars.next();
    }
}

/// Write `SHOW CONSTRAINTS` rows with a header row.
pub fn write_constraints_csv(path: &Path, rows: &[RawRow]) -> Result<()> {
    let headers: Vec<String> = match rows.first() {
        Some(row) if !row.keys().is_empty() => row.keys().into_iter().map(String::from).collect(),
        _ => CONSTRAINT_HEADERS.iter().map(|h| h.to_string()).collect(),
    };

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&headers)?;
    for row in rows {
        writer.write_record(constraint_cells(row, &headers))?;
    }
    writer.flush()?;
    debug!(path = %path.display(), constraints = rows.len(), "Wrote constraints");
    Ok(())
}

/// Cells for `headers`: named rows by field name, so a row whose fields come
/// in another order still lands under the right columns.
fn constraint_cells(row: &RawRow, headers: &[String]) -> Vec<String> {
    match row {
        RawRow::Named(_) => headers
            .iter()
            .map(|h| row.field(h).map(Scalar::to_csv_field).unwrap_or_default())
            .collect(),
        RawRow::Positional(values) => values.iter().map(Scalar::to_csv_field).collect(),
    }
}

/// Read `constraints.csv` back into records.
pub fn read_constraints(path: &Path) -> Result<Vec<ConstraintRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| MigrationError::ConstraintFormat {
                input: headers.iter().collect::<Vec<_>>().join(","),
                reason: format!("missing column {name}"),
            })
    };
    let name_col = column("name")?;
    let kind_col = column("type")?;
    let entity_col = column("entityType")?;
    let labels_col = column("labelsOrTypes")?;
    let props_col = column("properties")?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let cell = |idx: usize| row.get(idx).unwrap_or_default();
        records.push(ConstraintRecord {
            name: cell(name_col).to_string(),
            kind: cell(kind_col).to_string(),
            entity_type: cell(entity_col).to_string(),
            labels: parse_string_list(cell(labels_col))?,
            properties: parse_string_list(cell(props_col))?,
        });
    }
    Ok(records)
}
