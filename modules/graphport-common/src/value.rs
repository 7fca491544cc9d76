//! Store-native row values.
//!
//! Both drivers decode into [`Scalar`] at their boundary, so nothing downstream
//! inspects driver types. Row shape differs per store: Neo4j hands back
//! field-named records, FalkorDB positional tuples. [`RawRow::values`] is the
//! single projection from either shape to a plain value sequence.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, SeqAccess, Visitor};

/// A single value as returned by a store.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Scalar>),
}

impl Scalar {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render for a CSV cell. Null is the empty cell; lists use the
    /// bracketed single-quoted form (`['User', 'Post']`).
    pub fn to_csv_field(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::List(items) => {
                let inner: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        Scalar::Text(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
                        other => other.to_csv_field(),
                    })
                    .collect();
                format!("[{}]", inner.join(", "))
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Text(s) => f.write_str(s),
            Scalar::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ScalarVisitor)
    }
}

struct ScalarVisitor;

impl<'de> Visitor<'de> for ScalarVisitor {
    type Value = Scalar;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a scalar graph value or a list of scalars")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Scalar, E> {
        Ok(Scalar::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Scalar, E> {
        Ok(Scalar::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Scalar, E> {
        Ok(i64::try_from(v)
            .map(Scalar::Int)
            .unwrap_or(Scalar::Float(v as f64)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Scalar, E> {
        Ok(Scalar::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Scalar, E> {
        Ok(Scalar::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Scalar, E> {
        Ok(Scalar::Text(v))
    }

    fn visit_none<E: de::Error>(self) -> Result<Scalar, E> {
        Ok(Scalar::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Scalar, E> {
        Ok(Scalar::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Scalar, D::Error>
    where
        D: Deserializer<'de>,
    {
        Scalar::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Scalar, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Scalar>()? {
            items.push(item);
        }
        Ok(Scalar::List(items))
    }
}

/// A result row in the store's native shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    /// Field-named record, columns in query order.
    Named(Vec<(String, Scalar)>),
    /// Positional tuple.
    Positional(Vec<Scalar>),
}

impl RawRow {
    /// Project to the plain value tuple. Field names never enter comparisons.
    pub fn values(&self) -> Vec<&Scalar> {
        match self {
            RawRow::Named(fields) => fields.iter().map(|(_, v)| v).collect(),
            RawRow::Positional(values) => values.iter().collect(),
        }
    }

    pub fn first(&self) -> Option<&Scalar> {
        match self {
            RawRow::Named(fields) => fields.first().map(|(_, v)| v),
            RawRow::Positional(values) => values.first(),
        }
    }

    /// Look up a column by name. Positional rows carry no names.
    pub fn field(&self, name: &str) -> Option<&Scalar> {
        match self {
            RawRow::Named(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            RawRow::Positional(_) => None,
        }
    }

    /// Column names, for named rows.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            RawRow::Named(fields) => fields.iter().map(|(k, _)| k.as_str()).collect(),
            RawRow::Positional(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawRow::Named(fields) => fields.len(),
            RawRow::Positional(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
