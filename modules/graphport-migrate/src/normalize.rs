//! Canonical row form for cross-store comparison.
//!
//! Store-native differences (named vs positional rows, driver null sentinels)
//! are already absorbed by the drivers decoding into [`Scalar`]. What is left
//! here is value canonicalisation:
//! - ISO-8601 date-time text, which is also how the Neo4j driver hands back
//!   native temporals, becomes epoch milliseconds
//! - null, NaN and the empty string collapse to [`Canonical::Null`]
//! - everything else passes through
//!
//! [`Canonical`] has a total order so sorted row sets can be compared directly.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::warn;

use graphport_common::{RawRow, Scalar};

/// A value in canonical comparable form.
#[derive(Debug, Clone)]
pub enum Canonical {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Canonical>),
}

pub type NormalizedRow = Vec<Canonical>;

impl Canonical {
    fn rank(&self) -> u8 {
        match self {
            Canonical::Null => 0,
            Canonical::Bool(_) => 1,
            Canonical::Int(_) => 2,
            Canonical::Float(_) => 3,
            Canonical::Text(_) => 4,
            Canonical::List(_) => 5,
        }
    }
}

impl Ord for Canonical {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Canonical::Null, Canonical::Null) => Ordering::Equal,
            (Canonical::Bool(a), Canonical::Bool(b)) => a.cmp(b),
            (Canonical::Int(a), Canonical::Int(b)) => a.cmp(b),
            (Canonical::Float(a), Canonical::Float(b)) => a.total_cmp(b),
            (Canonical::Text(a), Canonical::Text(b)) => a.cmp(b),
            (Canonical::List(a), Canonical::List(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Canonical {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Canonical {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Canonical {}

impl fmt::Display for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Canonical::Null => f.write_str("null"),
            Canonical::Bool(b) => write!(f, "{b}"),
            Canonical::Int(i) => write!(f, "{i}"),
            Canonical::Float(x) => write!(f, "{x}"),
            Canonical::Text(s) => write!(f, "{s:?}"),
            Canonical::List(items) => {
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

/// Normalize one row from either store.
pub fn normalize(row: &RawRow) -> NormalizedRow {
    row.values().into_iter().map(canonicalize).collect()
}

/// Normalize and sort a full result set.
pub fn normalize_sorted(rows: &[RawRow]) -> Vec<NormalizedRow> {
    let mut normalized: Vec<NormalizedRow> = rows.iter().map(normalize).collect();
    normalized.sort();
    normalized
}

pub fn canonicalize(value: &Scalar) -> Canonical {
    match value {
        Scalar::Null => Canonical::Null,
        Scalar::Bool(b) => Canonical::Bool(*b),
        Scalar::Int(i) => Canonical::Int(*i),
        Scalar::Float(x) if x.is_nan() => Canonical::Null,
        Scalar::Float(x) => Canonical::Float(*x),
        Scalar::Text(s) if s.is_empty() => Canonical::Null,
        Scalar::Text(s) if looks_like_timestamp(s) => match parse_timestamp_millis(s) {
            Some(millis) => Canonical::Int(millis),
            None => {
                warn!(value = s.as_str(), "Unparseable timestamp normalized to null");
                Canonical::Null
            }
        },
        Scalar::Text(s) => Canonical::Text(s.clone()),
        Scalar::List(items) => Canonical::List(items.iter().map(canonicalize).collect()),
    }
}

/// `YYYY-MM-DDT...`: the shape of an ISO-8601 date-time. Plain words that
/// happen to contain a `T` are not timestamps.
pub fn looks_like_timestamp(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() >= 11
        && b[..4].iter().all(u8::is_ascii_digit)
        && b[4] == b'-'
        && b[5..7].iter().all(u8::is_ascii_digit)
        && b[7] == b'-'
        && b[8..10].iter().all(u8::is_ascii_digit)
        && b[10] == b'T'
}

/// Parse an ISO-8601 date-time to epoch milliseconds. Offsets are honoured;
/// naive values are taken as UTC. A trailing `[Region/City]` zone id, as Neo4j
/// prints zoned datetimes, is ignored in favour of the numeric offset.
pub fn parse_timestamp_millis(s: &str) -> Option<i64> {
    let s = s.trim();
    let s = match s.find('[') {
        Some(idx) if s.ends_with(']') => &s[..idx],
        _ => s,
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.timestamp_millis());
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    None
}

/// Like [`parse_timestamp_millis`] but also accepts a bare `YYYY-MM-DD`
/// date (midnight UTC). Used when rewriting exported temporal columns.
pub fn parse_temporal_millis(s: &str) -> Option<i64> {
    parse_timestamp_millis(s).or_else(|| {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc().timestamp_millis())
    })
}
