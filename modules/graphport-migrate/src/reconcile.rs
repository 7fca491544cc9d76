//! Cross-store reconciliation.
//!
//! Each comparison runs against the source, then the target, normalizes and
//! sorts both row sets, and records whether they are equal. A mismatch is a
//! value in the report; only query failures are errors.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use graphport_common::{RawRow, Result, StoreKind};
use graphport_graph::{StoreClient, Stores};

use crate::normalize::{normalize_sorted, NormalizedRow};

/// Query text for a comparison: one query for both stores, or one per store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparisonSpec {
    Shared(String),
    Paired { source: String, target: String },
}

impl ComparisonSpec {
    pub fn query_for(&self, kind: StoreKind) -> &str {
        match (self, kind) {
            (ComparisonSpec::Shared(query), _) => query,
            (ComparisonSpec::Paired { source, .. }, StoreKind::Source) => source,
            (ComparisonSpec::Paired { target, .. }, StoreKind::Target) => target,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub name: String,
    pub spec: ComparisonSpec,
}

impl Comparison {
    pub fn shared(name: &str, query: &str) -> Self {
        Self {
            name: name.to_string(),
            spec: ComparisonSpec::Shared(query.to_string()),
        }
    }

    pub fn paired(name: &str, source: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            spec: ComparisonSpec::Paired {
                source: source.to_string(),
                target: target.to_string(),
            },
        }
    }
}

/// The standard checks for the User/Post social graph.
///
/// Relationship comparisons are paired: the source derives relationship
/// identity from `elementId` and timestamps from typed temporals, while the
/// target carries both as plain properties written during the load.
pub fn default_comparisons() -> Vec<Comparison> {
    vec![
        Comparison::shared("node_count", "MATCH (n) RETURN count(n) AS count"),
        Comparison::shared("rel_count", "MATCH ()-[r]->() RETURN count(r) AS count"),
        Comparison::shared(
            "user_sample",
            "MATCH (u:User) RETURN u.name, u.age, u.city, u.email ORDER BY u.name",
        ),
        Comparison::shared(
            "post_sample",
            "MATCH (p:Post) RETURN p.name, p.likes, p.category, p.image_url ORDER BY p.name",
        ),
        Comparison::paired(
            "created_rels",
            "MATCH (u:User)-[r:CREATED]->(p:Post) \
             RETURN elementId(r), datetime(r.timestamp).epochMillis ORDER BY elementId(r)",
            "MATCH (u:User)-[r:CREATED]->(p:Post) \
             RETURN r.element_id, r.timestamp ORDER BY r.element_id",
        ),
        Comparison::paired(
            "friends_with_rels",
            "MATCH (u1:User)-[r:FRIENDS_WITH]->(u2:User) \
             RETURN elementId(r), datetime({date: r.since}).epochMillis ORDER BY elementId(r)",
            "MATCH (u1:User)-[r:FRIENDS_WITH]->(u2:User) \
             RETURN r.element_id, toInteger(r.since) ORDER BY r.element_id",
        ),
    ]
}

/// Outcome of one comparison. Both row sets are normalized and sorted.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonResult {
    pub name: String,
    pub source_rows: Vec<NormalizedRow>,
    pub target_rows: Vec<NormalizedRow>,
    pub matched: bool,
}

impl ComparisonResult {
    pub fn from_rows(name: &str, source: &[RawRow], target: &[RawRow]) -> Self {
        let source_rows = normalize_sorted(source);
        let target_rows = normalize_sorted(target);
        let matched = source_rows == target_rows;
        Self {
            name: name.to_string(),
            source_rows,
            target_rows,
            matched,
        }
    }
}

impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.matched { "✅" } else { "❌" };
        write!(
            f,
            "{mark} {}: {} source vs {} target",
            self.name,
            self.source_rows.len(),
            self.target_rows.len()
        )
    }
}

/// All comparison results, in declared order.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationReport {
    pub results: Vec<ComparisonResult>,
}

impl ReconciliationReport {
    pub fn all_matched(&self) -> bool {
        self.results.iter().all(|r| r.matched)
    }

    pub fn mismatches(&self) -> Vec<&ComparisonResult> {
        self.results.iter().filter(|r| !r.matched).collect()
    }
}

impl fmt::Display for ReconciliationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            writeln!(f, "{result}")?;
        }
        Ok(())
    }
}

pub struct Reconciler {
    source: Arc<dyn StoreClient>,
    target: Arc<dyn StoreClient>,
    comparisons: Vec<Comparison>,
}

impl Reconciler {
    pub fn new(stores: &Stores, comparisons: Vec<Comparison>) -> Self {
        Self {
            source: stores.source.clone(),
            target: stores.target.clone(),
            comparisons,
        }
    }

    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    /// Run one comparison: source first, then target.
    pub async fn compare(&self, comparison: &Comparison) -> Result<ComparisonResult> {
        info!(comparison = comparison.name.as_str(), "Comparing");
        let source_rows = self
            .source
            .execute(comparison.spec.query_for(StoreKind::Source))
            .await?;
        let target_rows = self
            .target
            .execute(comparison.spec.query_for(StoreKind::Target))
            .await?;

        let result = ComparisonResult::from_rows(&comparison.name, &source_rows, &target_rows);
        debug!(
            comparison = result.name.as_str(),
            source = ?result.source_rows,
            target = ?result.target_rows,
            "Normalized rows"
        );
        if result.matched {
            info!("{result}");
        } else {
            warn!("{result}");
        }
        Ok(result)
    }

    /// Run every comparison in declared order.
    pub async fn run(&self) -> Result<ReconciliationReport> {
        let mut results = Vec::with_capacity(self.comparisons.len());
        for comparison in &self.comparisons {
            results.push(self.compare(comparison).await?);
        }
        let report = ReconciliationReport { results };
        info!(
            comparisons = report.results.len(),
            mismatches = report.mismatches().len(),
            "Reconciliation finished"
        );
        Ok(report)
    }
}
