// Test doubles for the migration pipeline.
//
// Three mocks matching the three trait boundaries:
// - MockStore (StoreClient + ConstraintAdmin): stateful in-memory graph that
//   understands the handful of statements reset and verification issue
// - ScriptedDecisions (DecisionSource): queued gate answers and named values
// - CountingRecovery (Recovery): counts invocations, optionally fails

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use graphport_common::{MigrationError, RawRow, Result, Scalar, StoreKind};
use graphport_graph::{ConstraintAdmin, StoreClient, Stores};

use crate::decision::DecisionSource;
use crate::pipeline::Recovery;

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MockConstraint {
    name: String,
    label: String,
    property: String,
}

#[derive(Default)]
struct MockState {
    nodes: i64,
    constraints: Vec<MockConstraint>,
    scripted: Vec<(String, Vec<RawRow>)>,
    failures: Vec<(String, String)>,
    executed: Vec<String>,
}

/// In-memory graph store. Source mocks return named rows, target mocks
/// positional rows, the same as the real drivers.
///
/// Built-in behaviour, checked after failures and scripted responses:
/// - `... DETACH DELETE ...` empties the graph
/// - `SHOW CONSTRAINTS` lists the registered constraints
/// - `DROP CONSTRAINT `name` IF EXISTS` removes one
/// - any other query containing `count(` returns the node count
/// - everything else returns no rows
pub struct MockStore {
    kind: StoreKind,
    state: Mutex<MockState>,
}

impl MockStore {
    fn new(kind: StoreKind) -> Self {
        Self {
            kind,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn source() -> Self {
        Self::new(StoreKind::Source)
    }

    pub fn target() -> Self {
        Self::new(StoreKind::Target)
    }

    pub fn with_nodes(self, nodes: i64) -> Self {
        self.state.lock().unwrap().nodes = nodes;
        self
    }

    pub fn with_constraint(self, name: &str, label: &str, property: &str) -> Self {
        self.state.lock().unwrap().constraints.push(MockConstraint {
            name: name.to_string(),
            label: label.to_string(),
            property: property.to_string(),
        });
        self
    }

    /// Answer any query containing `pattern` with `rows`.
    pub fn on_query(self, pattern: &str, rows: Vec<RawRow>) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripted
            .push((pattern.to_string(), rows));
        self
    }

    /// Fail any query or admin command containing `pattern`.
    pub fn fail_on(self, pattern: &str, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((pattern.to_string(), message.to_string()));
        self
    }

    /// Every statement seen, in order. Admin calls appear as
    /// `GRAPH.CONSTRAINT <op> <label> <property>`.
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn ran(&self, pattern: &str) -> bool {
        self.executed().iter().any(|q| q.contains(pattern))
    }

    pub fn node_count(&self) -> i64 {
        self.state.lock().unwrap().nodes
    }

    pub fn constraint_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .constraints
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    fn row(&self, fields: Vec<(&str, Scalar)>) -> RawRow {
        match self.kind {
            StoreKind::Source => RawRow::Named(
                fields
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
            ),
            StoreKind::Target => RawRow::Positional(fields.into_iter().map(|(_, v)| v).collect()),
        }
    }

    /// Record `statement` and apply any injected failure.
    fn record(&self, state: &mut MockState, statement: &str) -> Result<()> {
        state.executed.push(statement.to_string());
        if let Some((_, message)) = state
            .failures
            .iter()
            .find(|(pattern, _)| statement.contains(pattern.as_str()))
        {
            return Err(MigrationError::query(self.kind, message));
        }
        Ok(())
    }

    fn constraint_rows(&self, state: &MockState) -> Vec<RawRow> {
        state
            .constraints
            .iter()
            .enumerate()
            .map(|(id, c)| {
                self.row(vec![
                    ("id", Scalar::Int(id as i64 + 1)),
                    ("name", Scalar::Text(c.name.clone())),
                    ("type", Scalar::Text("UNIQUENESS".into())),
                    ("entityType", Scalar::Text("NODE".into())),
                    ("labelsOrTypes", Scalar::List(vec![Scalar::Text(c.label.clone())])),
                    ("properties", Scalar::List(vec![Scalar::Text(c.property.clone())])),
                    ("ownedIndex", Scalar::Text(c.name.clone())),
                    ("propertyType", Scalar::Null),
                ])
            })
            .collect()
    }
}

fn backticked(query: &str) -> Option<String> {
    let start = query.find('`')? + 1;
    let len = query[start..].find('`')?;
    Some(query[start..start + len].to_string())
}

#[async_trait]
impl StoreClient for MockStore {
    fn kind(&self) -> StoreKind {
        self.kind
    }

    async fn execute(&self, query: &str) -> Result<Vec<RawRow>> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, query)?;

        if let Some((_, rows)) = state
            .scripted
            .iter()
            .find(|(pattern, _)| query.contains(pattern.as_str()))
        {
            return Ok(rows.clone());
        }

        let trimmed = query.trim_start();
        if query.contains("DETACH DELETE") {
            state.nodes = 0;
            Ok(Vec::new())
        } else if trimmed.starts_with("SHOW CONSTRAINTS") {
            Ok(self.constraint_rows(&state))
        } else if trimmed.starts_with("DROP CONSTRAINT") {
            if let Some(name) = backticked(query) {
                state.constraints.retain(|c| c.name != name);
            }
            Ok(Vec::new())
        } else if query.contains("count(") {
            Ok(vec![self.row(vec![("count", Scalar::Int(state.nodes))])])
        } else {
            Ok(Vec::new())
        }
    }
}

#[async_trait]
impl ConstraintAdmin for MockStore {
    async fn create_unique_constraint(&self, label: &str, property: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, &format!("GRAPH.CONSTRAINT CREATE {label} {property}"))?;
        let exists = state
            .constraints
            .iter()
            .any(|c| c.label == label && c.property == property);
        if !exists {
            state.constraints.push(MockConstraint {
                name: format!("{label}_{property}_unique"),
                label: label.to_string(),
                property: property.to_string(),
            });
        }
        Ok(())
    }

    async fn drop_unique_constraint(&self, label: &str, property: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.record(&mut state, &format!("GRAPH.CONSTRAINT DROP {label} {property}"))?;
        let before = state.constraints.len();
        state
            .constraints
            .retain(|c| !(c.label == label && c.property == property));
        if state.constraints.len() == before {
            return Err(MigrationError::query(
                self.kind,
                format!("ERR no such constraint on :{label}({property})"),
            ));
        }
        Ok(())
    }
}

/// Wire two mocks together as a store pair.
pub fn mock_stores(source: &Arc<MockStore>, target: &Arc<MockStore>) -> Stores {
    Stores::new(source.clone(), target.clone())
}

// ---------------------------------------------------------------------------
// ScriptedDecisions
// ---------------------------------------------------------------------------

/// Gate answers are consumed in order; once exhausted every gate says yes.
/// Named values fall back to the offered default.
#[derive(Default)]
pub struct ScriptedDecisions {
    answers: Mutex<VecDeque<bool>>,
    values: HashMap<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedDecisions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answers(self, answers: impl IntoIterator<Item = bool>) -> Self {
        self.answers.lock().unwrap().extend(answers);
        self
    }

    pub fn with_value(mut self, name: &str, value: &str) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    /// Every confirmation prompt asked so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl DecisionSource for ScriptedDecisions {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers.lock().unwrap().pop_front().unwrap_or(true)
    }

    fn read_value(&self, name: &str, default: &str) -> String {
        self.values
            .get(name)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

// ---------------------------------------------------------------------------
// CountingRecovery
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct CountingRecovery {
    calls: AtomicUsize,
    failure: Option<String>,
}

impl CountingRecovery {
    /// A recovery that is counted and then fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failure: Some(message.to_string()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recovery for CountingRecovery {
    async fn recover(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(MigrationError::query(StoreKind::Target, message)),
            None => Ok(()),
        }
    }
}
