//! In-process test double
//!
//! Behaves like a tiny relational database with one list of rows per table.
//! Clones share the same state, so a test can hand one clone to the
//! [`Sink`](super::Sink) and inspect the other. Failures and insert latency
//! can be injected to exercise the error and backpressure paths.

use super::{SinkAdapter, Statement};
use crate::config::ConnectionParams;
use crate::error::{IngestError, Result};
use crate::record::Record;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Default)]
struct MemoryState {
    connected: bool,
    refuse_connections: bool,
    tables: HashMap<String, Vec<Record>>,
    batches: Vec<(String, usize)>,
    failing_creates: HashSet<String>,
    failing_inserts: HashSet<String>,
    insert_latency: Option<Duration>,
    inserts_in_flight: usize,
    max_inserts_in_flight: usize,
    statements: usize,
}

/// Shared in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every `connect` fail
    pub fn refuse_connections(self) -> Self {
        self.state().refuse_connections = true;
        self
    }

    /// Make `CREATE TABLE` fail for one table
    pub fn fail_create(self, table: &str) -> Self {
        self.state().failing_creates.insert(table.to_string());
        self
    }

    /// Make every insert into one table fail
    pub fn fail_inserts(self, table: &str) -> Self {
        self.state().failing_inserts.insert(table.to_string());
        self
    }

    /// Hold each insert open for a while before it completes
    pub fn with_insert_latency(self, latency: Duration) -> Self {
        self.state().insert_latency = Some(latency);
        self
    }

    /// Rows of a table, `None` if it does not exist
    pub fn rows(&self, table: &str) -> Option<Vec<Record>> {
        self.state().tables.get(table).cloned()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state().tables.contains_key(table)
    }

    /// Sizes of all inserted batches, in the order they were issued
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state().batches.iter().map(|(_, size)| *size).collect()
    }

    /// Highest number of inserts that were running at the same time
    pub fn max_inserts_in_flight(&self) -> usize {
        self.state().max_inserts_in_flight
    }

    /// Total statements executed
    pub fn statement_count(&self) -> usize {
        self.state().statements
    }

    fn apply(&self, statement: Statement<'_>) -> Result<u64> {
        let mut state = self.state();
        if !state.connected {
            return Err(IngestError::Connection("Database not connected".to_string()));
        }
        state.statements += 1;

        match statement {
            Statement::DropTable { table } => {
                Ok(state.tables.remove(table).map_or(0, |rows| rows.len() as u64))
            },
            Statement::CreateTable { table } => {
                if state.failing_creates.contains(table) {
                    return Err(statement.failure("injected create failure"));
                }
                if state.tables.contains_key(table) {
                    return Err(statement.failure("table already exists"));
                }
                state.tables.insert(table.to_string(), Vec::new());
                Ok(0)
            },
            Statement::InsertRows { table, rows } => {
                if state.failing_inserts.contains(table) {
                    return Err(statement.failure("injected insert failure"));
                }
                let target = state
                    .tables
                    .get_mut(table)
                    .ok_or_else(|| statement.failure("table does not exist"))?;
                target.extend_from_slice(rows);
                state.batches.push((table.to_string(), rows.len()));
                Ok(rows.len() as u64)
            },
        }
    }
}

#[async_trait]
impl SinkAdapter for MemoryAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    async fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        let mut state = self.state();
        if state.refuse_connections {
            return Err(IngestError::Connection(format!(
                "Connection to {} refused",
                params.host
            )));
        }
        state.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut state = self.state();
        if !state.connected {
            return Err(IngestError::Connection(
                "No active connection to disconnect".to_string(),
            ));
        }
        state.connected = false;
        Ok(())
    }

    async fn execute(&self, statement: Statement<'_>) -> Result<u64> {
        let latency = match statement {
            Statement::InsertRows { .. } => self.state().insert_latency,
            _ => None,
        };

        let Some(latency) = latency else {
            return self.apply(statement);
        };

        {
            let mut state = self.state();
            state.inserts_in_flight += 1;
            state.max_inserts_in_flight = state.max_inserts_in_flight.max(state.inserts_in_flight);
        }
        let result = self.apply(statement);
        tokio::time::sleep(latency).await;
        self.state().inserts_in_flight -= 1;
        result
    }
}
