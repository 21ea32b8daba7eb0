//! Relational sink
//!
//! A [`SinkAdapter`] knows how to reach one kind of store and run the three
//! statements ingestion needs. The [`Sink`] session owns exactly one adapter
//! for the whole run and turns table maintenance and batch inserts into
//! those statements.
//!
//! Every destination table has the same shape:
//!
//! | column         | type                         |
//! |----------------|------------------------------|
//! | `id`           | auto-increment primary key   |
//! | `ngram`        | text                         |
//! | `year`         | text                         |
//! | `match_count`  | text                         |
//! | `volume_count` | text                         |

pub mod memory;
pub mod mysql;
pub mod postgres;

use crate::config::{ConnectionParams, SinkKind};
use crate::error::{IngestError, Result};
use crate::record::Record;
use async_trait::async_trait;
use tracing::{debug, info};

pub use memory::MemoryAdapter;
pub use mysql::MysqlAdapter;
pub use postgres::PostgresAdapter;

/// Longest identifier both Postgres (63) and MySQL (64) accept
const MAX_IDENTIFIER_LEN: usize = 63;

/// Data columns in insert order; `id` is generated by the store
pub const DATA_COLUMNS: [&str; 4] = ["ngram", "year", "match_count", "volume_count"];

/// A statement an adapter must be able to run
#[derive(Debug, Clone, Copy)]
pub enum Statement<'a> {
    DropTable { table: &'a str },
    CreateTable { table: &'a str },
    InsertRows { table: &'a str, rows: &'a [Record] },
}

impl Statement<'_> {
    /// Wrap a store error in the variant matching this statement
    pub fn failure(&self, message: impl Into<String>) -> IngestError {
        match self {
            Statement::DropTable { table } | Statement::CreateTable { table } => {
                IngestError::Schema {
                    table: table.to_string(),
                    message: message.into(),
                }
            },
            Statement::InsertRows { table, .. } => IngestError::Write {
                table: table.to_string(),
                message: message.into(),
            },
        }
    }
}

/// Backend for one kind of relational store
///
/// `execute` takes `&self` and may be called concurrently by in-flight batch
/// inserts; implementations must either tolerate that or serialize
/// internally.
#[async_trait]
pub trait SinkAdapter: Send + Sync {
    /// Short name used in logs, e.g. "postgres"
    fn name(&self) -> &'static str;

    fn is_connected(&self) -> bool;

    async fn connect(&mut self, params: &ConnectionParams) -> Result<()>;

    /// Fails with [`IngestError::Connection`] when nothing is connected
    async fn disconnect(&mut self) -> Result<()>;

    /// Run a statement, returning the number of affected rows
    async fn execute(&self, statement: Statement<'_>) -> Result<u64>;
}

/// Build the adapter for a configured store
pub fn adapter_for(kind: SinkKind, max_connections: u32) -> Box<dyn SinkAdapter> {
    match kind {
        SinkKind::Postgres => Box::new(PostgresAdapter::new(max_connections)),
        SinkKind::Mysql => Box::new(MysqlAdapter::new(max_connections)),
    }
}

/// The run's single sink session
pub struct Sink {
    adapter: Box<dyn SinkAdapter>,
}

impl Sink {
    pub fn new(adapter: Box<dyn SinkAdapter>) -> Self {
        Self { adapter }
    }

    /// Replace the adapter; refused while the current one is connected
    pub fn use_adapter(&mut self, adapter: Box<dyn SinkAdapter>) -> Result<()> {
        if self.adapter.is_connected() {
            return Err(IngestError::AdapterInUse {
                active: self.adapter.name().to_string(),
                requested: adapter.name().to_string(),
            });
        }
        self.adapter = adapter;
        Ok(())
    }

    pub fn adapter_name(&self) -> &'static str {
        self.adapter.name()
    }

    pub fn is_connected(&self) -> bool {
        self.adapter.is_connected()
    }

    pub async fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        self.adapter.connect(params).await?;
        info!(adapter = self.adapter.name(), schema = %params.schema, "Connected to sink");
        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.adapter.disconnect().await?;
        info!(adapter = self.adapter.name(), "Disconnected from sink");
        Ok(())
    }

    /// Drop the table if it exists and create it empty
    pub async fn recreate_table(&self, table: &str) -> Result<()> {
        checked_identifier(table)?;
        info!(table, "Creating table if not exists");

        self.adapter.execute(Statement::DropTable { table }).await?;
        self.adapter.execute(Statement::CreateTable { table }).await?;
        Ok(())
    }

    /// Insert all rows with a single multi-row statement
    pub async fn insert_batch(&self, table: &str, rows: &[Record]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        checked_identifier(table)
            .map_err(|e| Statement::InsertRows { table, rows }.failure(e.to_string()))?;
        debug!(table, rows = rows.len(), "Inserting batch");

        self.adapter
            .execute(Statement::InsertRows { table, rows })
            .await
    }
}

/// Reject table names that cannot be safely quoted in either dialect
pub(crate) fn checked_identifier(table: &str) -> Result<&str> {
    let problem = if table.is_empty() {
        Some("table name is empty")
    } else if table.len() > MAX_IDENTIFIER_LEN {
        Some("table name is longer than 63 bytes")
    } else if table.chars().any(|c| matches!(c, '"' | '`' | '\0')) {
        Some("table name contains a quote or NUL character")
    } else {
        None
    };

    match problem {
        Some(message) => Err(IngestError::Schema {
            table: table.to_string(),
            message: message.to_string(),
        }),
        None => Ok(table),
    }
}
