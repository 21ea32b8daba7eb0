//! PostgreSQL adapter

use super::{SinkAdapter, Statement, DATA_COLUMNS};
use crate::config::ConnectionParams;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

/// Pooled PostgreSQL connection; `schema` names the database
pub struct PostgresAdapter {
    pool: Option<PgPool>,
    max_connections: u32,
}

impl PostgresAdapter {
    pub fn new(max_connections: u32) -> Self {
        Self {
            pool: None,
            max_connections: max_connections.max(1),
        }
    }

    fn pool(&self) -> Result<&PgPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| IngestError::Connection("Database not connected".to_string()))
    }
}

fn quote(table: &str) -> String {
    format!("\"{}\"", table.replace('"', "\"\""))
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         id BIGSERIAL PRIMARY KEY, \
         ngram TEXT NOT NULL, \
         year TEXT NOT NULL, \
         match_count TEXT NOT NULL, \
         volume_count TEXT NOT NULL)",
        quote(table)
    )
}

#[async_trait]
impl SinkAdapter for PostgresAdapter {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn is_connected(&self) -> bool {
        self.pool.is_some()
    }

    async fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        let mut options = PgConnectOptions::new()
            .host(&params.host)
            .username(&params.user)
            .password(&params.password)
            .database(&params.schema);
        if let Some(port) = params.port {
            options = options.port(port);
        }

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                IngestError::Connection(format!(
                    "Failed to connect to postgres at {}: {}",
                    params.host, e
                ))
            })?;

        debug!(max_connections = self.max_connections, "Postgres pool created");
        self.pool = Some(pool);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let pool = self.pool.take().ok_or_else(|| {
            IngestError::Connection("No active connection to disconnect".to_string())
        })?;
        pool.close().await;
        Ok(())
    }

    async fn execute(&self, statement: Statement<'_>) -> Result<u64> {
        let pool = self.pool()?;

        let result = match statement {
            Statement::DropTable { table } => {
                let sql = format!("DROP TABLE IF EXISTS {}", quote(table));
                sqlx::query(&sql).execute(pool).await
            },
            Statement::CreateTable { table } => {
                let sql = create_table_sql(table);
                sqlx::query(&sql).execute(pool).await
            },
            Statement::InsertRows { table, rows } => {
                let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO ");
                builder.push(quote(table));
                builder.push(format!(" ({}) ", DATA_COLUMNS.join(", ")));
                builder.push_values(rows.iter(), |mut b, record| {
                    for field in record.fields() {
                        b.push_bind(field);
                    }
                });
                builder.build().execute(pool).await
            },
        };

        result
            .map(|done| done.rows_affected())
            .map_err(|e| statement.failure(e.to_string()))
    }
}
