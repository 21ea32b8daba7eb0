//! MySQL / MariaDB adapter
//!
//! Tables use the InnoDB layout the n-gram exports have always been loaded
//! into: an unsigned auto-increment key and `varchar(255)` text columns.

use super::{SinkAdapter, Statement, DATA_COLUMNS};
use crate::config::ConnectionParams;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{MySql, QueryBuilder};
use tracing::debug;

pub struct MysqlAdapter {
    pool: Option<MySqlPool>,
    max_connections: u32,
}

impl MysqlAdapter {
    pub fn new(max_connections: u32) -> Self {
        Self {
            pool: None,
            max_connections: max_connections.max(1),
        }
    }

    fn pool(&self) -> Result<&MySqlPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| IngestError::Connection("Database not connected".to_string()))
    }
}

fn quote(table: &str) -> String {
    format!("`{}`", table.replace('`', "``"))
}

fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
         `id` int(11) unsigned NOT NULL AUTO_INCREMENT, \
         `ngram` varchar(255) NOT NULL, \
         `year` varchar(255) NOT NULL, \
         `match_count` varchar(255) NOT NULL, \
         `volume_count` varchar(255) NOT NULL, \
         PRIMARY KEY (`id`)) \
         ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
        quote(table)
    )
}

#[async_trait]
impl SinkAdapter for MysqlAdapter {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn is_connected(&self) -> bool {
        self.pool.is_some()
    }

    async fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        let mut options = MySqlConnectOptions::new()
            .host(&params.host)
            .username(&params.user)
            .password(&params.password)
            .database(&params.schema)
            .charset("utf8mb4");
        if let Some(port) = params.port {
            options = options.port(port);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                IngestError::Connection(format!(
                    "Failed to connect to mysql at {}: {}",
                    params.host, e
                ))
            })?;

        debug!(max_connections = self.max_connections, "MySQL pool created");
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
                let columns: Vec<String> = DATA_COLUMNS.iter().map(|c| quote(c)).collect();
                let mut builder: QueryBuilder<MySql> = QueryBuilder::new("INSERT INTO ");
                builder.push(quote(table));
                builder.push(format!(" ({}) ", columns.join(", ")));
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
