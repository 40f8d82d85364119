//! PostgreSQL target operations: schema preparation and bulk COPY loads.
//!
//! Each [`PgLoader`] owns exactly one persistent connection, created once
//! per worker and reused across all of that worker's tasks. There is no
//! automatic reconnect; a broken connection fails the current task.

use crate::config::TargetConfig;
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::SinkExt;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

const COPY_BUFFER_BYTES: usize = 64 * 1024;

/// Trait for target database operations.
#[async_trait]
pub trait Loader: Send {
    /// Create the schema if it doesn't exist (idempotent, race-tolerant).
    async fn ensure_schema(&mut self, schema: &str) -> Result<()>;

    /// Check if a table exists.
    async fn table_exists(&mut self, schema: &str, table: &str) -> Result<bool>;

    /// Empty a target table. Only invoked for truncate-flagged tasks.
    async fn truncate_table(&mut self, schema: &str, table: &str) -> Result<()>;

    /// Stream a staging artifact into the table via COPY, inside a single
    /// transaction. Returns the protocol-reported row count.
    async fn load_file(&mut self, schema: &str, table: &str, staging: &Path) -> Result<u64>;

    /// Cheap connectivity check.
    async fn probe(&mut self) -> Result<()>;
}

/// PostgreSQL loader over a single persistent connection.
pub struct PgLoader {
    client: Client,
}

impl PgLoader {
    /// Connect to the target database.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(&config.connection_string(), NoTls)
            .await
            .map_err(|e| MigrateError::connect("postgres", e.to_string()))?;

        // Drive the connection until the client drops.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        debug!(
            "Connected to PostgreSQL: {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(Self { client })
    }
}

#[async_trait]
impl Loader for PgLoader {
    async fn ensure_schema(&mut self, schema: &str) -> Result<()> {
        let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema));
        self.client.execute(&sql, &[]).await?;
        Ok(())
    }

    async fn table_exists(&mut self, schema: &str, table: &str) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_name = $2)",
                &[&schema, &table],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn truncate_table(&mut self, schema: &str, table: &str) -> Result<()> {
        let sql = format!("TRUNCATE TABLE {}", qualify_table(schema, table));
        self.client.execute(&sql, &[]).await?;
        debug!("Truncated {}.{}", schema, table);
        Ok(())
    }

    async fn load_file(&mut self, schema: &str, table: &str, staging: &Path) -> Result<u64> {
        let tx = self.client.transaction().await?;

        let copy_sql = format!(
            "COPY {} FROM STDIN WITH (FORMAT csv, DELIMITER ',', NULL '')",
            qualify_table(schema, table)
        );
        let sink = tx.copy_in(&copy_sql).await?;
        futures::pin_mut!(sink);

        let file = File::open(staging).await?;
        let mut reader = BufReader::with_capacity(COPY_BUFFER_BYTES, file);
        let mut buf = vec![0u8; COPY_BUFFER_BYTES];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            sink.send(Bytes::copy_from_slice(&buf[..n])).await?;
        }

        // Rolls back implicitly if finish or commit fails.
        let rows = sink.finish().await?;
        tx.commit().await?;

        Ok(rows)
    }

    async fn probe(&mut self) -> Result<()> {
        self.client.query_one("SELECT 1", &[]).await?;
        Ok(())
    }
}

/// Quote a PostgreSQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a PostgreSQL table name with schema and proper quoting.
fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("plain"), "\"plain\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_qualify_table() {
        assert_eq!(qualify_table("retail", "orders"), "\"retail\".\"orders\"");
    }
}
