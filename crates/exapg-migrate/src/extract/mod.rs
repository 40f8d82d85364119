//! Exasol source operations: catalog queries and bulk CSV export.
//!
//! All source access goes through the `exaplus` command-line client. Catalog
//! queries are run by writing the statement to a temporary file, invoking
//! exaplus with CSV output, and parsing the result. Bulk exports write a
//! delimited, header-less staging artifact that the loader streams into
//! PostgreSQL via COPY.

mod types;

pub use types::*;

use crate::config::SourceConfig;
use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::Command;
use tracing::debug;

/// Schemas that are never migrated.
const SYSTEM_SCHEMAS: &[&str] = &["SYS", "EXA_STATISTICS", "EXA_LOGS"];

/// Trait for source database operations.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// List tables matching the filter, in stable (schema, name) order.
    async fn list_tables(&self, filter: &TableFilter) -> Result<Vec<TableInfo>>;

    /// Ordered column metadata for a table.
    async fn column_list(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Authoritative row count for a table.
    async fn row_count(&self, schema: &str, table: &str) -> Result<i64>;

    /// Export a row range to a header-less CSV staging artifact.
    /// Returns the number of data rows written.
    async fn export_range(
        &self,
        schema: &str,
        table: &str,
        offset: i64,
        limit: Option<i64>,
        staging: &Path,
    ) -> Result<u64>;

    /// Cheap connectivity check.
    async fn probe(&self) -> Result<()>;
}

/// Exasol extractor backed by the exaplus client.
#[derive(Debug, Clone)]
pub struct ExaplusExtractor {
    config: SourceConfig,
}

impl ExaplusExtractor {
    /// Create a new extractor for the given source.
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    /// Run a catalog query through exaplus and return the data rows
    /// (header stripped, empty string = NULL).
    async fn run_query(&self, sql: &str) -> Result<Vec<Vec<String>>> {
        let mut query_file = tempfile::Builder::new().suffix(".sql").tempfile()?;
        query_file.write_all(sql.as_bytes())?;
        query_file.flush()?;

        let result_file = tempfile::Builder::new().suffix(".csv").tempfile()?;

        let output = Command::new(&self.config.exaplus_bin)
            .arg("-c")
            .arg(&self.config.dsn)
            .arg("-q")
            .arg(query_file.path())
            .arg("-o")
            .arg(result_file.path())
            .args(["-L", "-x", "-s", ","])
            .output()
            .await?;

        if !output.status.success() {
            return Err(MigrateError::connect(
                "exasol",
                format!(
                    "exaplus exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let output = tokio::fs::read_to_string(result_file.path()).await?;
        Ok(parse_csv_output(&output))
    }
}

#[async_trait]
impl Extractor for ExaplusExtractor {
    async fn list_tables(&self, filter: &TableFilter) -> Result<Vec<TableInfo>> {
        let sql = build_table_list_sql(filter);
        let rows = self.run_query(&sql).await?;

        let tables = rows
            .into_iter()
            .filter(|r| r.len() >= 2)
            .map(|r| TableInfo {
                schema: r[0].clone(),
                name: r[1].clone(),
                columns: Vec::new(),
                row_count: 0,
            })
            .collect::<Vec<_>>();

        debug!("Source catalog returned {} tables", tables.len());
        Ok(tables)
    }

    async fn column_list(&self, schema: &str, table: &str) -> Result<Vec<ColumnInfo>> {
        let sql = format!(
            r#"
            SELECT
                column_name,
                data_type ||
                    CASE
                        WHEN data_type IN ('DECIMAL') THEN '(' || numeric_precision || ',' || numeric_scale || ')'
                        WHEN data_type IN ('VARCHAR', 'CHAR') THEN '(' || character_maximum_length || ')'
                        ELSE ''
                    END AS column_type
            FROM EXA_ALL_COLUMNS
            WHERE table_schema = '{}' AND table_name = '{}'
            ORDER BY ordinal_position
            "#,
            escape_literal(schema),
            escape_literal(table)
        );

        let rows = self.run_query(&sql).await?;
        let columns = rows
            .into_iter()
            .filter(|r| !r.is_empty())
            .map(|r| ColumnInfo {
                name: r[0].clone(),
                data_type: r.get(1).cloned().unwrap_or_default(),
            })
            .collect();
        Ok(columns)
    }

    async fn row_count(&self, schema: &str, table: &str) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) AS row_count FROM {}",
            qualify_table(schema, table)
        );
        let rows = self.run_query(&sql).await?;

        rows.first()
            .and_then(|r| r.first())
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or_else(|| {
                MigrateError::extract(
                    format!("{}.{}", schema, table),
                    "row count query returned no result",
                )
            })
    }

    async fn export_range(
        &self,
        schema: &str,
        table: &str,
        offset: i64,
        limit: Option<i64>,
        staging: &Path,
    ) -> Result<u64> {
        // The projection is rebuilt from the catalog so the export always
        // matches the source column order.
        let columns = self
            .column_list(schema, table)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect::<Vec<_>>();
        let sql = build_export_sql(schema, table, &columns, offset, limit);

        let mut query_file = tempfile::Builder::new().suffix(".sql").tempfile()?;
        query_file.write_all(sql.as_bytes())?;
        query_file.flush()?;

        let output = Command::new(&self.config.exaplus_bin)
            .arg("-c")
            .arg(&self.config.dsn)
            .arg("-q")
            .arg(query_file.path())
            .arg("-o")
            .arg(staging)
            .args(["-L", "-x", "-s", ",", "--null", ""])
            .output()
            .await?;

        if !output.status.success() {
            return Err(MigrateError::extract(
                format!("{}.{}", schema, table),
                format!(
                    "exaplus exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        // exaplus writes a header line; COPY expects raw data rows.
        strip_header(staging).await
    }

    async fn probe(&self) -> Result<()> {
        self.run_query("SELECT 1").await?;
        Ok(())
    }
}

/// Build the catalog query for the filtered table list.
fn build_table_list_sql(filter: &TableFilter) -> String {
    let mut clauses = vec![format!(
        "table_schema NOT IN ({})",
        SYSTEM_SCHEMAS
            .iter()
            .map(|s| format!("'{}'", s))
            .collect::<Vec<_>>()
            .join(", ")
    )];

    if let Some(ref schema) = filter.schema {
        clauses.push(format!("table_schema = '{}'", escape_literal(schema)));
    }
    if !filter.include.is_empty() {
        clauses.push(format!("table_name IN ({})", quote_list(&filter.include)));
    }
    if !filter.exclude.is_empty() {
        clauses.push(format!(
            "table_name NOT IN ({})",
            quote_list(&filter.exclude)
        ));
    }

    format!(
        "SELECT table_schema, table_name FROM EXA_ALL_TABLES WHERE {} \
         ORDER BY table_schema, table_name",
        clauses.join(" AND ")
    )
}

/// Build the export projection query for a row range.
fn build_export_sql(
    schema: &str,
    table: &str,
    columns: &[String],
    offset: i64,
    limit: Option<i64>,
) -> String {
    let col_list = if columns.is_empty() {
        "*".to_string()
    } else {
        columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut sql = format!("SELECT {} FROM {}", col_list, qualify_table(schema, table));
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if offset > 0 {
        sql.push_str(&format!(" OFFSET {}", offset));
    }
    sql
}

/// Parse exaplus CSV output into data rows, stripping the header line.
/// Empty result sets (header only or nothing) yield an empty vec.
fn parse_csv_output(output: &str) -> Vec<Vec<String>> {
    output
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split(',').map(|v| v.trim().to_string()).collect())
        .collect()
}

/// Rewrite the staging artifact without its header line, returning the
/// number of data rows that remain.
async fn strip_header(path: &Path) -> Result<u64> {
    let tmp = path.with_extension("tmp");

    let input = File::open(path).await?;
    let mut lines = BufReader::new(input).lines();
    let mut writer = BufWriter::new(File::create(&tmp).await?);

    let mut rows = 0u64;
    let mut first = true;
    while let Some(line) = lines.next_line().await? {
        if first {
            first = false;
            continue;
        }
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        rows += 1;
    }
    writer.flush().await?;

    tokio::fs::rename(&tmp, path).await?;
    Ok(rows)
}

/// Quote an Exasol identifier, escaping embedded double quotes.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a table name with its schema.
fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Escape a string literal for embedding in a catalog query.
fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Quote a list of names for an IN (...) clause.
fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", escape_literal(n)))
        .collect::<Vec<_>>()
        .join(", ")
}
