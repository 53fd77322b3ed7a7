//! Ad-hoc SQL over loaded resources and catalogue listings.
//!
//! A [`SqlSession`] is an in-memory DataFusion context. Tables are registered
//! from frames or raw resource bytes and queried with plain SQL.

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use datafusion::prelude::SessionContext;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::AppError;
use crate::formats::{LoadOptions, read_arrow};
use crate::frame::{Frame, FrameKind, arrow_to_polars, values_to_arrow};
use crate::models::PackageExtra;

/// Table name used by the catalogue freshness report.
pub const FRESHNESS_TABLE: &str = "freshness";

/// Catalogue freshness report over a table of flattened package rows.
pub const FRESHNESS_QUERY: &str = r#"
WITH package_stats AS (
    SELECT
        name,
        COUNT(*) AS resource_count,
        MAX(TRY_CAST(metadata_modified AS TIMESTAMP)) AS last_update
    FROM freshness
    GROUP BY name
)
SELECT
    COUNT(DISTINCT name) AS total_packages,
    SUM(resource_count) AS total_resources,
    COUNT(DISTINCT CASE
        WHEN last_update >= CAST(now() AS TIMESTAMP) - INTERVAL '6 months' THEN name
    END) AS updated_packages_last_6_months,
    COUNT(DISTINCT CASE
        WHEN last_update >= CAST(now() AS TIMESTAMP) - INTERVAL '6 months' THEN name
    END) * 100.0 / NULLIF(COUNT(DISTINCT name), 0) AS percentage_updated_packages_last_6_months
FROM package_stats
"#;

/// In-memory SQL engine holding registered tables.
pub struct SqlSession {
    ctx: SessionContext,
}

impl Default for SqlSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlSession {
    pub fn new() -> Self {
        Self {
            ctx: SessionContext::new(),
        }
    }

    /// Registers an Arrow batch under `table`, replacing any previous table.
    pub fn register_batch(&self, table: &str, batch: RecordBatch) -> Result<(), AppError> {
        validate_table_name(table)?;
        self.ctx.deregister_table(table)?;
        self.ctx.register_batch(table, batch)?;
        debug!("Registered table '{}'", table);
        Ok(())
    }

    /// Registers a frame of either flavour under `table`.
    pub fn register_frame(&self, table: &str, frame: Frame) -> Result<(), AppError> {
        self.register_batch(table, frame.into_arrow()?)
    }

    /// Parses resource bytes and registers the result under `table`.
    pub fn register_bytes(
        &self,
        table: &str,
        bytes: &Bytes,
        format: &str,
        opts: &LoadOptions,
    ) -> Result<(), AppError> {
        let batch = read_arrow(bytes, format, opts)?;
        self.register_batch(table, batch)
    }

    /// Registers JSON records under `table`.
    pub fn register_values(&self, table: &str, values: &[Value]) -> Result<(), AppError> {
        self.register_batch(table, values_to_arrow(values)?)
    }

    /// Runs a query and concatenates the result into one batch.
    pub async fn execute_query(&self, sql: &str) -> Result<RecordBatch, AppError> {
        let df = self.ctx.sql(sql).await?;
        let schema = df.schema().inner().clone();
        let batches = df.collect().await?;
        Ok(concat_batches(&schema, &batches)?)
    }

    /// Runs a query and returns the result as the requested frame flavour.
    pub async fn query_to_frame(&self, sql: &str, kind: FrameKind) -> Result<Frame, AppError> {
        let batch = self.execute_query(sql).await?;
        match kind {
            FrameKind::Arrow => Ok(Frame::Arrow(batch)),
            FrameKind::Polars => Ok(Frame::Polars(arrow_to_polars(&batch)?)),
        }
    }
}

fn validate_table_name(table: &str) -> Result<(), AppError> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Invalid table name '{}'. Use letters, digits and underscores",
            table
        )))
    }
}

fn stringify_nested(value: Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        other => other,
    }
}

/// Flattens catalogue packages into one row per resource.
///
/// Package fields are repeated on every row, resource fields get a
/// `resource_` prefix, `groups` becomes the list of group names, and any
/// other nested value is kept as JSON text. Packages without resources give
/// a single row.
pub fn flatten_packages(packages: &[PackageExtra]) -> Result<Vec<Value>, AppError> {
    let mut rows = Vec::new();

    for package in packages {
        let mut base = match serde_json::to_value(package)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        base.remove("resources");
        base.remove("groups");

        let group_names: Vec<Value> = package
            .groups
            .iter()
            .filter_map(|g| g.get("name").and_then(Value::as_str))
            .map(|n| Value::String(n.to_string()))
            .collect();
        base.insert("groups".to_string(), Value::Array(group_names));

        if package.resources.is_empty() {
            rows.push(Value::Object(base));
            continue;
        }

        for resource in &package.resources {
            let mut row = base.clone();
            if let Value::Object(fields) = resource {
                for (key, value) in fields {
                    row.insert(format!("resource_{}", key), stringify_nested(value.clone()));
                }
            }
            rows.push(Value::Object(row));
        }
    }

    Ok(rows)
}

/// Registers flattened packages as `table` and runs `query` over them.
pub async fn explore_packages(
    packages: &[PackageExtra],
    table: &str,
    query: &str,
) -> Result<RecordBatch, AppError> {
    let rows = flatten_packages(packages)?;
    let session = SqlSession::new();
    session.register_values(table, &rows)?;
    session.execute_query(query).await
}
