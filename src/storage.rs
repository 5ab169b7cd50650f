//! Row storage used by bulk translation.
//!
//! Tables are addressed by name and must have an `id` column. Writes are
//! conditional: a target field that already holds text is never replaced.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row as _;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub id: String,
    pub fields: HashMap<String, Option<String>>,
}

impl Row {
    /// Field value, treating NULL and blank text alike
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(|v| v.as_deref())
            .filter(|v| !v.trim().is_empty())
    }
}

#[async_trait]
pub trait RowStore: Send + Sync {
    /// Fetch `id` plus `columns` for up to `limit` rows, ordered by id.
    async fn fetch_rows(&self, table: &str, columns: &[String], limit: Option<usize>)
        -> Result<Vec<Row>>;

    /// Set `field` to `value` if it is still empty. Returns whether a write happened.
    async fn write_field(&self, table: &str, row_id: &str, field: &str, value: &str)
        -> Result<bool>;
}

/// Whether a storage error is worth retrying
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed)
        )
    })
}

static IDENTIFIER: OnceLock<Regex> = OnceLock::new();

/// Table and column names are interpolated into SQL, so only plain
/// identifiers are accepted.
pub fn validate_identifier(name: &str) -> Result<&str> {
    let pattern = IDENTIFIER.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("identifier regex is valid")
    });
    if !pattern.is_match(name) {
        bail!("Invalid identifier: '{}'", name);
    }
    Ok(name)
}

// ==================== PostgreSQL ====================

#[derive(Clone)]
pub struct PgRowStore {
    pool: PgPool,
}

impl PgRowStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        info!("Connected to PostgreSQL row store");
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RowStore for PgRowStore {
    async fn fetch_rows(
        &self,
        table: &str,
        columns: &[String],
        limit: Option<usize>,
    ) -> Result<Vec<Row>> {
        let table = validate_identifier(table)?;
        let projection = columns
            .iter()
            .map(|c| validate_identifier(c).map(|c| format!(r#""{c}"::text AS "{c}""#)))
            .collect::<Result<Vec<_>>>()?;

        let mut sql = String::from(r#"SELECT "id"::text AS "id""#);
        for column in &projection {
            sql.push_str(", ");
            sql.push_str(column);
        }
        sql.push_str(&format!(r#" FROM "{table}" ORDER BY "id""#));
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let records = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read rows from {}", table))?;

        records
            .iter()
            .map(|record| -> Result<Row> {
                let id: String = record.try_get("id")?;
                let fields = columns
                    .iter()
                    .map(|c| -> Result<(String, Option<String>)> {
                        Ok((c.clone(), record.try_get(c.as_str())?))
                    })
                    .collect::<Result<HashMap<_, _>>>()?;
                Ok(Row { id, fields })
            })
            .collect()
    }

    async fn write_field(&self, table: &str, row_id: &str, field: &str, value: &str) -> Result<bool> {
        let table = validate_identifier(table)?;
        let field = validate_identifier(field)?;

        let sql = format!(
            r#"UPDATE "{table}" SET "{field}" = $1
               WHERE "id"::text = $2 AND ("{field}" IS NULL OR "{field}" = '')"#
        );
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(row_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to write {}.{} for row {}", table, field, row_id))?;

        Ok(result.rows_affected() > 0)
    }
}

// ==================== In-memory ====================

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryRowStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    writes: AtomicUsize,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_row(&self, table: &str, id: &str, fields: &[(&str, Option<&str>)]) {
        let row = Row {
            id: id.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect(),
        };
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        rows.retain(|r| r.id != id);
        rows.push(row);
        rows.sort_by(|a, b| a.id.cmp(&b.id));
    }

    pub async fn value(&self, table: &str, id: &str, field: &str) -> Option<String> {
        self.tables
            .read()
            .await
            .get(table)?
            .iter()
            .find(|r| r.id == id)?
            .fields
            .get(field)
            .cloned()
            .flatten()
    }

    /// Number of writes that changed a value
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn fetch_rows(
        &self,
        table: &str,
        columns: &[String],
        limit: Option<usize>,
    ) -> Result<Vec<Row>> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(table) else {
            bail!("Table '{}' does not exist", table);
        };

        Ok(rows
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|row| Row {
                id: row.id.clone(),
                fields: columns
                    .iter()
                    .map(|c| (c.clone(), row.fields.get(c).cloned().flatten()))
                    .collect(),
            })
            .collect())
    }

    async fn write_field(&self, table: &str, row_id: &str, field: &str, value: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == row_id))
            .with_context(|| format!("Row {} not found in {}", row_id, table))?;

        if row.text(field).is_some() {
            debug!("{}.{} already set for row {}", table, field, row_id);
            return Ok(false);
        }

        row.fields.insert(field.to_string(), Some(value.to_string()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }
}
