//! Database access behind the [`QueryExecutor`] trait.
//!
//! The compiler produces `(sql, params)`; this module is the only place that
//! touches a live connection. Handlers depend on the trait, so tests swap in
//! a stub executor and never need Postgres.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Decimal;
use sqlx::{Column, Row, TypeInfo};

use crate::compiler::{CompiledQuery, SqlValue};

/// Error type for query execution.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Executes compiled queries and reports connection health.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a compiled query and return its rows as JSON objects.
    async fn fetch(&self, query: &CompiledQuery) -> Result<Vec<Map<String, Value>>, DbError>;

    /// Cheap connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<(), DbError>;
}

/// Postgres-backed executor over a shared connection pool.
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn fetch(&self, query: &CompiledQuery) -> Result<Vec<Map<String, Value>>, DbError> {
        let mut prepared = sqlx::query(&query.sql);
        for param in &query.params {
            prepared = match param {
                SqlValue::Text(s) => prepared.bind(s.as_str()),
                SqlValue::Int(i) => prepared.bind(*i),
                SqlValue::Float(f) => prepared.bind(*f),
                SqlValue::Bool(b) => prepared.bind(*b),
                SqlValue::Date(d) => prepared.bind(*d),
                SqlValue::Null => prepared.bind(Option::<String>::None),
            };
        }

        let rows = prepared.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Convert a Postgres row into a JSON object, column by column.
fn row_to_json(row: &PgRow) -> Map<String, Value> {
    let mut object = Map::with_capacity(row.columns().len());
    for column in row.columns() {
        let name = column.name().to_string();
        object.insert(name, decode_column(row, column.ordinal(), column));
    }
    object
}

fn decode_column(row: &PgRow, ordinal: usize, column: &sqlx::postgres::PgColumn) -> Value {
    match column.type_info().name() {
        "BOOL" => row
            .try_get::<Option<bool>, _>(ordinal)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        "INT2" => number(row.try_get::<Option<i16>, _>(ordinal).ok().flatten().map(i64::from)),
        "INT4" => number(row.try_get::<Option<i32>, _>(ordinal).ok().flatten().map(i64::from)),
        "INT8" => number(row.try_get::<Option<i64>, _>(ordinal).ok().flatten()),
        "FLOAT4" => float(row.try_get::<Option<f32>, _>(ordinal).ok().flatten().map(f64::from)),
        "FLOAT8" => float(row.try_get::<Option<f64>, _>(ordinal).ok().flatten()),
        // NUMERIC goes through Decimal to keep aggregate precision, then
        // renders as a JSON number.
        "NUMERIC" => float(
            row.try_get::<Option<Decimal>, _>(ordinal)
                .ok()
                .flatten()
                .and_then(|d| d.to_string().parse::<f64>().ok()),
        ),
        "DATE" => text(
            row.try_get::<Option<chrono::NaiveDate>, _>(ordinal)
                .ok()
                .flatten()
                .map(|d| d.format("%Y-%m-%d").to_string()),
        ),
        "TIMESTAMP" => text(
            row.try_get::<Option<chrono::NaiveDateTime>, _>(ordinal)
                .ok()
                .flatten()
                .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string()),
        ),
        "TIMESTAMPTZ" => text(
            row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(ordinal)
                .ok()
                .flatten()
                .map(|t| t.to_rfc3339()),
        ),
        // TEXT, VARCHAR, BPCHAR and anything else that decodes as a string.
        _ => text(row.try_get::<Option<String>, _>(ordinal).ok().flatten()),
    }
}

fn number(value: Option<i64>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn float(value: Option<f64>) -> Value {
    value
        .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
        .unwrap_or(Value::Null)
}

fn text(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}
