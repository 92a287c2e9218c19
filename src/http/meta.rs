//! Metadata and health endpoints.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::reports;
use crate::sanitize;

/// GET /api/health - connectivity probe, exempt from rate limiting.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.executor.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"status": "healthy", "database": "connected"})),
        ),
        Err(err) => {
            tracing::error!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"status": "unhealthy", "database": "unreachable"})),
            )
        }
    }
}

/// GET /api/meta/fields - every queryable field, grouped by table.
pub async fn list_fields(State(state): State<Arc<AppState>>) -> Json<Value> {
    let tables: Vec<Value> = state
        .registry
        .tables()
        .map(|table| {
            json!({
                "table": table.name,
                "alias": table.alias,
                "fields": table.columns,
            })
        })
        .collect();
    Json(json!({"tables": tables}))
}

/// GET /api/meta/tables - whitelisted table names and aliases.
pub async fn list_tables(State(state): State<Arc<AppState>>) -> Json<Value> {
    let tables: Vec<Value> = state
        .registry
        .tables()
        .map(|table| json!({"name": table.name, "alias": table.alias}))
        .collect();
    Json(json!({"tables": tables}))
}

/// GET /api/meta/channels - distinct sales channels.
pub async fn list_channels(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let rows = state.executor.fetch(&reports::meta_channels()).await?;
    Ok(Json(json!({"channels": rows})))
}

/// GET /api/meta/stores - active stores.
pub async fn list_stores(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let rows = state.executor.fetch(&reports::meta_stores()).await?;
    Ok(Json(json!({"stores": rows})))
}

#[derive(Debug, Deserialize)]
pub struct ProductsParams {
    search: Option<String>,
    limit: Option<u32>,
}

/// GET /api/meta/products - product catalog, optionally filtered by name.
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProductsParams>,
) -> Result<Json<Value>, ApiError> {
    if let Some(search) = &params.search {
        sanitize::screen_value(&Value::String(search.clone()))?;
    }
    let limit = i64::from(params.limit.unwrap_or(100).clamp(1, 1000));
    let query = reports::meta_products(params.search.as_deref(), limit);
    let rows = state.executor.fetch(&query).await?;
    Ok(Json(json!({"products": rows})))
}

/// GET /api/meta/columns/{table} - column catalog for one whitelisted table.
pub async fn table_columns(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
) -> Result<Json<Value>, ApiError> {
    // Only registry tables are introspectable; everything else is opaque.
    if state.registry.table(&table).is_none() {
        return Err(ApiError::bad_request(format!("Unknown table '{}'", table)));
    }
    let rows = state.executor.fetch(&reports::table_columns(&table)).await?;
    Ok(Json(json!({"table": table, "columns": rows})))
}
