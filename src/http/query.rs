//! POST /api/query - compile and run a dynamic query.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::compiler;
use crate::request::QueryRequest;

/// Compile the structured request, execute it and return rows along with the
/// generated SQL for transparency.
pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<Value>, ApiError> {
    let compiled = compiler::compile(&request, state.registry)?;
    tracing::debug!(sql = %compiled.sql, params = compiled.params.len(), "compiled query");

    let rows = state.executor.fetch(&compiled).await?;
    let count = rows.len();
    Ok(Json(json!({
        "data": rows,
        "count": count,
        "query": compiled.sql,
    })))
}
