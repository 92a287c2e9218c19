//! GET /api/explore/* - heavier analytical reports.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::cache::cache_key;
use crate::reports;

#[derive(Debug, Deserialize)]
pub struct CohortParams {
    months: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AffinityParams {
    min_support: Option<f64>,
    limit: Option<i64>,
}

/// GET /api/explore/cohort-retention - monthly cohort retention matrix.
pub async fn cohort_retention(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CohortParams>,
) -> Result<Json<Value>, ApiError> {
    let months = params.months.unwrap_or(6).clamp(1, 12);
    let key = cache_key("cohort_retention", &[&months.to_string()]);
    if let Some(hit) = state.cache.get(&key) {
        return Ok(Json(hit));
    }

    let rows = state.executor.fetch(&reports::cohort_retention(months)).await?;
    let payload = json!({
        "cohorts": rows,
        "months_analyzed": months,
    });
    state.cache.insert(key, payload.clone());
    Ok(Json(payload))
}

/// GET /api/explore/product-affinity - market-basket pairs with support,
/// confidence and lift.
pub async fn product_affinity(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AffinityParams>,
) -> Result<Json<Value>, ApiError> {
    let min_support = params.min_support.unwrap_or(0.01).clamp(0.0, 1.0);
    let limit = params.limit.unwrap_or(20).clamp(1, 100);

    let key = cache_key(
        "product_affinity",
        &[&min_support.to_string(), &limit.to_string()],
    );
    if let Some(hit) = state.cache.get(&key) {
        return Ok(Json(hit));
    }

    let rows = state
        .executor
        .fetch(&reports::product_affinity(min_support, limit))
        .await?;
    let rules_found = rows.len();
    let payload = json!({
        "rules": rows,
        "summary": {
            "rules_found": rules_found,
            "min_support_threshold": min_support,
            "analysis_period": "Last 90 days",
        },
    });
    state.cache.insert(key, payload.clone());
    Ok(Json(payload))
}
