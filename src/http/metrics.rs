//! GET /api/metrics/* - fixed analytics reports.
//!
//! Each handler resolves the date window, consults the response cache, runs
//! the report template and caches the shaped payload.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::cache::cache_key;
use crate::compiler::CompiledQuery;
use crate::reports::{self, DateWindow, TopProductsOrder};

/// Default reporting window when the caller gives no dates; matches the
/// month the demo dataset covers.
const DEFAULT_START: (i32, u32, u32) = (2025, 5, 1);
const DEFAULT_END: (i32, u32, u32) = (2025, 5, 31);

fn window(
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<DateWindow, ApiError> {
    let (y, m, d) = DEFAULT_START;
    let start = start_date
        .or_else(|| NaiveDate::from_ymd_opt(y, m, d))
        .unwrap_or_default();
    let (y, m, d) = DEFAULT_END;
    let end = end_date
        .or_else(|| NaiveDate::from_ymd_opt(y, m, d))
        .unwrap_or_default();
    // An end_date at the calendar maximum has no next day to bound against.
    DateWindow::new(start, end)
        .ok_or_else(|| ApiError::bad_request("end_date is outside the supported range"))
}

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
}

impl WindowParams {
    fn window(&self) -> Result<DateWindow, ApiError> {
        window(self.start_date, self.end_date)
    }
}

#[derive(Debug, Deserialize)]
pub struct RevenueParams {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    store_id: Option<i64>,
    channel_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TopProductsParams {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    limit: Option<u32>,
    order_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CustomersParams {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    /// Comma-separated channel ids, e.g. `1,3`.
    channel_ids: Option<String>,
}

/// Run a report through the cache: serve a fresh entry if present, otherwise
/// execute and store the shaped payload.
async fn cached_report(
    state: &AppState,
    key: String,
    query: CompiledQuery,
) -> Result<Value, ApiError> {
    if let Some(hit) = state.cache.get(&key) {
        return Ok(hit);
    }
    let rows = state.executor.fetch(&query).await?;
    let count = rows.len();
    let payload = json!({"data": rows, "count": count});
    state.cache.insert(key, payload.clone());
    Ok(payload)
}

/// GET /api/metrics/revenue - order count, total revenue and average ticket.
pub async fn revenue(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RevenueParams>,
) -> Result<Json<Value>, ApiError> {
    let window = window(params.start_date, params.end_date)?;
    let key = cache_key(
        "revenue",
        &[
            &window.start.to_string(),
            &window.end_exclusive.to_string(),
            &format!("{:?}", params.store_id),
            &format!("{:?}", params.channel_id),
        ],
    );
    if let Some(hit) = state.cache.get(&key) {
        return Ok(Json(hit));
    }

    let query = reports::revenue(window, params.store_id, params.channel_id);
    let rows = state.executor.fetch(&query).await?;
    // Aggregate-only query: one row, or zeros when the table is empty.
    let payload = rows.into_iter().next().map(Value::Object).unwrap_or(json!({
        "total_orders": 0,
        "total_revenue": 0.0,
        "avg_ticket": 0.0,
    }));
    state.cache.insert(key, payload.clone());
    Ok(Json(payload))
}

/// GET /api/metrics/top-products - best sellers by quantity or revenue.
pub async fn top_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TopProductsParams>,
) -> Result<Json<Value>, ApiError> {
    let window = window(params.start_date, params.end_date)?;
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let order = TopProductsOrder::parse(params.order_by.as_deref().unwrap_or("quantity"));

    let key = cache_key(
        "top_products",
        &[
            &window.start.to_string(),
            &window.end_exclusive.to_string(),
            &limit.to_string(),
            &format!("{:?}", order),
        ],
    );
    let payload = cached_report(&state, key, reports::top_products(window, limit, order)).await?;
    Ok(Json(payload))
}

/// GET /api/metrics/peak-hours - orders and revenue per hour of day.
pub async fn peak_hours(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Value>, ApiError> {
    let window = params.window()?;
    let key = window_key("peak_hours", window);
    let payload = cached_report(&state, key, reports::peak_hours(window)).await?;
    Ok(Json(payload))
}

/// GET /api/metrics/store-performance - per-store totals, best first.
pub async fn store_performance(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Value>, ApiError> {
    let window = params.window()?;
    let key = window_key("store_performance", window);
    let payload = cached_report(&state, key, reports::store_performance(window)).await?;
    Ok(Json(payload))
}

/// GET /api/metrics/channel-comparison - per-channel totals.
pub async fn channel_comparison(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Value>, ApiError> {
    let window = params.window()?;
    let key = window_key("channel_comparison", window);
    let payload = cached_report(&state, key, reports::channel_comparison(window)).await?;
    Ok(Json(payload))
}

/// GET /api/metrics/daily-trends - orders and revenue per day.
pub async fn daily_trends(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WindowParams>,
) -> Result<Json<Value>, ApiError> {
    let window = params.window()?;
    let key = window_key("daily_trends", window);
    let payload = cached_report(&state, key, reports::daily_trends(window)).await?;
    Ok(Json(payload))
}

/// GET /api/metrics/customers - per-customer totals and churn risk for
/// customers active in the window, optionally narrowed to channels.
pub async fn customers(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CustomersParams>,
) -> Result<Json<Value>, ApiError> {
    let window = window(params.start_date, params.end_date)?;
    let channel_ids = parse_channel_ids(params.channel_ids.as_deref())?;

    let key = cache_key(
        "customers",
        &[
            &window.start.to_string(),
            &window.end_exclusive.to_string(),
            &format!("{:?}", channel_ids),
        ],
    );
    if let Some(hit) = state.cache.get(&key) {
        return Ok(Json(hit));
    }

    let rows = state
        .executor
        .fetch(&reports::customers(window, &channel_ids))
        .await?;
    let payload = json!({"customers": rows});
    state.cache.insert(key, payload.clone());
    Ok(Json(payload))
}

fn parse_channel_ids(raw: Option<&str>) -> Result<Vec<i64>, ApiError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|_| {
                ApiError::bad_request(format!("channel_ids entry '{}' is not an integer", part))
            })
        })
        .collect()
}

fn window_key(prefix: &str, window: DateWindow) -> String {
    cache_key(
        prefix,
        &[&window.start.to_string(), &window.end_exclusive.to_string()],
    )
}
