//! Axum HTTP server: routing, shared state and the API error shape.
//!
//! Handlers stay thin: deserialize, call into the compiler or report
//! builders, run the result through the injected executor, shape JSON.
//! Everything stateful (pool, cache, sessions, rate limiter) hangs off
//! [`AppState`] so tests can assemble a router around a stub executor.

mod auth_routes;
mod explore;
mod meta;
mod metrics;
mod query;
mod rate_limit;

pub use rate_limit::RateLimiter;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::SessionStore;
use crate::cache::ResponseCache;
use crate::config::Settings;
use crate::db::{DbError, QueryExecutor};
use crate::error::QueryError;
use crate::registry::FieldRegistry;

/// Application state shared across handlers.
pub struct AppState {
    pub settings: Settings,
    pub registry: &'static FieldRegistry,
    pub executor: Arc<dyn QueryExecutor>,
    pub cache: ResponseCache,
    pub sessions: SessionStore,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(settings: Settings, executor: Arc<dyn QueryExecutor>) -> Self {
        let cache = ResponseCache::new(
            Duration::from_secs(settings.cache.ttl_secs),
            settings.cache.enabled,
        );
        let rate_limiter = RateLimiter::new(
            settings.rate_limit.requests_per_minute,
            settings.rate_limit.enabled,
        );
        Self {
            settings,
            registry: FieldRegistry::shared(),
            executor,
            cache,
            sessions: SessionStore::new(),
            rate_limiter,
        }
    }
}

/// Build the axum router with all routes.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = if state.settings.server.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .settings
            .server
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/api/query", post(query::execute_query))
        .route("/api/metrics/revenue", get(metrics::revenue))
        .route("/api/metrics/top-products", get(metrics::top_products))
        .route("/api/metrics/peak-hours", get(metrics::peak_hours))
        .route(
            "/api/metrics/store-performance",
            get(metrics::store_performance),
        )
        .route(
            "/api/metrics/channel-comparison",
            get(metrics::channel_comparison),
        )
        .route("/api/metrics/daily-trends", get(metrics::daily_trends))
        .route("/api/metrics/customers", get(metrics::customers))
        .route(
            "/api/explore/cohort-retention",
            get(explore::cohort_retention),
        )
        .route(
            "/api/explore/product-affinity",
            get(explore::product_affinity),
        )
        .route("/api/meta/fields", get(meta::list_fields))
        .route("/api/meta/tables", get(meta::list_tables))
        .route("/api/meta/channels", get(meta::list_channels))
        .route("/api/meta/stores", get(meta::list_stores))
        .route("/api/meta/products", get(meta::list_products))
        .route("/api/meta/columns/{table}", get(meta::table_columns))
        .route("/api/health", get(meta::health))
        .route("/api/auth/login", post(auth_routes::login))
        .route("/api/auth/logout", post(auth_routes::logout))
        .route("/api/auth/me", get(auth_routes::me))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::enforce,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server and block until shutdown.
pub async fn serve(state: Arc<AppState>) -> Result<(), Box<dyn std::error::Error>> {
    let addr = state.settings.server.bind.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to install ctrl-c handler");
    }
}

// ============================================================================
// API error shape
// ============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

/// Error response: a status code plus `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            detail: detail.into(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                detail: self.detail,
            }),
        )
            .into_response()
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        tracing::error!(error = %err, "query execution failed");
        ApiError::internal()
    }
}
