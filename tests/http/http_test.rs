//! Router-level tests against a stub executor; no database required.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use tavola::compiler::CompiledQuery;
use tavola::config::Settings;
use tavola::db::{DbError, QueryExecutor};
use tavola::http::{router, AppState};

/// Stub executor returning canned rows and counting fetches.
struct StubExecutor {
    rows: Vec<Map<String, Value>>,
    fetches: AtomicUsize,
    healthy: bool,
}

impl StubExecutor {
    fn with_rows(rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => map,
                other => panic!("stub rows must be objects, got {:?}", other),
            })
            .collect();
        Self {
            rows,
            fetches: AtomicUsize::new(0),
            healthy: true,
        }
    }

    fn empty() -> Self {
        Self::with_rows(Vec::new())
    }

    fn unhealthy() -> Self {
        Self {
            rows: Vec::new(),
            fetches: AtomicUsize::new(0),
            healthy: false,
        }
    }
}

#[async_trait]
impl QueryExecutor for StubExecutor {
    async fn fetch(&self, _query: &CompiledQuery) -> Result<Vec<Map<String, Value>>, DbError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }

    async fn ping(&self) -> Result<(), DbError> {
        if self.healthy {
            Ok(())
        } else {
            Err(DbError::Sqlx(sqlx::Error::PoolClosed))
        }
    }
}

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.rate_limit.enabled = false;
    settings
}

fn app(executor: Arc<StubExecutor>) -> axum::Router {
    router(Arc::new(AppState::new(test_settings(), executor)))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn query_endpoint_returns_rows_and_generated_sql() {
    let executor = Arc::new(StubExecutor::with_rows(vec![
        json!({"city": "Recife", "total_revenue": 1250.5}),
    ]));
    let response = app(executor)
        .oneshot(post_json(
            "/api/query",
            json!({
                "dimensions": [{"field": "st.city", "alias": "city"}],
                "metrics": [{"field": "total_amount", "aggregation": "sum", "alias": "total_revenue"}]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["data"][0]["city"], json!("Recife"));
    let sql = body["query"].as_str().unwrap();
    assert!(sql.contains("s.sale_status_desc = 'COMPLETED'"));
    assert!(sql.contains("LEFT JOIN stores st"));
}

#[tokio::test]
async fn query_endpoint_rejects_unknown_fields_with_detail() {
    let executor = Arc::new(StubExecutor::empty());
    let response = app(executor.clone())
        .oneshot(post_json(
            "/api/query",
            json!({"dimensions": [{"field": "zz.created_at"}]}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("zz.created_at"));
    // Compilation failed before any execution.
    assert_eq!(executor.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn query_endpoint_rejects_unsafe_values() {
    let response = app(Arc::new(StubExecutor::empty()))
        .oneshot(post_json(
            "/api/query",
            json!({"filters": [{"field": "customer_name", "operator": "eq",
                    "value": "x'; DROP TABLE sales;--"}]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reflects_executor_state() {
    let response = app(Arc::new(StubExecutor::empty()))
        .oneshot(get("/api/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["status"], json!("healthy"));

    let response = app(Arc::new(StubExecutor::unhealthy()))
        .oneshot(get("/api/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn meta_fields_lists_whitelisted_tables() {
    let response = app(Arc::new(StubExecutor::empty()))
        .oneshot(get("/api/meta/fields"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let tables = body["tables"].as_array().unwrap();
    assert_eq!(tables.len(), 9);
    let sales = tables.iter().find(|t| t["table"] == json!("sales")).unwrap();
    assert_eq!(sales["alias"], json!("s"));
    assert!(sales["fields"]
        .as_array()
        .unwrap()
        .contains(&json!("total_amount")));
}

#[tokio::test]
async fn report_end_date_at_calendar_max_is_a_client_error() {
    // Year 262142 is the last one chrono can represent; the day after its
    // December 31 does not exist, so the window must be refused up front.
    let executor = Arc::new(StubExecutor::empty());
    let response = app(executor.clone())
        .oneshot(get("/api/metrics/revenue?end_date=%2B262142-12-31"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(executor.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn metrics_customers_returns_listing_and_validates_channels() {
    let executor = Arc::new(StubExecutor::with_rows(vec![json!({
        "customer_id": 7, "customer_name": "Maria", "total_orders": 4,
        "is_churn_risk": false,
    })]));
    let app = app(executor);

    let response = app
        .clone()
        .oneshot(get("/api/metrics/customers?channel_ids=1,3"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["customers"][0]["customer_name"], json!("Maria"));

    let response = app
        .oneshot(get("/api/metrics/customers?channel_ids=1,abc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn meta_columns_only_serves_whitelisted_tables() {
    let executor = Arc::new(StubExecutor::with_rows(vec![json!({
        "name": "id", "type": "bigint", "nullable": false,
    })]));
    let app = app(executor.clone());

    let response = app
        .clone()
        .oneshot(get("/api/meta/columns/sales"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["table"], json!("sales"));
    assert_eq!(body["columns"][0]["name"], json!("id"));

    let response = app
        .oneshot(get("/api/meta/columns/pg_shadow"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    // The unknown table never reached the executor.
    assert_eq!(executor.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn meta_products_screens_the_search_term() {
    let executor = Arc::new(StubExecutor::empty());
    let app = app(executor.clone());

    let response = app
        .clone()
        .oneshot(get("/api/meta/products?search=pizza"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/api/meta/products?search=x%27%3B%20DROP%20TABLE%20products"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(executor.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn meta_listing_endpoints_wrap_rows() {
    let executor = Arc::new(StubExecutor::with_rows(vec![json!({
        "id": 1, "name": "Delivery",
    })]));
    let app = app(executor);

    let response = app.clone().oneshot(get("/api/meta/channels")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["channels"][0]["name"], json!("Delivery"));

    let response = app.oneshot(get("/api/meta/stores")).await.unwrap();
    let body = read_json(response).await;
    assert!(body["stores"].is_array());
}

#[tokio::test]
async fn metrics_revenue_defaults_to_zeros_on_empty_data() {
    let response = app(Arc::new(StubExecutor::empty()))
        .oneshot(get("/api/metrics/revenue"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["total_orders"], json!(0));
}

#[tokio::test]
async fn repeated_report_requests_are_served_from_cache() {
    let executor = Arc::new(StubExecutor::with_rows(vec![
        json!({"hour": 12, "order_count": 40, "revenue": 900.0}),
    ]));
    let app = app(executor.clone());

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(get("/api/metrics/peak-hours?start_date=2025-05-01&end_date=2025-05-31"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(executor.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn auth_flow_login_me_logout() {
    let app = app(Arc::new(StubExecutor::empty()));

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            json!({"email": "admin@restaurante.com", "password": "demo"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(body["user"]["role"], json!("admin"));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_credentials_are_unauthorized() {
    let response = app(Arc::new(StubExecutor::empty()))
        .oneshot(post_json(
            "/api/auth/login",
            json!({"email": "admin@restaurante.com", "password": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rate_limit_returns_429_with_headers() {
    let mut settings = Settings::default();
    settings.rate_limit.enabled = true;
    settings.rate_limit.requests_per_minute = 2;
    let state = Arc::new(AppState::new(settings, Arc::new(StubExecutor::empty())));
    let app = router(state);

    for _ in 0..2 {
        let response = app.clone().oneshot(get("/api/meta/tables")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-ratelimit-remaining"));
    }

    let response = app.clone().oneshot(get("/api/meta/tables")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        response.headers().get("x-ratelimit-remaining").unwrap(),
        "0"
    );

    // Health stays reachable even when the client is throttled.
    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
