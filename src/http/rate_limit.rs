//! Sliding-window rate limiting keyed by client address.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;

use super::{ApiError, AppState};

const WINDOW: Duration = Duration::from_secs(60);

/// Clients tracked before stale entries are pruned.
const PRUNE_THRESHOLD: usize = 1000;

/// Outcome of a rate check, surfaced through response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
}

/// Per-client sliding window over the last 60 seconds.
#[derive(Debug)]
pub struct RateLimiter {
    clients: DashMap<String, Vec<Instant>>,
    limit: u32,
    enabled: bool,
}

impl RateLimiter {
    pub fn new(limit: u32, enabled: bool) -> Self {
        Self {
            clients: DashMap::new(),
            limit,
            enabled,
        }
    }

    /// Record a request for `key` and decide whether it is allowed.
    pub fn check(&self, key: &str) -> RateDecision {
        if !self.enabled {
            return RateDecision {
                allowed: true,
                limit: self.limit,
                remaining: self.limit,
            };
        }

        let now = Instant::now();
        self.prune_stale(now);

        let mut entry = self.clients.entry(key.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < WINDOW);

        if entry.len() >= self.limit as usize {
            return RateDecision {
                allowed: false,
                limit: self.limit,
                remaining: 0,
            };
        }

        entry.push(now);
        let remaining = self.limit - entry.len() as u32;
        RateDecision {
            allowed: true,
            limit: self.limit,
            remaining,
        }
    }

    /// Drop clients whose whole window has expired, once the map grows large.
    fn prune_stale(&self, now: Instant) {
        if self.clients.len() <= PRUNE_THRESHOLD {
            return;
        }
        self.clients
            .retain(|_, timestamps| timestamps.iter().any(|t| now.duration_since(*t) < WINDOW));
    }
}

/// Middleware enforcing the per-client limit on every route except health.
pub async fn enforce(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if request.uri().path() == "/api/health" {
        return next.run(request).await;
    }

    let key = client_key(request.headers());
    let decision = state.rate_limiter.check(&key);

    if !decision.allowed {
        tracing::warn!(client = %key, "rate limit exceeded");
        let mut response =
            ApiError::too_many_requests("Rate limit exceeded, retry later").into_response();
        apply_headers(&mut response, decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(&mut response, decision);
    response
}

fn apply_headers(response: &mut Response, decision: RateDecision) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", value);
    }
    if let Ok(value) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", value);
    }
}

/// Identify the client by the forwarded address when present, otherwise
/// treat the request as local.
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "local".to_string())
}

impl ApiError {
    fn too_many_requests(detail: impl Into<String>) -> Self {
        Self {
            status: axum::http::StatusCode::TOO_MANY_REQUESTS,
            detail: detail.into(),
        }
    }
}
