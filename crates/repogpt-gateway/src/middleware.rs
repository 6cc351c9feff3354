//! Request guards for the API routes: bearer auth and a per-IP rate limit.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;

use crate::error::ApiError;

const MAX_TRACKED_CLIENTS: usize = 10_000;
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Expected bearer token, kept only as a blake3 digest.
#[derive(Clone)]
pub(crate) struct BearerAuth {
    expected: Option<blake3::Hash>,
}

impl BearerAuth {
    pub(crate) fn new(token: Option<&str>) -> Self {
        Self {
            expected: token.map(|t| blake3::hash(t.as_bytes())),
        }
    }

    /// Digests are equal length, so the comparison time does not depend on the token.
    fn accepts(&self, authorization: Option<&str>) -> bool {
        let Some(expected) = self.expected else {
            return true;
        };
        let presented = authorization
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or_default();
        let presented = blake3::hash(presented.as_bytes());
        presented.as_bytes().ct_eq(expected.as_bytes()).into()
    }
}

pub(crate) async fn require_bearer(
    State(auth): State<BearerAuth>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if !auth.accepts(authorization) {
        return ApiError::new(StatusCode::UNAUTHORIZED, "missing or invalid bearer token")
            .into_response();
    }
    next.run(req).await
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Fixed one-minute window per client address. A limit of 0 disables it.
#[derive(Clone)]
pub(crate) struct RateLimiter {
    limit: u32,
    windows: Arc<Mutex<HashMap<IpAddr, Window>>>,
}

impl RateLimiter {
    pub(crate) fn new(limit: u32) -> Self {
        Self {
            limit,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn admit(&self, ip: IpAddr, now: Instant) -> bool {
        if self.limit == 0 {
            return true;
        }
        let mut windows = self.windows.lock().await;
        if windows.len() >= MAX_TRACKED_CLIENTS && !windows.contains_key(&ip) {
            windows.retain(|_, w| now.duration_since(w.started) < RATE_WINDOW);
        }

        let window = windows.entry(ip).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(window.started) >= RATE_WINDOW {
            *window = Window {
                started: now,
                hits: 0,
            };
        }
        window.hits = window.hits.saturating_add(1);
        window.hits <= self.limit
    }
}

pub(crate) async fn throttle(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ci| ci.0.ip());

    if !limiter.admit(ip, Instant::now()).await {
        tracing::warn!(%ip, "rate limit exceeded");
        return ApiError::new(StatusCode::TOO_MANY_REQUESTS, "too many requests, retry later")
            .into_response();
    }
    next.run(req).await
}
