//! Fixed-window request limiting per client address.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use dashmap::DashMap;

use crate::error::AppError;

pub const X_RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

// Expired windows are swept once the table grows past this.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix time at which the current window ends.
    pub reset_at: u64,
}

impl RateLimitDecision {
    pub fn retry_after(&self, now: u64) -> u64 {
        self.reset_at.saturating_sub(now).max(1)
    }

    fn write_headers(&self, headers: &mut HeaderMap) {
        headers.insert(X_RATE_LIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATE_LIMIT_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(X_RATE_LIMIT_RESET, HeaderValue::from(self.reset_at));
    }
}

#[derive(Debug)]
struct Window {
    started_at: u64,
    count: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    limit: u32,
    window_secs: u64,
    windows: Arc<DashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            limit,
            window_secs: window_secs.max(1),
            windows: Arc::new(DashMap::new()),
        }
    }

    /// Count one request for `key` at unix time `now`.
    pub fn check(&self, key: &str, now: u64) -> RateLimitDecision {
        let decision = {
            let mut window = self.windows.entry(key.to_string()).or_insert(Window {
                started_at: now,
                count: 0,
            });
            if now >= window.started_at + self.window_secs {
                window.started_at = now;
                window.count = 0;
            }

            let reset_at = window.started_at + self.window_secs;
            if window.count >= self.limit {
                RateLimitDecision {
                    allowed: false,
                    limit: self.limit,
                    remaining: 0,
                    reset_at,
                }
            } else {
                window.count += 1;
                RateLimitDecision {
                    allowed: true,
                    limit: self.limit,
                    remaining: self.limit - window.count,
                    reset_at,
                }
            }
        };

        // The entry guard is released above; retain locks every shard.
        if self.windows.len() > SWEEP_THRESHOLD {
            let window_secs = self.window_secs;
            self.windows.retain(|_, w| now < w.started_at + window_secs);
        }

        decision
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Client address: first `X-Forwarded-For` hop, else the socket peer.
fn client_key(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(addr) = forwarded {
        return addr.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    let now = Utc::now().timestamp().max(0) as u64;
    let decision = limiter.check(&key, now);

    if !decision.allowed {
        tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        let mut response = AppError::RateLimited {
            retry_after_secs: decision.retry_after(now),
        }
        .into_response();
        decision.write_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    decision.write_headers(response.headers_mut());
    response
}
