//! Fixed-window rate limiter applied as axum middleware.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Extension, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::ErrorBody;

/// Requests allowed per second on protected routes.
pub const DEFAULT_REQUESTS_PER_SEC: u64 = 100;

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u64,
}

/// Shared one-second request counter.
#[derive(Clone)]
pub struct RateLimiter {
    max_per_sec: u64,
    window: Arc<Mutex<Window>>,
}

impl RateLimiter {
    pub fn new(max_per_sec: u64) -> Self {
        Self {
            max_per_sec,
            window: Arc::new(Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            })),
        }
    }

    /// Count one request; `false` once the current second's budget is spent.
    pub fn try_acquire(&self) -> bool {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        if window.started.elapsed() >= Duration::from_secs(1) {
            window.started = Instant::now();
            window.count = 0;
        }
        if window.count < self.max_per_sec {
            window.count += 1;
            true
        } else {
            false
        }
    }
}

pub async fn rate_limit_middleware(
    Extension(limiter): Extension<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    if limiter.try_acquire() {
        return next.run(req).await;
    }
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorBody::new("too_many_requests", "Rate limit exceeded")),
    )
        .into_response()
}
