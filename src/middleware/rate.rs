use async_trait::async_trait;
use hyper::{Body, Request, Response, StatusCode};
use std::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

use super::{ChainHandler, Middleware};
use crate::metrics;

/// Tokens restored per minute, independent of the configured burst.
const REFILL_PER_MINUTE: f64 = 100.0;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Process-wide token bucket. `capacity` bounds the burst; refill runs at
/// a fixed 100 tokens per minute. `allow` never blocks.
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
}

impl TokenBucket {
    pub fn new(capacity: u32) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
            capacity: capacity as f64,
            refill_per_sec: REFILL_PER_MINUTE / 60.0,
        }
    }

    /// Take one token if available.
    pub fn allow(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.last_refill = now;
        state.tokens =
            (state.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Global admission control: one bucket shared by every prefix that
/// enables the middleware.
pub struct RateLimitMiddleware {
    bucket: TokenBucket,
}

impl RateLimitMiddleware {
    pub fn new(max_request: u32) -> Self {
        Self {
            bucket: TokenBucket::new(max_request),
        }
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    async fn handle(&self, req: Request<Body>, next: ChainHandler) -> Response<Body> {
        if !self.bucket.allow() {
            let path = req.uri().path();
            warn!(path = %path, "rate limiter rejected request");
            metrics::record_error(path);

            return Response::builder()
                .status(StatusCode::TOO_MANY_REQUESTS)
                .body(Body::from("Rate limit exceeded"))
                .unwrap_or_default();
        }

        next(req).await
    }
}
