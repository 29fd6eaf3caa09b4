//! Request-processing middleware and per-prefix chain composition.
//!
//! Each gateway prefix gets an ordered chain built once at startup. At
//! request time the chain wraps the reverse-proxy handler for the chosen
//! target; the first-declared middleware runs first.

pub mod auth;
pub mod cache;
pub mod rate;

use async_trait::async_trait;
use hyper::{Body, Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub use auth::AuthMiddleware;
pub use cache::CacheMiddleware;
pub use rate::RateLimitMiddleware;

/// Boxed future returned by chain handlers.
pub type ChainFuture = Pin<Box<dyn Future<Output = Response<Body>> + Send>>;

/// A callable request handler: the reverse proxy at the end of a chain,
/// or a middleware-wrapped layer above it.
pub type ChainHandler = Arc<dyn Fn(Request<Body>) -> ChainFuture + Send + Sync>;

/// A request-processing wrapper. Implementations either short-circuit
/// with their own response or delegate to `next`.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: Request<Body>, next: ChainHandler) -> Response<Body>;
}

/// Wrap `terminal` in `chain`, innermost-last, so the first middleware
/// in the slice runs first at request time.
pub fn compose(chain: &[Arc<dyn Middleware>], terminal: ChainHandler) -> ChainHandler {
    let mut handler = terminal;

    for middleware in chain.iter().rev() {
        let middleware = Arc::clone(middleware);
        let next = handler;
        handler = Arc::new(move |req| {
            let middleware = Arc::clone(&middleware);
            let next = Arc::clone(&next);
            Box::pin(async move { middleware.handle(req, next).await })
        });
    }

    handler
}
