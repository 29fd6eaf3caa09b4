use async_trait::async_trait;
use hyper::{Body, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ChainHandler, Middleware};
use crate::cache::TtlStore;

/// Response cache keyed by request path.
///
/// A hit answers from the store without invoking the downstream handler.
/// A miss invokes it, accumulates the full response body, stores it under
/// the path, and sends the same bytes to the client. Method, query string,
/// and Vary headers are deliberately not part of the key.
pub struct CacheMiddleware {
    store: Arc<TtlStore>,
}

impl CacheMiddleware {
    pub fn new(store: Arc<TtlStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Middleware for CacheMiddleware {
    async fn handle(&self, req: Request<Body>, next: ChainHandler) -> Response<Body> {
        let key = req.uri().path().to_string();

        if let Some(value) = self.store.get(&key).await {
            debug!(path = %key, "serving response from cache");
            return Response::new(Body::from(value));
        }

        let resp = next(req).await;
        let (parts, body) = resp.into_parts();

        let bytes = match hyper::body::to_bytes(body).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %key, error = %e, "failed to read downstream response body");
                return Response::builder()
                    .status(StatusCode::BAD_GATEWAY)
                    .body(Body::from("bad gateway"))
                    .unwrap_or_default();
            }
        };

        if let Err(e) = self.store.set(&key, bytes.to_vec()).await {
            debug!(path = %key, error = %e, "response not cached");
        }

        Response::from_parts(parts, Body::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counting_handler(counter: Arc<AtomicUsize>, body: &'static str) -> ChainHandler {
        Arc::new(move |_req| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Response::new(Body::from(body))
            })
        })
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let store = Arc::new(TtlStore::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let mw = CacheMiddleware::new(Arc::clone(&store));
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(Arc::clone(&calls), "payload");

        let req = Request::builder().uri("/p/x").body(Body::empty()).unwrap();
        let resp = mw.handle(req, Arc::clone(&handler)).await;
        let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], b"payload");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Second identical request: byte-for-byte body, downstream untouched.
        let req = Request::builder().uri("/p/x").body(Body::empty()).unwrap();
        let resp = mw.handle(req, handler).await;
        let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        assert_eq!(&body[..], b"payload");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.stop();
    }

    #[tokio::test]
    async fn test_distinct_paths_cached_separately() {
        let store = Arc::new(TtlStore::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let mw = CacheMiddleware::new(Arc::clone(&store));
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(Arc::clone(&calls), "payload");

        for path in ["/a", "/b"] {
            let req = Request::builder().uri(path).body(Body::empty()).unwrap();
            mw.handle(req, Arc::clone(&handler)).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        store.stop();
    }

    #[tokio::test]
    async fn test_empty_body_not_cached() {
        let store = Arc::new(TtlStore::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let mw = CacheMiddleware::new(Arc::clone(&store));
        let calls = Arc::new(AtomicUsize::new(0));
        let handler = counting_handler(Arc::clone(&calls), "");

        for _ in 0..2 {
            let req = Request::builder().uri("/e").body(Body::empty()).unwrap();
            mw.handle(req, Arc::clone(&handler)).await;
        }
        // An empty body is rejected by the store, so both calls go down.
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        store.stop();
    }
}
