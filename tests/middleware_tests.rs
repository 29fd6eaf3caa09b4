use portico::cache::TtlStore;
use portico::middleware::{
    self, auth::sign_hs256, AuthMiddleware, CacheMiddleware, ChainHandler, Middleware,
    RateLimitMiddleware,
};

use hyper::header::AUTHORIZATION;
use hyper::{Body, Request, Response, StatusCode};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
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

fn request(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

fn authed_request(path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header(AUTHORIZATION, token)
        .body(Body::empty())
        .unwrap()
}

async fn body_of(resp: Response<Body>) -> Vec<u8> {
    hyper::body::to_bytes(resp.into_body()).await.unwrap().to_vec()
}

#[tokio::test]
async fn test_cache_pass_through_on_miss() {
    let store = Arc::new(TtlStore::new(
        Duration::from_secs(60),
        Duration::from_secs(60),
    ));
    let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(CacheMiddleware::new(Arc::clone(&store)))];
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = middleware::compose(&chain, counting_handler(Arc::clone(&calls), "body-bytes"));

    let resp = handler(request("/p/x")).await;
    assert_eq!(body_of(resp).await, b"body-bytes");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let resp = handler(request("/p/x")).await;
    assert_eq!(body_of(resp).await, b"body-bytes");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "hit must not invoke downstream");

    store.stop();
}

#[tokio::test]
async fn test_cache_expiry_restores_pass_through() {
    let store = Arc::new(TtlStore::new(
        Duration::from_millis(30),
        Duration::from_secs(3600),
    ));
    let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(CacheMiddleware::new(Arc::clone(&store)))];
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = middleware::compose(&chain, counting_handler(Arc::clone(&calls), "fresh"));

    handler(request("/p/y")).await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    handler(request("/p/y")).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);

    store.stop();
}

#[tokio::test]
async fn test_auth_rejections() {
    let chain: Vec<Arc<dyn Middleware>> =
        vec![Arc::new(AuthMiddleware::new("right-key".to_string()))];
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = middleware::compose(&chain, counting_handler(Arc::clone(&calls), "secret"));

    // Missing Authorization header.
    let resp = handler(request("/secure/item")).await;
    assert_eq!(resp.status(), StatusCode::NON_AUTHORITATIVE_INFORMATION);
    assert_eq!(body_of(resp).await, b"empty auth token");

    // Token signed with the wrong key.
    let bad = sign_hs256(b"wrong-key", &json!({"sub": "u"}));
    let resp = handler(authed_request("/secure/item", &bad)).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_of(resp).await, b"failed to parse token");

    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Valid token reaches downstream.
    let good = sign_hs256(b"right-key", &json!({"sub": "u"}));
    let resp = handler(authed_request("/secure/item", &good)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_admits_burst_size() {
    let chain: Vec<Arc<dyn Middleware>> = vec![Arc::new(RateLimitMiddleware::new(5))];
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = middleware::compose(&chain, counting_handler(Arc::clone(&calls), "ok"));

    let mut ok = 0;
    let mut limited = 0;
    for _ in 0..10 {
        let resp = handler(request("/r")).await;
        match resp.status() {
            StatusCode::OK => ok += 1,
            StatusCode::TOO_MANY_REQUESTS => {
                assert_eq!(body_of(resp).await, b"Rate limit exceeded");
                limited += 1;
            }
            other => panic!("unexpected status {}", other),
        }
    }

    assert_eq!(ok, 5);
    assert_eq!(limited, 5);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_auth_then_cache_chain() {
    // Auth runs on every request; the cache only spares the downstream.
    let store = Arc::new(TtlStore::new(
        Duration::from_secs(60),
        Duration::from_secs(60),
    ));
    let chain: Vec<Arc<dyn Middleware>> = vec![
        Arc::new(AuthMiddleware::new("key".to_string())),
        Arc::new(CacheMiddleware::new(Arc::clone(&store))),
    ];
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = middleware::compose(&chain, counting_handler(Arc::clone(&calls), "item-body"));

    let token = sign_hs256(b"key", &json!({"sub": "u"}));

    let resp = handler(authed_request("/secure/item", &token)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_of(resp).await, b"item-body");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Second identical request: served from cache, auth still enforced.
    let resp = handler(authed_request("/secure/item", &token)).await;
    assert_eq!(body_of(resp).await, b"item-body");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Same path without a token is still rejected.
    let resp = handler(request("/secure/item")).await;
    assert_eq!(resp.status(), StatusCode::NON_AUTHORITATIVE_INFORMATION);

    store.stop();
}
