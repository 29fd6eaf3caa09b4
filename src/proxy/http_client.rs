use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, Response, Uri};
use hyper_rustls::HttpsConnectorBuilder;
use once_cell::sync::Lazy;
use std::sync::RwLock;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};

/// Shared hyper client with connection pooling (HTTP/HTTPS via rustls).
/// A single instance is reused across requests to enable pooling.
static SHARED_CLIENT: Lazy<
    RwLock<std::sync::Arc<Client<hyper_rustls::HttpsConnector<HttpConnector>, Body>>>,
> = Lazy::new(|| RwLock::new(std::sync::Arc::new(build_client())));

/// Upstream request timeout in seconds, set from configuration at startup.
static REQUEST_TIMEOUT_SECS: Lazy<RwLock<u64>> = Lazy::new(|| RwLock::new(30));

/// Set the upstream request timeout. Safe to call more than once.
pub fn init(request_timeout_secs: u64) {
    if let Ok(mut guard) = REQUEST_TIMEOUT_SECS.write() {
        *guard = request_timeout_secs.max(1);
    }
}

fn get_client() -> std::sync::Arc<Client<hyper_rustls::HttpsConnector<HttpConnector>, Body>> {
    SHARED_CLIENT
        .read()
        .ok()
        .map(|guard| std::sync::Arc::clone(&*guard))
        .unwrap_or_else(|| std::sync::Arc::new(build_client()))
}

fn request_timeout() -> Duration {
    let secs = REQUEST_TIMEOUT_SECS.read().map(|g| *g).unwrap_or(30);
    Duration::from_secs(secs)
}

fn build_client() -> Client<hyper_rustls::HttpsConnector<HttpConnector>, Body> {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_nodelay(true);

    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

    Client::builder()
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(32)
        .build::<_, Body>(https)
}

/// Forward a request to `target_base`, preserving its path and query and
/// streaming both bodies. The upstream response comes back with
/// hop-by-hop headers removed.
pub async fn forward(req: Request<Body>, target_base: &str) -> GatewayResult<Response<Body>> {
    let base: Uri = target_base
        .parse()
        .map_err(|e| GatewayError::proxy(format!("invalid target url: {}", e)))?;

    let (mut parts, body) = req.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let scheme = base.scheme_str().unwrap_or("http");
    let authority = base.authority().ok_or_else(|| {
        GatewayError::proxy(format!("target URI missing authority: {}", target_base))
    })?;

    let new_uri: Uri = format!("{}://{}{}", scheme, authority, path_and_query)
        .parse()
        .map_err(|e| GatewayError::proxy(format!("invalid upstream uri: {}", e)))?;
    parts.uri = new_uri;

    strip_hop_by_hop_headers(&mut parts.headers);
    parts.headers.insert(
        hyper::header::HOST,
        authority
            .as_str()
            .parse()
            .map_err(|e| GatewayError::proxy(format!("bad host header: {}", e)))?,
    );
    parts.headers.entry("x-forwarded-proto").or_insert_with(|| {
        if scheme == "https" {
            hyper::header::HeaderValue::from_static("https")
        } else {
            hyper::header::HeaderValue::from_static("http")
        }
    });
    parts
        .headers
        .entry("x-forwarded-for")
        .or_insert_with(|| hyper::header::HeaderValue::from_static("127.0.0.1"));

    let client = get_client();
    let timeout = request_timeout();

    let upstream_req = Request::from_parts(parts, body);
    let upstream_res = tokio::time::timeout(timeout, client.request(upstream_req))
        .await
        .map_err(|_| GatewayError::timeout(timeout, "HTTP request"))?
        .map_err(GatewayError::from)?;

    Ok(build_downstream_response(upstream_res))
}

fn build_downstream_response(upstream: Response<Body>) -> Response<Body> {
    let (parts, body) = upstream.into_parts();
    let mut builder = Response::builder().status(parts.status);

    for (name, value) in parts.headers.iter() {
        if !is_hop_by_hop_header(name.as_str()) {
            builder = builder.header(name, value);
        }
    }

    builder
        .body(body)
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

fn strip_hop_by_hop_headers(headers: &mut hyper::HeaderMap) {
    // If the Connection header listed additional hop-by-hop headers,
    // remove those too.
    if let Some(conn_val) = headers.get("connection").and_then(|v| v.to_str().ok()) {
        let extra: Vec<String> = conn_val
            .split(',')
            .map(|s| s.trim().to_ascii_lowercase())
            .collect();
        for name in extra {
            headers.remove(name);
        }
    }

    const HOP_HEADERS: &[&str] = &[
        "connection",
        "keep-alive",
        "proxy-authenticate",
        "proxy-authorization",
        "te",
        "trailers",
        "transfer-encoding",
        "upgrade",
    ];
    for header in HOP_HEADERS {
        headers.remove(*header);
    }
}
