use hyper::{Body, Response, StatusCode};
use std::sync::Arc;
use tracing::{debug, warn};

use super::http_client;
use crate::middleware::ChainHandler;

/// Builds the terminal handler of a middleware chain: a single-target
/// reverse proxy bound to the balanced upstream.
#[derive(Clone, Default)]
pub struct ReverseProxy;

impl ReverseProxy {
    pub fn new() -> Self {
        Self
    }

    /// Handler that forwards the request to `target`, streaming request
    /// and response bodies. Upstream transport failure surfaces as 502.
    pub fn handler_for(&self, target: &str) -> ChainHandler {
        let target = target.to_string();

        Arc::new(move |req| {
            let target = target.clone();
            Box::pin(async move {
                let destination = resolve_target(&target, req.uri().path());
                debug!(target = %destination, "forwarding request upstream");

                match http_client::forward(req, &destination).await {
                    Ok(resp) => resp,
                    Err(e) => {
                        warn!(target = %destination, error = %e, "upstream request failed");
                        Response::builder()
                            .status(StatusCode::BAD_GATEWAY)
                            .body(Body::from("bad gateway"))
                            .unwrap_or_default()
                    }
                }
            })
        })
    }
}

/// Rewrite the balanced target into a forwardable base URL. A literal
/// `{id}` in the target is replaced with the request's trailing path
/// segment; targets without a scheme are forwarded over plain HTTP.
fn resolve_target(target: &str, path: &str) -> String {
    let target = if target.contains("{id}") {
        let id = path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        target.replace("{id}", id)
    } else {
        target.to_string()
    };

    if target.starts_with("http://") || target.starts_with("https://") {
        target
    } else {
        format!("http://{}", target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_target_adds_scheme() {
        assert_eq!(
            resolve_target("127.0.0.1:3001", "/api/x"),
            "http://127.0.0.1:3001"
        );
        assert_eq!(
            resolve_target("http://127.0.0.1:3001", "/api/x"),
            "http://127.0.0.1:3001"
        );
        assert_eq!(
            resolve_target("https://upstream", "/api/x"),
            "https://upstream"
        );
    }

    #[test]
    fn test_resolve_target_id_templating() {
        assert_eq!(
            resolve_target("http://items-{id}.svc", "/api/items/42"),
            "http://items-42.svc"
        );
        assert_eq!(
            resolve_target("http://items-{id}.svc", "/api/items/42/"),
            "http://items-42.svc"
        );
        // No trailing segment: the placeholder collapses.
        assert_eq!(resolve_target("http://x-{id}", "/"), "http://x-");
    }
}
