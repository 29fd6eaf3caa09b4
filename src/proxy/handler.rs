use hyper::{Body, Request, Response, StatusCode};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::forwarder::ReverseProxy;
use crate::balancer::LoadBalancer;
use crate::cache::TtlStore;
use crate::config::Config;
use crate::middleware::{
    self, AuthMiddleware, CacheMiddleware, Middleware, RateLimitMiddleware,
};
use crate::metrics;

/// Entry point of the request pipeline: balance the request to a target,
/// wrap the reverse proxy in the prefix's middleware chain, invoke it.
///
/// Chains are materialized once at construction. For each gateway the
/// order is auth, then cache, then rate, each included when its switch is
/// set; the middleware instances themselves are shared across prefixes.
#[derive(Clone)]
pub struct RequestHandler {
    load_balancer: Arc<LoadBalancer>,
    proxy: ReverseProxy,
    chains: Arc<HashMap<String, Vec<Arc<dyn Middleware>>>>,
}

impl RequestHandler {
    pub fn new(config: &Config, load_balancer: Arc<LoadBalancer>, store: Arc<TtlStore>) -> Self {
        let auth: Arc<dyn Middleware> = Arc::new(AuthMiddleware::new(
            config
                .auth
                .as_ref()
                .map(|a| a.key.clone())
                .unwrap_or_default(),
        ));
        let cache: Arc<dyn Middleware> = Arc::new(CacheMiddleware::new(store));
        let rate: Arc<dyn Middleware> =
            Arc::new(RateLimitMiddleware::new(config.rate_limiting.max_request));

        let mut chains: HashMap<String, Vec<Arc<dyn Middleware>>> = HashMap::new();
        for gateway in &config.gateways {
            let mut chain: Vec<Arc<dyn Middleware>> = Vec::new();
            if gateway.auth {
                chain.push(Arc::clone(&auth));
            }
            if gateway.cache {
                chain.push(Arc::clone(&cache));
            }
            if gateway.rate {
                chain.push(Arc::clone(&rate));
            }
            chains.insert(gateway.prefix.clone(), chain);
        }

        Self {
            load_balancer,
            proxy: ReverseProxy::new(),
            chains: Arc::new(chains),
        }
    }

    pub async fn handle_request(&self, req: Request<Body>) -> Result<Response<Body>, Infallible> {
        let started = Instant::now();
        let path = req.uri().path().to_string();

        let response = self.process(req).await;

        metrics::record_request(&path);
        metrics::observe_duration(&path, started.elapsed().as_secs_f64());

        Ok(response)
    }

    async fn process(&self, req: Request<Body>) -> Response<Body> {
        let request_id = Uuid::new_v4();
        let path = req.uri().path().to_string();

        let target = match self.load_balancer.balance(&req) {
            Ok(target) => target,
            Err(e) => {
                error!(%request_id, path = %path, error = %e, "failed to balance request");
                metrics::record_error(&path);
                return Response::builder()
                    .status(StatusCode::BAD_GATEWAY)
                    .body(Body::from("failed balance targets"))
                    .unwrap_or_default();
            }
        };

        let prefix = self.load_balancer.resolve_prefix(&path);
        let empty_chain: &[Arc<dyn Middleware>] = &[];
        let chain = match self.chains.get(&prefix) {
            Some(chain) => chain.as_slice(),
            None => {
                warn!(prefix = %prefix, "no middleware chain for prefix");
                empty_chain
            }
        };

        let terminal = self.proxy.handler_for(&target);
        let handler = middleware::compose(chain, terminal);

        debug!(%request_id, target = %target, prefix = %prefix, "request dispatched");
        handler(req).await
    }
}
