use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::Gateway;

/// Time budget for one full probe cycle.
pub const PROBE_BUDGET: Duration = Duration::from_secs(30);

/// Probes every configured target for liveness.
///
/// Built from the flattened target list across all gateways; each target
/// maps to its probe endpoint (empty means the target root).
pub struct HealthChecker {
    endpoints: HashMap<String, String>,
    client: reqwest::Client,
}

impl HealthChecker {
    pub fn new(gateways: &[Gateway]) -> Self {
        let mut endpoints = HashMap::new();

        for gateway in gateways {
            for target in &gateway.targets {
                endpoints.insert(target.url.clone(), target.health_endpoint.clone());
            }
        }

        let client = reqwest::Client::builder()
            .timeout(PROBE_BUDGET)
            .build()
            .unwrap_or_default();

        Self { endpoints, client }
    }

    /// Run one probe cycle: a GET per target, all in parallel, joined
    /// before returning. A target is healthy when its probe completes
    /// without transport error within the budget. The result has one
    /// entry per configured target; individual failures never fail the
    /// cycle.
    pub async fn check(&self) -> HashMap<String, bool> {
        let results = Arc::new(Mutex::new(HashMap::with_capacity(self.endpoints.len())));
        let mut probes = Vec::with_capacity(self.endpoints.len());

        for (url, endpoint) in &self.endpoints {
            let probe_url = format!("{}{}", url, endpoint);
            let url = url.clone();
            let client = self.client.clone();
            let results = Arc::clone(&results);

            probes.push(tokio::spawn(async move {
                let healthy = match client.get(&probe_url).send().await {
                    Ok(_) => true,
                    Err(e) => {
                        debug!(target = %url, error = %e, "health probe failed");
                        false
                    }
                };

                results.lock().await.insert(url, healthy);
            }));
        }

        for probe in probes {
            let _ = probe.await;
        }

        let results = results.lock().await;
        results.clone()
    }
}
