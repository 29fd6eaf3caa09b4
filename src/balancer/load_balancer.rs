use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use super::health_check::HealthChecker;
use super::policy::BalancerPolicy;
use super::round_robin::RoundRobinPolicy;
use super::weighted_round_robin::WeightedRoundRobinPolicy;
use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};

/// Stops the probe and apply loops when pulled. Dropping the handle has
/// the same effect, so background tasks never outlive their owner.
pub struct CancelHandle {
    cancel_tx: watch::Sender<bool>,
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle").finish()
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }
}

/// Routes requests to upstream targets by URL prefix.
///
/// Owns the balancing policy and the health checker. Construction spawns
/// a probe loop (runs a probe cycle every health-check period) and an
/// apply loop (feeds results into the policy), connected by a
/// latest-value channel: an unread probe result is overwritten by the
/// next cycle, preferring recency over completeness.
pub struct LoadBalancer {
    policy: Arc<dyn BalancerPolicy>,
    /// Configured prefixes, longest first, for request matching.
    prefixes: Vec<String>,
}

impl std::fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("prefixes", &self.prefixes)
            .finish()
    }
}

impl LoadBalancer {
    pub fn new(config: &Config) -> GatewayResult<(Self, CancelHandle)> {
        check_gateways_valid(config)?;

        let policy: Arc<dyn BalancerPolicy> = match config.balancer.as_str() {
            "wrr" => Arc::new(WeightedRoundRobinPolicy::new(&config.gateways)),
            "rr" => Arc::new(RoundRobinPolicy::new(&config.gateways)),
            other => return Err(GatewayError::unknown_balancer(other)),
        };

        let mut prefixes: Vec<String> = config
            .gateways
            .iter()
            .map(|gateway| gateway.prefix.clone())
            .collect();
        prefixes.sort_by_key(|prefix| std::cmp::Reverse(prefix.len()));

        info!(balancer = %config.balancer, gateways = config.gateways.len(), "load balancer ready");

        let checker = HealthChecker::new(&config.gateways);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (result_tx, result_rx) = watch::channel(HashMap::new());

        spawn_probe_loop(checker, config.hc_timeout(), result_tx, cancel_rx.clone());
        spawn_apply_loop(Arc::clone(&policy), result_rx, cancel_rx);

        Ok((Self { policy, prefixes }, CancelHandle { cancel_tx }))
    }

    /// Choose a target for the request, routing by its URL prefix.
    pub fn balance<B>(&self, req: &hyper::Request<B>) -> GatewayResult<String> {
        let prefix = self.resolve_prefix(req.uri().path());
        self.policy.select_target(&prefix)
    }

    /// Map a request path to its routing prefix: the longest configured
    /// prefix the path falls under, or `/<first-segment>` when none
    /// matches (so unconfigured paths surface as `PrefixNotFound`).
    pub fn resolve_prefix(&self, path: &str) -> String {
        for prefix in &self.prefixes {
            if path == prefix.as_str()
                || (path.starts_with(prefix.as_str())
                    && path.as_bytes().get(prefix.len()) == Some(&b'/'))
            {
                return prefix.clone();
            }
        }
        first_segment_prefix(path)
    }
}

/// `/<first-segment>` of a request path.
pub fn first_segment_prefix(path: &str) -> String {
    let segment = path.trim_start_matches('/').split('/').next().unwrap_or("");
    format!("/{}", segment)
}

fn spawn_probe_loop(
    checker: HealthChecker,
    period: std::time::Duration,
    result_tx: watch::Sender<HashMap<String, bool>>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        // First probe one period from now: targets start healthy until
        // the first cycle completes.
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("starting health check cycle");
                    let health = checker.check().await;
                    if result_tx.send(health).is_err() {
                        break;
                    }
                }
                _ = cancel_rx.changed() => {
                    info!("probe loop stopping");
                    break;
                }
            }
        }
    });
}

fn spawn_apply_loop(
    policy: Arc<dyn BalancerPolicy>,
    mut result_rx: watch::Receiver<HashMap<String, bool>>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                changed = result_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let health = result_rx.borrow_and_update().clone();
                    policy.set_health_info(&health);
                }
                _ = cancel_rx.changed() => {
                    info!("apply loop stopping");
                    break;
                }
            }
        }
    });
}

fn check_gateways_valid(config: &Config) -> GatewayResult<()> {
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for gateway in &config.gateways {
        if gateway.prefix.is_empty() {
            return Err(GatewayError::config("empty prefix"));
        }

        if gateway.targets.is_empty() {
            return Err(GatewayError::config(format!(
                "empty targets for prefix {}",
                gateway.prefix
            )));
        }

        *seen.entry(gateway.prefix.as_str()).or_default() += 1;
    }

    for (prefix, count) in seen {
        if count > 1 {
            warn!(prefix = %prefix, "duplicate gateway prefix in configuration");
            return Err(GatewayError::config(format!("double prefix: {}", prefix)));
        }
    }

    Ok(())
}
