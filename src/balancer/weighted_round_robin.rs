use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{info, warn};

use super::policy::BalancerPolicy;
use crate::config::Gateway;
use crate::error::{GatewayError, GatewayResult};

struct WrrTarget {
    url: String,
    weight: u32,
    healthy: bool,
}

struct PrefixTargets {
    targets: Vec<WrrTarget>,
    /// Index of the target currently being emitted.
    cursor: usize,
    /// How many times the current target has been emitted this pass.
    emitted: u32,
    /// Sum of weights of currently-healthy targets.
    total_weight: u32,
}

/// Weighted round-robin policy: each healthy target is returned `weight`
/// times per rotation, so selections are proportional to weight. The
/// healthy total-weight is cached and recomputed on health transitions;
/// a zero total short-circuits selection.
pub struct WeightedRoundRobinPolicy {
    table: RwLock<HashMap<String, PrefixTargets>>,
}

impl WeightedRoundRobinPolicy {
    pub fn new(gateways: &[Gateway]) -> Self {
        let mut table = HashMap::new();

        for gateway in gateways {
            let mut targets = Vec::with_capacity(gateway.targets.len());
            let mut total_weight = 0;

            for target in &gateway.targets {
                if target.weight.map_or(true, |w| w < 1) {
                    warn!(url = %target.url, "target weight missing or non-positive, defaulting to 1");
                }
                let weight = target.effective_weight();
                total_weight += weight;
                targets.push(WrrTarget {
                    url: target.url.clone(),
                    weight,
                    healthy: true,
                });
            }

            table.insert(
                gateway.prefix.clone(),
                PrefixTargets {
                    targets,
                    cursor: 0,
                    emitted: 0,
                    total_weight,
                },
            );
        }

        Self {
            table: RwLock::new(table),
        }
    }
}

impl BalancerPolicy for WeightedRoundRobinPolicy {
    fn select_target(&self, prefix: &str) -> GatewayResult<String> {
        {
            let table = self.table.read().unwrap_or_else(|e| e.into_inner());
            if !table.contains_key(prefix) {
                return Err(GatewayError::prefix_not_found(prefix));
            }
        }

        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        let entry = table
            .get_mut(prefix)
            .ok_or_else(|| GatewayError::prefix_not_found(prefix))?;

        if entry.total_weight == 0 {
            return Err(GatewayError::NoHealthyTargets);
        }

        let len = entry.targets.len();
        let mut scanned = 0;
        while scanned < len {
            let cursor = entry.cursor;
            let healthy = entry.targets[cursor].healthy;
            let weight = entry.targets[cursor].weight;

            if healthy && weight > 0 && entry.emitted < weight {
                entry.emitted += 1;
                if entry.emitted >= weight {
                    entry.cursor = (cursor + 1) % len;
                    entry.emitted = 0;
                }
                return Ok(entry.targets[cursor].url.clone());
            }

            entry.cursor = (cursor + 1) % len;
            entry.emitted = 0;
            scanned += 1;
        }

        // Full rotation without a weighted pick: fall back to the first
        // healthy target of any weight.
        for target in &entry.targets {
            if target.healthy {
                return Ok(target.url.clone());
            }
        }

        Err(GatewayError::NoHealthyTargets)
    }

    fn set_health_info(&self, healthy: &HashMap<String, bool>) {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());

        for (prefix, entry) in table.iter_mut() {
            let mut new_total_weight = 0;
            let mut changed = false;

            for target in entry.targets.iter_mut() {
                let is_healthy = healthy.get(&target.url).copied().unwrap_or(true);
                if target.healthy != is_healthy {
                    changed = true;
                }
                target.healthy = is_healthy;
                if is_healthy {
                    new_total_weight += target.weight;
                }
            }

            if changed {
                entry.total_weight = new_total_weight;
                entry.cursor = 0;
                entry.emitted = 0;
                info!(
                    prefix = %prefix,
                    total_weight = new_total_weight,
                    "health status updated, new total weight"
                );
            }
        }
    }
}
