use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

use super::policy::BalancerPolicy;
use crate::config::Gateway;
use crate::error::{GatewayError, GatewayResult};

struct RrTarget {
    url: String,
    healthy: bool,
}

struct PrefixTargets {
    targets: Vec<RrTarget>,
    cursor: usize,
}

/// Round-robin policy: for each prefix, rotate over the targets and
/// return the first healthy one, advancing the cursor past it.
pub struct RoundRobinPolicy {
    table: RwLock<HashMap<String, PrefixTargets>>,
}

impl RoundRobinPolicy {
    pub fn new(gateways: &[Gateway]) -> Self {
        let mut table = HashMap::new();

        for gateway in gateways {
            let targets = gateway
                .targets
                .iter()
                .map(|target| RrTarget {
                    url: target.url.clone(),
                    healthy: true,
                })
                .collect();

            table.insert(
                gateway.prefix.clone(),
                PrefixTargets { targets, cursor: 0 },
            );
        }

        Self {
            table: RwLock::new(table),
        }
    }
}

impl BalancerPolicy for RoundRobinPolicy {
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

        let len = entry.targets.len();
        for _ in 0..len {
            let idx = entry.cursor;
            entry.cursor = (entry.cursor + 1) % len;

            if entry.targets[idx].healthy {
                return Ok(entry.targets[idx].url.clone());
            }
        }

        Err(GatewayError::NoHealthyTargets)
    }

    fn set_health_info(&self, healthy: &HashMap<String, bool>) {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());

        for (prefix, entry) in table.iter_mut() {
            let mut changed = false;

            for target in entry.targets.iter_mut() {
                let is_healthy = healthy.get(&target.url).copied().unwrap_or(true);
                if target.healthy != is_healthy {
                    changed = true;
                }
                target.healthy = is_healthy;
            }

            if changed {
                info!(prefix = %prefix, "health status updated");
            }
        }
    }
}
