use std::collections::HashMap;

use crate::error::GatewayResult;

/// A stateful selector over each prefix's targets.
///
/// Implementations keep their own interior locking: `select_target`
/// mutates rotation state, `set_health_info` flips health flags, and the
/// two serialize against each other.
pub trait BalancerPolicy: Send + Sync {
    /// Choose one healthy target url for the given prefix, advancing the
    /// rotation. Returns `PrefixNotFound` for unconfigured prefixes and
    /// `NoHealthyTargets` when every target for the prefix is down.
    fn select_target(&self, prefix: &str) -> GatewayResult<String>;

    /// Apply a probe result. Urls absent from the mapping are treated as
    /// healthy, matching the initial state of all targets.
    fn set_health_info(&self, healthy: &HashMap<String, bool>);
}
