//! In-memory response cache with per-entry TTL.

pub mod store;

use std::time::Duration;

pub use store::TtlStore;

/// Default lifetime of a cached response body.
pub const DEFAULT_ENTRY_TTL: Duration = Duration::from_secs(60 * 60);

/// How often the background sweep removes expired entries.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3 * 60 * 60);
