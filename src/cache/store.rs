use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{watch, Mutex};
use tokio::time::interval;
use tracing::debug;

use crate::error::{GatewayError, GatewayResult};

/// A cached value with an absolute expiry. An expiry of 0 means the
/// entry never expires.
#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at_nanos: u128,
}

impl Entry {
    fn is_expired(&self, now_nanos: u128) -> bool {
        self.expires_at_nanos > 0 && now_nanos > self.expires_at_nanos
    }
}

/// In-memory key→bytes store with per-entry TTL and a periodic sweep.
///
/// One exclusive guard covers the whole map; every operation and the
/// sweep take it. Expired entries are removed lazily on read and eagerly
/// by the sweep task, which runs until `stop` is called.
pub struct TtlStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    default_ttl: Duration,
    stop_tx: watch::Sender<bool>,
}

impl TtlStore {
    /// Create a store and spawn its sweep task.
    pub fn new(default_ttl: Duration, sweep_interval: Duration) -> Self {
        let entries = Arc::new(Mutex::new(HashMap::new()));
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let sweep_entries = Arc::clone(&entries);
        tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            // The first tick completes immediately; a sweep of an empty
            // map is harmless.
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep(&sweep_entries).await;
                    }
                    _ = stop_rx.changed() => {
                        debug!("cache sweep task stopping");
                        break;
                    }
                }
            }
        });

        Self {
            entries,
            default_ttl,
            stop_tx,
        }
    }

    /// Record `value` under `key`, replacing any prior entry. The entry
    /// expires `default_ttl` from now, or never when the TTL is zero.
    pub async fn set(&self, key: &str, value: Vec<u8>) -> GatewayResult<()> {
        if key.is_empty() || value.is_empty() {
            return Err(GatewayError::invalid_input("cache key/value is invalid"));
        }

        let expires_at_nanos = if self.default_ttl > Duration::ZERO {
            now_nanos() + self.default_ttl.as_nanos()
        } else {
            0
        };

        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at_nanos,
            },
        );
        Ok(())
    }

    /// Fetch a live entry. Expired entries are deleted and reported as
    /// a miss.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().await;

        match entries.get(key) {
            None => None,
            Some(entry) if entry.is_expired(now_nanos()) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
        }
    }

    /// Remove an entry; returns whether anything was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        entries.remove(key).is_some()
    }

    /// Terminate the sweep task.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

async fn sweep(entries: &Mutex<HashMap<String, Entry>>) {
    let now = now_nanos();
    let mut entries = entries.lock().await;
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    let removed = before - entries.len();
    if removed > 0 {
        debug!(removed, "cache sweep removed expired entries");
    }
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}
