//! Configuration loading and validation.
//!
//! The gateway is configured from a TOML file. Loading goes through four
//! stages: parse, defaults, environment overrides, validation. Selected
//! fields can be overridden with `GATEWAY_*` environment variables so
//! deployments can retarget a packaged config without editing it.

pub mod cors;
pub mod gateway;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub use cors::CorsConfig;
pub use gateway::{Gateway, Target};

pub const DEFAULT_ADDR: &str = ":8080";
pub const DEFAULT_PROTO: &str = "http";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HC_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_BALANCER: &str = "wrr";
pub const DEFAULT_RATE_LIMIT_MAX_REQUEST: u32 = 100;

/// Balancer names accepted by the validator. Only `wrr` and `rr` are
/// implemented; the rest fail at load-balancer construction.
const KNOWN_BALANCERS: &[&str] = &["wrr", "rr", "roundrobin", "leastconn", "iphash"];

const KNOWN_PROTOS: &[&str] = &["http", "http3"];

/// Gateway main configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Listen address, `:port` or `host:port`
    #[serde(default)]
    pub addr: String,
    /// Listener protocol: `http` or `http3`
    #[serde(default)]
    pub proto: String,
    /// Upstream request timeout in seconds
    #[serde(default)]
    pub request_timeout_secs: u64,
    /// Health-check period in seconds
    #[serde(default)]
    pub hc_timeout_secs: u64,
    /// Balancing policy name
    #[serde(default)]
    pub balancer: String,
    /// TLS certificate pair, required when `proto = "https"`
    pub tls: Option<TlsConfig>,
    /// Shared secret for the auth middleware
    pub auth: Option<AuthConfig>,
    /// Global rate limiting settings
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
    /// CORS settings, validated here and applied by the outer listener
    pub cors: Option<CorsConfig>,
    /// Routed gateway groups
    #[serde(default)]
    pub gateways: Vec<Gateway>,
}

/// TLS certificate configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct TlsConfig {
    #[serde(default)]
    pub cert: String,
    #[serde(default)]
    pub key: String,
}

/// Auth middleware configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AuthConfig {
    /// HS-family shared secret used to verify bearer tokens
    #[serde(default)]
    pub key: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitingConfig {
    /// Token bucket burst capacity; the refill cadence is fixed
    #[serde(default)]
    pub max_request: u32,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            max_request: DEFAULT_RATE_LIMIT_MAX_REQUEST,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, apply defaults and `GATEWAY_*`
    /// environment overrides, then validate.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;

        let mut config: Config = toml::from_str(&content)?;

        config.apply_defaults();
        config.apply_env_overrides()?;
        config.validate()?;

        info!("configuration loaded from {:?}", path.as_ref());
        Ok(config)
    }

    /// Apply default values where fields were omitted
    pub fn apply_defaults(&mut self) {
        if self.addr.is_empty() {
            self.addr = DEFAULT_ADDR.to_string();
        }
        if self.proto.is_empty() {
            self.proto = DEFAULT_PROTO.to_string();
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
        }
        if self.hc_timeout_secs == 0 {
            self.hc_timeout_secs = DEFAULT_HC_TIMEOUT_SECS;
        }
        if self.balancer.is_empty() {
            self.balancer = DEFAULT_BALANCER.to_string();
        }
        if self.rate_limiting.max_request == 0 {
            self.rate_limiting.max_request = DEFAULT_RATE_LIMIT_MAX_REQUEST;
        }
        if let Some(cors) = &mut self.cors {
            cors.apply_defaults();
        }
    }

    /// Apply `GATEWAY_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("GATEWAY_ADDR") {
            self.addr = addr;
        }
        if let Ok(proto) = std::env::var("GATEWAY_PROTO") {
            self.proto = proto;
        }
        if let Ok(balancer) = std::env::var("GATEWAY_BALANCER") {
            self.balancer = balancer;
        }
        if let Ok(timeout) = std::env::var("GATEWAY_REQ_TIMEOUT") {
            self.request_timeout_secs = timeout.parse().map_err(|e| {
                anyhow::anyhow!("invalid GATEWAY_REQ_TIMEOUT {:?}: {}", timeout, e)
            })?;
        }
        if let Ok(timeout) = std::env::var("GATEWAY_HC_TIMEOUT") {
            self.hc_timeout_secs = timeout
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid GATEWAY_HC_TIMEOUT {:?}: {}", timeout, e))?;
        }
        Ok(())
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        if !KNOWN_PROTOS.contains(&self.proto.as_str()) {
            return Err(anyhow::anyhow!(
                "proto must be one of {:?}, got {:?}",
                KNOWN_PROTOS,
                self.proto
            ));
        }

        if self.request_timeout_secs < 1 {
            return Err(anyhow::anyhow!("request_timeout_secs must be at least 1"));
        }

        if self.hc_timeout_secs < 1 {
            return Err(anyhow::anyhow!("hc_timeout_secs must be at least 1"));
        }

        if !KNOWN_BALANCERS.contains(&self.balancer.as_str()) {
            return Err(anyhow::anyhow!(
                "balancer must be one of {:?}, got {:?}",
                KNOWN_BALANCERS,
                self.balancer
            ));
        }

        if self.rate_limiting.max_request < 1 {
            return Err(anyhow::anyhow!(
                "rate_limiting.max_request must be at least 1"
            ));
        }

        if self.proto == "https" {
            match &self.tls {
                Some(tls) if !tls.cert.is_empty() && !tls.key.is_empty() => {}
                _ => {
                    return Err(anyhow::anyhow!(
                        "tls.cert and tls.key are required for https"
                    ))
                }
            }
        }

        if let Some(cors) = &self.cors {
            cors.validate()?;
        }

        for gateway in &self.gateways {
            gateway.validate()?;

            if gateway.auth && self.auth.as_ref().map_or(true, |a| a.key.is_empty()) {
                return Err(anyhow::anyhow!(
                    "auth.key is required when auth=true in gateway {}",
                    gateway.prefix
                ));
            }
        }

        Ok(())
    }

    /// Upstream request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Health-check period as a Duration
    pub fn hc_timeout(&self) -> Duration {
        Duration::from_secs(self.hc_timeout_secs)
    }

    /// Resolve the listen address, accepting the `:port` shorthand
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr = if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        };
        addr.parse()
            .map_err(|e| anyhow::anyhow!("invalid listen address {:?}: {}", self.addr, e))
    }
}
