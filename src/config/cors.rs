use serde::{Deserialize, Serialize};

pub const DEFAULT_CORS_MAX_AGE: u32 = 86400;

const ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS", "HEAD"];

/// CORS settings. The core validates this block; the outer listener applies it.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CorsConfig {
    #[serde(default, rename = "use")]
    pub enabled: bool,
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default)]
    pub allow_methods: Vec<String>,
    #[serde(default)]
    pub allow_headers: Vec<String>,
    #[serde(default)]
    pub max_age: u32,
}

impl CorsConfig {
    pub fn apply_defaults(&mut self) {
        if self.max_age == 0 {
            self.max_age = DEFAULT_CORS_MAX_AGE;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_age > DEFAULT_CORS_MAX_AGE {
            return Err(anyhow::anyhow!(
                "cors.max_age must not exceed {}",
                DEFAULT_CORS_MAX_AGE
            ));
        }

        for method in &self.allow_methods {
            if !ALLOWED_METHODS.contains(&method.as_str()) {
                return Err(anyhow::anyhow!("invalid cors.allow_methods entry: {}", method));
            }
        }

        for origin in &self.allow_origins {
            if origin.is_empty() {
                return Err(anyhow::anyhow!("cors.allow_origins entries cannot be empty"));
            }
        }

        Ok(())
    }
}
