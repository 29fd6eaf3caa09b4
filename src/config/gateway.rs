use serde::{Deserialize, Serialize};

/// A routed group binding a URL prefix to a pool of upstream targets
/// and a per-prefix middleware selection. Immutable after load.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Gateway {
    /// Routing key; must start with `/`
    pub prefix: String,
    /// Upstream pool, at least one entry
    #[serde(default)]
    pub targets: Vec<Target>,
    /// Require a valid bearer token
    #[serde(default)]
    pub auth: bool,
    /// Cache responses by request path
    #[serde(default)]
    pub cache: bool,
    /// Apply the global rate limit
    #[serde(default)]
    pub rate: bool,
}

/// An upstream endpoint. Immutable after load.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Target {
    /// Absolute URL; the target's stable identity
    pub url: String,
    /// Relative selection weight for the weighted policy
    pub weight: Option<i32>,
    /// Probe path appended to the url; empty means the target root
    #[serde(default)]
    pub health_endpoint: String,
}

impl Gateway {
    /// Validate gateway configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.prefix.is_empty() {
            return Err(anyhow::anyhow!("gateway prefix cannot be empty"));
        }

        if !self.prefix.starts_with('/') {
            return Err(anyhow::anyhow!(
                "gateway prefix must start with '/': {}",
                self.prefix
            ));
        }

        if self.targets.is_empty() {
            return Err(anyhow::anyhow!(
                "gateway {} must have at least one target",
                self.prefix
            ));
        }

        for target in &self.targets {
            target.validate()?;
        }

        Ok(())
    }
}

impl Target {
    /// Validate target configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.url.is_empty() {
            return Err(anyhow::anyhow!("target url cannot be empty"));
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "target url must be a valid HTTP/HTTPS URL: {}",
                self.url
            ));
        }

        Ok(())
    }

    /// Selection weight, defaulted to 1 when missing or non-positive
    pub fn effective_weight(&self) -> u32 {
        match self.weight {
            Some(w) if w >= 1 => w as u32,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_validation() {
        let gateway = Gateway {
            prefix: "/api".to_string(),
            targets: vec![Target {
                url: "http://127.0.0.1:3001".to_string(),
                weight: Some(2),
                health_endpoint: "/health".to_string(),
            }],
            ..Default::default()
        };
        assert!(gateway.validate().is_ok());

        let no_slash = Gateway {
            prefix: "api".to_string(),
            targets: gateway.targets.clone(),
            ..Default::default()
        };
        assert!(no_slash.validate().is_err());

        let empty_prefix = Gateway {
            prefix: String::new(),
            targets: gateway.targets.clone(),
            ..Default::default()
        };
        assert!(empty_prefix.validate().is_err());

        let no_targets = Gateway {
            prefix: "/api".to_string(),
            targets: vec![],
            ..Default::default()
        };
        assert!(no_targets.validate().is_err());
    }

    #[test]
    fn test_target_validation() {
        let target = Target {
            url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(target.validate().is_err());

        let target = Target {
            url: "https://example.com".to_string(),
            ..Default::default()
        };
        assert!(target.validate().is_ok());
    }

    #[test]
    fn test_effective_weight_defaults() {
        let mut target = Target {
            url: "http://a".to_string(),
            weight: None,
            health_endpoint: String::new(),
        };
        assert_eq!(target.effective_weight(), 1);

        target.weight = Some(0);
        assert_eq!(target.effective_weight(), 1);

        target.weight = Some(-3);
        assert_eq!(target.effective_weight(), 1);

        target.weight = Some(5);
        assert_eq!(target.effective_weight(), 5);
    }
}
