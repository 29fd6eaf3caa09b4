use std::fmt;
use thiserror::Error;
use tokio::time::Duration;

/// Main error type for the portico gateway
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// Configuration related errors (load, schema, validation)
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Configured balancer name is not implemented
    #[error("unknown balancer algorithm: {name}")]
    UnknownBalancer { name: String },

    /// Request prefix matches no configured gateway
    #[error("prefix not found: {prefix}")]
    PrefixNotFound { prefix: String },

    /// All targets for a matching prefix are unhealthy
    #[error("no healthy targets available")]
    NoHealthyTargets,

    /// Caller passed an invalid argument (empty cache key, empty value)
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Network related errors
    #[error("network error: {message}")]
    Network { message: String },

    /// Upstream forwarding errors
    #[error("proxy error: {message}")]
    Proxy { message: String },

    /// Timeout errors
    #[error("operation timed out after {duration:?}: {operation}")]
    Timeout {
        duration: Duration,
        operation: String,
    },

    /// Rate limiting errors
    #[error("rate limit exceeded: {message}")]
    RateLimit { message: String },

    /// IO related errors
    #[error("IO error: {message}")]
    Io { message: String },

    /// Internal errors
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an unknown-balancer error
    pub fn unknown_balancer<S: Into<String>>(name: S) -> Self {
        Self::UnknownBalancer { name: name.into() }
    }

    /// Create a prefix-not-found error
    pub fn prefix_not_found<S: Into<String>>(prefix: S) -> Self {
        Self::PrefixNotFound {
            prefix: prefix.into(),
        }
    }

    /// Create an invalid-input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a proxy error
    pub fn proxy<S: Into<String>>(message: S) -> Self {
        Self::Proxy {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(duration: Duration, operation: S) -> Self {
        Self::Timeout {
            duration,
            operation: operation.into(),
        }
    }

    /// Create a rate limit error
    pub fn rate_limit<S: Into<String>>(message: S) -> Self {
        Self::RateLimit {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error is unrecoverable at startup
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::Config { .. } | GatewayError::UnknownBalancer { .. }
        )
    }

    /// Whether this error surfaces to the client as a balancing failure
    pub fn is_balance_error(&self) -> bool {
        matches!(
            self,
            GatewayError::PrefixNotFound { .. } | GatewayError::NoHealthyTargets
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            GatewayError::Config { .. } => ErrorSeverity::Critical,
            GatewayError::UnknownBalancer { .. } => ErrorSeverity::Critical,
            GatewayError::NoHealthyTargets => ErrorSeverity::High,
            GatewayError::Network { .. } => ErrorSeverity::Medium,
            GatewayError::Timeout { .. } => ErrorSeverity::Medium,
            GatewayError::Io { .. } => ErrorSeverity::Medium,
            GatewayError::Internal { .. } => ErrorSeverity::High,
            GatewayError::PrefixNotFound { .. } => ErrorSeverity::Low,
            GatewayError::InvalidInput { .. } => ErrorSeverity::Low,
            GatewayError::Proxy { .. } => ErrorSeverity::Low,
            GatewayError::RateLimit { .. } => ErrorSeverity::Low,
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "LOW"),
            ErrorSeverity::Medium => write!(f, "MEDIUM"),
            ErrorSeverity::High => write!(f, "HIGH"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Io {
            message: err.to_string(),
        }
    }
}

impl From<hyper::Error> for GatewayError {
    fn from(err: hyper::Error) -> Self {
        if err.is_timeout() {
            GatewayError::timeout(Duration::from_secs(30), "HTTP request")
        } else if err.is_connect() {
            GatewayError::network(format!("connection error: {}", err))
        } else {
            GatewayError::network(format!("HTTP error: {}", err))
        }
    }
}

impl From<hyper::http::Error> for GatewayError {
    fn from(err: hyper::http::Error) -> Self {
        GatewayError::network(format!("HTTP error: {}", err))
    }
}

impl From<hyper::http::uri::InvalidUri> for GatewayError {
    fn from(err: hyper::http::uri::InvalidUri) -> Self {
        GatewayError::config(format!("invalid URI: {}", err))
    }
}

impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        GatewayError::config(format!("TOML parsing error: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for GatewayError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        GatewayError::timeout(Duration::from_secs(30), "operation")
    }
}
