//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the bridge engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Storage connection descriptor(s).
    pub storage: StorageConfig,

    /// Mail transport settings.
    pub mailer: MailerConfig,

    /// Rate-limit cache backend connection.
    pub redis: RedisConfig,

    /// Health reporting and registry sweep timers.
    pub health: HealthConfig,

    /// Global rate limits applied to routes without their own.
    pub rate_limit: RateLimitConfig,

    /// Authentication settings.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to bind (0 picks an ephemeral port).
    pub port: u16,

    /// Host advertised in the API specification document.
    pub public_host: Option<String>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,

    /// How long shutdown waits for in-flight connections to drain.
    pub drain_timeout_secs: u64,
}

impl ServerConfig {
    /// `host:port` string used for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6382,
            public_host: None,
            max_connections: 10_000,
            max_body_size: 2 * 1024 * 1024,
            drain_timeout_secs: 10,
        }
    }
}

/// One storage host.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageDescriptor {
    pub host: String,
    pub port: u16,
    /// Database name.
    pub name: String,
    pub user: Option<String>,
    pub pass: Option<String>,
    /// Enable TLS for the whole connection.
    pub ssl: bool,
    /// Shard-routing endpoint; when present on any descriptor it applies to all.
    pub mongos: Option<String>,
}

impl Default for StorageDescriptor {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 27017,
            name: "__storj-bridge-development".to_string(),
            user: None,
            pass: None,
            ssl: false,
            mongos: None,
        }
    }
}

/// Storage configuration: a single host or a replica-style list.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StorageConfig {
    Single(StorageDescriptor),
    Cluster(Vec<StorageDescriptor>),
}

impl StorageConfig {
    /// All descriptors in declaration order.
    pub fn descriptors(&self) -> &[StorageDescriptor] {
        match self {
            StorageConfig::Single(descriptor) => std::slice::from_ref(descriptor),
            StorageConfig::Cluster(descriptors) => descriptors,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Single(StorageDescriptor::default())
    }
}

/// SMTP mail transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MailerConfig {
    pub host: String,
    pub port: u16,
    /// Use implicit TLS.
    pub secure: bool,
    pub user: Option<String>,
    pub pass: Option<String>,
    /// Sender address for outgoing mail.
    pub from: String,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 465,
            secure: true,
            user: None,
            pass: None,
            from: "robot@storj.io".to_string(),
        }
    }
}

/// Rate-limit cache backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
        }
    }
}

/// Background timer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Interval between health reports in seconds.
    pub report_interval_secs: u64,

    /// Interval between response registry sweeps in seconds.
    pub sweep_interval_secs: u64,

    /// Timeout for backend link connection attempts in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 30,
            sweep_interval_secs: 30,
            connect_timeout_secs: 5,
        }
    }
}

/// Global rate-limit defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub total: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            total: 1000,
            window_secs: 60,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Accepted bearer keys.
    pub api_keys: Vec<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_storage_table() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [storage]
            host = "db.local"
            port = 27018
            name = "bridge"
            "#,
        )
        .unwrap();

        let descriptors = config.storage.descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].host, "db.local");
        assert_eq!(descriptors[0].port, 27018);
    }

    #[test]
    fn parses_storage_array() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [[storage]]
            host = "a.local"
            name = "bridge"

            [[storage]]
            host = "b.local"
            name = "bridge"
            ssl = true
            "#,
        )
        .unwrap();

        let descriptors = config.storage.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[1].host, "b.local");
        assert!(descriptors[1].ssl);
        assert_eq!(descriptors[0].port, 27017);
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 6382);
        assert_eq!(config.health.report_interval_secs, 30);
        assert_eq!(config.rate_limit.total, 1000);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }
}
