//! Configuration loading and validation.
//!
//! Config is JSON5, located at `~/.notegate/notegate.json` unless
//! `NOTEGATE_STATE_DIR` points elsewhere. Deployment environment variables
//! (`PORT`, `REDIS_URL`, `ARMY_ACCESS_KEY`, ...) override file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::secrets::ApiKey;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Daily request budget.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Counter store connection.
    #[serde(default)]
    pub store: StoreConfig,

    /// Upstream generative-AI service.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Global settings.
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl Config {
    /// Load configuration from the default location and apply env overrides.
    ///
    /// A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read, parsed or validated.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let config = if path.exists() {
            Self::load(&path)?
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Self::default()
        };
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("notegate.json")
    }

    /// Get the notegate state directory.
    ///
    /// Uses `NOTEGATE_STATE_DIR` env var if set, otherwise `~/.notegate`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("NOTEGATE_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".notegate")
        } else {
            PathBuf::from(".notegate")
        }
    }

    /// Apply overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Blank values are ignored; unparseable numbers are logged and ignored.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            match port.trim().parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value: {port}"),
            }
        }
        if let Some(url) = get("REDIS_URL") {
            self.store.url = Some(url);
        }
        if let Some(key) = get("ARMY_ACCESS_KEY") {
            self.upstream.access_key = Some(key);
        }
        if let Some(url) = get("NOTEGATE_UPSTREAM_URL") {
            self.upstream.base_url = url;
        }
        if let Some(limit) = get("NOTEGATE_CLIENT_DAILY_LIMIT") {
            match limit.trim().parse() {
                Ok(limit) => self.limits.client_daily = limit,
                Err(_) => tracing::warn!("Ignoring invalid NOTEGATE_CLIENT_DAILY_LIMIT: {limit}"),
            }
        }
        if let Some(limit) = get("NOTEGATE_GLOBAL_DAILY_LIMIT") {
            match limit.trim().parse() {
                Ok(limit) => self.limits.global_daily = limit,
                Err(_) => tracing::warn!("Ignoring invalid NOTEGATE_GLOBAL_DAILY_LIMIT: {limit}"),
            }
        }

        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation(
                "Gateway port cannot be 0".to_string(),
            ));
        }
        if self.limits.client_daily <= 0 {
            return Err(ConfigError::Validation(
                "Client daily limit must be positive".to_string(),
            ));
        }
        if self.limits.global_daily <= 0 {
            return Err(ConfigError::Validation(
                "Global daily limit must be positive".to_string(),
            ));
        }
        if self.limits.ttl_hours == 0 {
            return Err(ConfigError::Validation(
                "Counter TTL cannot be 0".to_string(),
            ));
        }
        if self.limits.ttl_hours > MAX_TTL_HOURS {
            return Err(ConfigError::Validation(format!(
                "Counter TTL cannot exceed {MAX_TTL_HOURS} hours"
            )));
        }
        if self.store.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "Store timeout cannot be 0".to_string(),
            ));
        }
        if self.upstream.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Upstream base URL cannot be empty".to_string(),
            ));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "Upstream timeout cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Redis URL, required outside of in-memory mode.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` when no URL is configured.
    pub fn require_store_url(&self) -> Result<&str, ConfigError> {
        self.store
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField("REDIS_URL".to_string()))
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address mode.
    #[serde(default)]
    pub mode: BindMode,

    /// Maximum accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            mode: BindMode::default(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl GatewayConfig {
    /// Resolved bind address for this mode.
    #[must_use]
    pub fn bind_address(&self) -> String {
        match &self.mode {
            BindMode::Local => "127.0.0.1".to_string(),
            BindMode::Public => "0.0.0.0".to_string(),
            BindMode::Custom(addr) => addr.clone(),
        }
    }
}

const fn default_port() -> u16 {
    8080
}

const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Gateway bind mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Bind to localhost only.
    Local,
    /// Bind to all interfaces.
    #[default]
    Public,
    /// Custom bind address.
    Custom(String),
}

/// What happens when the post-success counter commit fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Log the failure and still return the upstream result.
    #[default]
    FailOpen,
    /// Turn the response into an internal error.
    FailClosed,
}

/// Daily request budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsConfig {
    /// Maximum successful requests per client per day.
    #[serde(default = "default_client_daily")]
    pub client_daily: i64,

    /// Maximum successful requests across all clients per day.
    #[serde(default = "default_global_daily")]
    pub global_daily: i64,

    /// Counter lifetime after the latest increment, in hours.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    /// Prefix for counter keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Behaviour when the counter commit fails.
    #[serde(default)]
    pub commit_policy: CommitPolicy,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            client_daily: default_client_daily(),
            global_daily: default_global_daily(),
            ttl_hours: default_ttl_hours(),
            key_prefix: default_key_prefix(),
            commit_policy: CommitPolicy::default(),
        }
    }
}

impl LimitsConfig {
    /// Counter TTL as Duration.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_hours.saturating_mul(3600))
    }
}

/// Longest accepted counter TTL (one year).
pub const MAX_TTL_HOURS: u64 = 365 * 24;

const fn default_client_daily() -> i64 {
    5
}

const fn default_global_daily() -> i64 {
    50
}

const fn default_ttl_hours() -> u64 {
    24
}

fn default_key_prefix() -> String {
    "ratelimit".to_string()
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Redis connection URL.
    #[serde(default)]
    pub url: Option<String>,

    /// Deadline for a single store operation, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: default_store_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Store deadline as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

const fn default_store_timeout_ms() -> u64 {
    5_000
}

/// Upstream service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamConfig {
    /// Base URL; requests go to `<base_url>/generate`.
    #[serde(default = "default_upstream_url")]
    pub base_url: String,

    /// Access key sent in the `Authorization` header (prefer `ARMY_ACCESS_KEY`).
    #[serde(default)]
    pub access_key: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            access_key: None,
            timeout_secs: default_upstream_timeout(),
        }
    }
}

impl UpstreamConfig {
    /// Access key wrapped for safe handling, if configured.
    #[must_use]
    pub fn api_key(&self) -> Option<ApiKey> {
        ApiKey::from_optional(self.access_key.as_deref())
    }

    /// Request timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_upstream_url() -> String {
    "https://gemini-army.vercel.app".to_string()
}

const fn default_upstream_timeout() -> u64 {
    60
}

/// Global settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Log format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.limits.client_daily, 5);
        assert_eq!(config.limits.global_daily, 50);
        assert_eq!(config.limits.ttl(), Duration::from_secs(24 * 3600));
        assert_eq!(config.upstream.timeout(), Duration::from_secs(60));
        assert_eq!(config.limits.commit_policy, CommitPolicy::FailOpen);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("notegate.json");

        let mut config = Config::default();
        config.limits.client_daily = 10;
        config.limits.commit_policy = CommitPolicy::FailClosed;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.limits.client_daily, 10);
        assert_eq!(loaded.limits.commit_policy, CommitPolicy::FailClosed);
    }

    #[test]
    fn test_json5_parsing() {
        let json5_content = r#"{
            // Local development
            gateway: {
                port: 9090,
                mode: "local",
            },
            limits: {
                clientDaily: 3,
                commitPolicy: "fail_closed",
            },
            upstream: {
                baseUrl: "http://localhost:4000",
            },
        }"#;

        let config: Config = json5::from_str(json5_content).unwrap();
        assert_eq!(config.gateway.port, 9090);
        assert_eq!(config.gateway.bind_address(), "127.0.0.1");
        assert_eq!(config.limits.client_daily, 3);
        assert_eq!(config.limits.global_daily, 50);
        assert_eq!(config.limits.commit_policy, CommitPolicy::FailClosed);
        assert_eq!(config.upstream.base_url, "http://localhost:4000");
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.gateway.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.limits.global_daily = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.upstream.base_url = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_store_timeout_rejected() {
        let mut config = Config::default();
        config.store.timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Store timeout"));
    }

    #[test]
    fn test_ttl_bounds() {
        let mut config = Config::default();
        config.limits.ttl_hours = MAX_TTL_HOURS;
        assert!(config.validate().is_ok());

        config.limits.ttl_hours = MAX_TTL_HOURS + 1;
        assert!(config.validate().is_err());

        config.limits.ttl_hours = u64::MAX;
        assert!(config.validate().is_err());
        assert_eq!(config.limits.ttl(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PORT", "3000"),
            ("REDIS_URL", "redis://cache:6379"),
            ("ARMY_ACCESS_KEY", "secret"),
            ("NOTEGATE_CLIENT_DAILY_LIMIT", "7"),
            ("NOTEGATE_GLOBAL_DAILY_LIMIT", "not-a-number"),
        ]);

        let config = Config::default()
            .with_overrides_from(|name| vars.get(name).map(ToString::to_string));

        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.require_store_url().unwrap(), "redis://cache:6379");
        assert_eq!(config.upstream.api_key().unwrap().expose(), "secret");
        assert_eq!(config.limits.client_daily, 7);
        assert_eq!(config.limits.global_daily, 50);
    }

    #[test]
    fn test_blank_env_values_ignored() {
        let config = Config::default().with_overrides_from(|name| {
            (name == "ARMY_ACCESS_KEY").then(|| "  ".to_string())
        });
        assert!(config.upstream.api_key().is_none());
    }

    #[test]
    fn test_missing_store_url() {
        let config = Config::default();
        assert!(matches!(
            config.require_store_url(),
            Err(ConfigError::MissingField(_))
        ));
    }
}
