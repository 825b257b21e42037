//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and `MQL_*` environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::kairos::KairosConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub kairosdb: KairosDbConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// KairosDB backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KairosDbConfig {
    #[serde(default = "default_kairos_url")]
    pub url: String,

    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_kairos_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_read_timeout() -> u64 {
    30
}

impl Default for KairosDbConfig {
    fn default() -> Self {
        Self {
            url: default_kairos_url(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

impl KairosDbConfig {
    /// Client settings for [`crate::kairos::KairosDbClient`]
    pub fn client_config(&self) -> KairosConfig {
        KairosConfig {
            base_url: self.url.clone(),
            read_timeout_ms: self.read_timeout_secs.saturating_mul(1000),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_max_body_size() -> usize {
    64 * 1024 // 64 KB
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Statement execution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_secs: u64,
}

fn default_statement_timeout() -> u64 {
    60
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            statement_timeout_secs: default_statement_timeout(),
        }
    }
}

impl QueryConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        for path in Self::search_paths() {
            if path.exists() {
                match Self::load_with_env(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Config file locations, in lookup order
    pub fn search_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("mql").join("config.toml")),
            Some(PathBuf::from("/etc/mql/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Reject settings the binaries cannot act on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.kairosdb.url.starts_with("http://") && !self.kairosdb.url.starts_with("https://")
        {
            return Err(ConfigError::Invalid {
                field: "kairosdb.url",
                message: format!("'{}' is not an http(s) URL", self.kairosdb.url),
            });
        }
        if self.query.statement_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "query.statement_timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid {
                field: "logging.format",
                message: format!("unknown format '{}', use pretty or json", self.logging.format),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // KairosDB overrides
        if let Some(url) = lookup("MQL_KAIROSDB_URL") {
            self.kairosdb.url = url;
        }
        if let Some(secs) = lookup("MQL_KAIROSDB_READ_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse() {
                self.kairosdb.read_timeout_secs = s;
            }
        }

        // API overrides
        if let Some(host) = lookup("MQL_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("MQL_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Query overrides
        if let Some(secs) = lookup("MQL_STATEMENT_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse() {
                self.query.statement_timeout_secs = s;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("MQL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("MQL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid setting {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# MQL Configuration
#
# Environment variables override these settings:
# - MQL_KAIROSDB_URL
# - MQL_KAIROSDB_READ_TIMEOUT_SECS
# - MQL_API_HOST
# - MQL_API_PORT
# - MQL_STATEMENT_TIMEOUT_SECS
# - MQL_LOG_LEVEL
# - MQL_LOG_FORMAT

[kairosdb]
# Base URL of the KairosDB server
url = "http://localhost:8080"

# Per-request read timeout (seconds)
read_timeout_secs = 30

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8082

# Allowed CORS origins (empty allows any origin)
cors_origins = []

# Maximum request body size (bytes)
max_body_size = 65536

[query]
# Deadline for one statement execution (seconds)
statement_timeout_secs = 60

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/mql/mql.log"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config_file_parses_to_defaults() {
        let file = write_config(&generate_default_config());

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.kairosdb.url, "http://localhost:8080");
        assert_eq!(config.kairosdb.read_timeout_secs, 30);
        assert_eq!(config.api.port, 8082);
        assert_eq!(config.api.max_body_size, 65536);
        assert_eq!(config.query.statement_timeout(), Duration::from_secs(60));
        assert_eq!(config.logging.format, "pretty");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let file = write_config(
            r#"
[kairosdb]
url = "https://kairos.internal:8443"
"#,
        );

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.kairosdb.url, "https://kairos.internal:8443");
        assert_eq!(config.kairosdb.read_timeout_secs, 30);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_client_config_conversion() {
        let kairos = KairosDbConfig {
            url: "http://k:8080".to_string(),
            read_timeout_secs: 5,
        };

        let client = kairos.client_config();

        assert_eq!(client.base_url, "http://k:8080");
        assert_eq!(client.read_timeout_ms, 5_000);
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/mql/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_malformed_file() {
        let file = write_config("[api]\nport = \"not a number\"\n");

        let err = Config::load(file.path()).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let file = write_config("[logging]\nformat = \"xml\"\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "logging.format", .. }));

        let file = write_config("[kairosdb]\nurl = \"kairos:8080\"\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "kairosdb.url", .. }));

        let file = write_config("[query]\nstatement_timeout_secs = 0\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("MQL_KAIROSDB_URL", "http://remote:9090"),
            ("MQL_KAIROSDB_READ_TIMEOUT_SECS", "12"),
            ("MQL_API_PORT", "9000"),
            ("MQL_STATEMENT_TIMEOUT_SECS", "5"),
            ("MQL_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.kairosdb.url, "http://remote:9090");
        assert_eq!(config.kairosdb.read_timeout_secs, 12);
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.query.statement_timeout_secs, 5);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_unparseable_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "MQL_API_PORT").then(|| "eighty".to_string()));

        assert_eq!(config.api.port, 8082);
    }

    #[test]
    fn test_search_paths_order() {
        let paths = Config::search_paths();

        assert!(paths.ends_with(&[
            PathBuf::from("/etc/mql/config.toml"),
            PathBuf::from("./config.toml"),
        ]));
    }
}
