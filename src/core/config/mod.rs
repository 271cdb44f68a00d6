use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::core::error::EngineError;
use crate::core::types::ErrorCategory;

/// Main cadence configuration loaded from cadence.toml.
///
/// Nothing here carries a secret: the API token is looked up at startup from
/// the environment variable named in `[server]`, and the database URL comes
/// from the file or `CADENCE_DATABASE_URL`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CadenceConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the API listener
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Name of the environment variable holding the bearer token
    #[serde(default = "default_auth_token_env")]
    pub auth_token_env: String,

    /// Request body cap in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Default page size for log listings
    #[serde(default = "default_log_list_limit")]
    pub log_list_limit: i64,
}

/// Rule execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Per-run wall clock budget; an expired run is still logged as an error
    #[serde(default = "default_run_timeout_seconds")]
    pub run_timeout_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter, overridable via RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Mirror logs into a daily-rotated file under this directory
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_database_url() -> String {
    "sqlite://cadence.db".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8474".to_string()
}

fn default_auth_token_env() -> String {
    "CADENCE_API_TOKEN".to_string()
}

fn default_max_body_bytes() -> usize {
    256 * 1024
}

fn default_log_list_limit() -> i64 {
    20
}

fn default_run_timeout_seconds() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            url: default_database_url(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: default_bind(),
            auth_token_env: default_auth_token_env(),
            max_body_bytes: default_max_body_bytes(),
            log_list_limit: default_log_list_limit(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            run_timeout_seconds: default_run_timeout_seconds(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

impl CadenceConfig {
    /// Load with deterministic precedence: defaults, then the config file
    /// (when present), then `CADENCE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, EngineError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = PathBuf::from("cadence.toml");
                if fallback.exists() {
                    Self::from_file(&fallback)?
                } else {
                    CadenceConfig::default()
                }
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            EngineError::new(
                ErrorCategory::ConfigurationError,
                format!("failed to read config {}: {}", path.display(), err),
            )
        })?;
        toml::from_str(&contents).map_err(|err| {
            EngineError::new(
                ErrorCategory::ConfigurationError,
                format!("failed to parse config {}: {}", path.display(), err),
            )
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("CADENCE_DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database.url = url;
            }
        }
        if let Ok(bind) = env::var("CADENCE_BIND") {
            if !bind.trim().is_empty() {
                self.server.bind = bind;
            }
        }
        if let Ok(level) = env::var("CADENCE_LOG_LEVEL") {
            if !level.trim().is_empty() {
                self.logging.level = level;
            }
        }
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.execution.run_timeout_seconds == 0 {
            return Err(EngineError::new(
                ErrorCategory::ConfigurationError,
                "execution.run_timeout_seconds must be greater than zero",
            ));
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, EngineError> {
        self.server.bind.parse().map_err(|err| {
            EngineError::new(
                ErrorCategory::ConfigurationError,
                format!("invalid bind address {}: {}", self.server.bind, err),
            )
        })
    }

    /// Resolve the API bearer token from the configured environment variable.
    pub fn auth_token(&self) -> Result<String, EngineError> {
        let token = env::var(&self.server.auth_token_env).map_err(|_| {
            EngineError::new(
                ErrorCategory::ConfigurationError,
                format!(
                    "auth token environment variable {} is not set",
                    self.server.auth_token_env
                ),
            )
        })?;
        if token.trim().is_empty() {
            return Err(EngineError::new(
                ErrorCategory::ConfigurationError,
                format!(
                    "auth token environment variable {} is empty",
                    self.server.auth_token_env
                ),
            ));
        }
        Ok(token)
    }
}
