//! Configuration file loading and management.
//!
//! Loads configuration from:
//! - Linux: `~/.config/reip/config.toml`
//! - macOS: `~/Library/Application Support/io.reip.reip/config.toml`
//! - Windows: `%APPDATA%/reip/reip/config/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `REIP_CONFIG`: Override config file path
//! - `REIP_SECRETS`: Override secrets file path
//! - `REIP_TIMEOUT`: Request timeout in seconds

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::cli::args::Cli;
use crate::core::retry::RetryPolicy;
use crate::error::{PortalError, Result};

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable to override config file path.
pub const ENV_CONFIG: &str = "REIP_CONFIG";
/// Environment variable to override secrets file path.
pub const ENV_SECRETS: &str = "REIP_SECRETS";
/// Environment variable for timeout in seconds.
pub const ENV_TIMEOUT: &str = "REIP_TIMEOUT";

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// File-backed settings with env overrides applied.
    pub config: Config,
    /// Config file that was read (it may not exist).
    pub config_path: PathBuf,
    /// Secrets document to load credentials from.
    pub secrets_path: PathBuf,
    /// Source of each setting for debugging.
    pub sources: ConfigSources,
}

/// Tracks the source of each configuration value.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub config_path: ConfigSource,
    pub secrets_path: ConfigSource,
    pub timeout: ConfigSource,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl ResolvedConfig {
    /// Resolve final configuration from CLI args, environment variables, and config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but is invalid, or if any
    /// resolved value is out of bounds.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        Self::resolve_with(cli.config.as_deref(), cli.secrets.as_deref())
    }

    /// Resolve with explicit flag values instead of a parsed [`Cli`].
    pub fn resolve_with(config_flag: Option<&Path>, secrets_flag: Option<&Path>) -> Result<Self> {
        let paths = AppPaths::new();
        let mut sources = ConfigSources::default();

        let config_path = Self::resolve_path(
            config_flag,
            ENV_CONFIG,
            paths.config_file(),
            &mut sources.config_path,
        );
        let secrets_path = Self::resolve_path(
            secrets_flag,
            ENV_SECRETS,
            paths.secrets_file(),
            &mut sources.secrets_path,
        );

        let mut config = Config::load_from(&config_path)?;
        sources.timeout = if config_path.exists() {
            ConfigSource::ConfigFile
        } else {
            ConfigSource::Default
        };
        if let Some(timeout) = Self::env_timeout()? {
            config.http.timeout_seconds = timeout;
            sources.timeout = ConfigSource::Env;
        }
        config.validate()?;

        tracing::debug!(
            config = %config_path.display(),
            config_source = %sources.config_path,
            secrets = %secrets_path.display(),
            secrets_source = %sources.secrets_path,
            "Resolved configuration"
        );

        Ok(Self {
            config,
            config_path,
            secrets_path,
            sources,
        })
    }

    fn resolve_path(
        flag: Option<&Path>,
        env_var: &str,
        default: PathBuf,
        source: &mut ConfigSource,
    ) -> PathBuf {
        // 1. CLI flag
        if let Some(path) = flag {
            *source = ConfigSource::Cli;
            return path.to_path_buf();
        }

        // 2. Environment variable
        if let Ok(value) = std::env::var(env_var)
            && !value.trim().is_empty()
        {
            *source = ConfigSource::Env;
            return PathBuf::from(value);
        }

        // 3. Default
        *source = ConfigSource::Default;
        default
    }

    fn env_timeout() -> Result<Option<u64>> {
        match std::env::var(ENV_TIMEOUT) {
            Ok(value) => value.trim().parse::<u64>().map(Some).map_err(|_| {
                PortalError::Config(format!(
                    "{ENV_TIMEOUT} must be a whole number of seconds, got \"{value}\""
                ))
            }),
            Err(_) => Ok(None),
        }
    }
}

// =============================================================================
// File-backed configuration
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Outbound HTTP behaviour.
    pub http: HttpConfig,
    /// Response cache settings.
    pub cache: CacheConfig,
    /// Identity login settings.
    pub auth: AuthConfig,
    /// Usage quota settings.
    pub usage: UsageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Attempts per call, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubled for each later one.
    pub base_delay_ms: u64,
    /// Upper bound on a single backoff.
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a property lookup stays fresh.
    pub property_ttl_seconds: u64,
    /// Mirror cached responses to disk so they survive restarts.
    pub persist: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    /// Token lifetime assumed when the login token carries no `exp` claim.
    pub token_ttl_seconds: u64,
    /// Tokens are refreshed this long before they expire.
    pub refresh_skew_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UsageConfig {
    /// Property lookups allowed per calendar month.
    pub monthly_limit: u32,
    /// Longest a facade waits for its usage row to be written.
    pub record_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 8000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            property_ttl_seconds: 7200,
            persist: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_seconds: 3600,
            refresh_skew_seconds: 60,
        }
    }
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            monthly_limit: 30,
            record_timeout_ms: 2000,
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn property_ttl(&self) -> Duration {
        Duration::from_secs(self.property_ttl_seconds)
    }
}

impl UsageConfig {
    #[must_use]
    pub const fn record_timeout(&self) -> Duration {
        Duration::from_millis(self.record_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns error only if the file exists but is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PortalError::ConfigParse {
            path: path.display().to_string(),
            message: e.message().to_string(),
        })
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let http = &self.http;
        if http.timeout_seconds == 0 || http.timeout_seconds > 300 {
            return Err(PortalError::Config(
                "http.timeout_seconds must be between 1 and 300".to_string(),
            ));
        }
        if http.max_attempts == 0 || http.max_attempts > 10 {
            return Err(PortalError::Config(
                "http.max_attempts must be between 1 and 10".to_string(),
            ));
        }
        if http.base_delay_ms > http.max_delay_ms {
            return Err(PortalError::Config(
                "http.base_delay_ms must not exceed http.max_delay_ms".to_string(),
            ));
        }
        if http.max_delay_ms > 60_000 {
            return Err(PortalError::Config(
                "http.max_delay_ms must be at most 60000".to_string(),
            ));
        }

        if self.cache.property_ttl_seconds == 0 || self.cache.property_ttl_seconds > 7 * 86_400 {
            return Err(PortalError::Config(
                "cache.property_ttl_seconds must be between 1 and 604800".to_string(),
            ));
        }

        if self.auth.token_ttl_seconds < 60 {
            return Err(PortalError::Config(
                "auth.token_ttl_seconds must be at least 60".to_string(),
            ));
        }
        if self.auth.refresh_skew_seconds >= self.auth.token_ttl_seconds {
            return Err(PortalError::Config(
                "auth.refresh_skew_seconds must be smaller than auth.token_ttl_seconds"
                    .to_string(),
            ));
        }

        if self.usage.monthly_limit == 0 {
            return Err(PortalError::Config(
                "usage.monthly_limit must be at least 1".to_string(),
            ));
        }
        if self.usage.record_timeout_ms == 0 || self.usage.record_timeout_ms > 30_000 {
            return Err(PortalError::Config(
                "usage.record_timeout_ms must be between 1 and 30000".to_string(),
            ));
        }

        Ok(())
    }
}
