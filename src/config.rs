//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. A `.env` file in the working directory is read first if present.
//! Only `ANTHROPIC_API_KEY` has no default.
//!
//! # Rate Limiting
//!
//! - `GENERATE_RATE_PER_MINUTE` / `GENERATE_RATE_BURST`: Strict quota for recipe generation (default: 5 / 2)
//! - `API_RATE_PER_MINUTE` / `API_RATE_BURST`: Loose quota for the recipe API (default: 100 / 10)
//! - `RATE_LIMIT_MAX_CLIENTS`: Clients tracked per registry before eviction (default: 10000)
//! - `RATE_LIMIT_IDLE_SECS`: Idle time before a client's bucket may be dropped (default: 600)
//! - `RATE_LIMIT_SWEEP_INTERVAL_SECS`: Background idle sweep period (default: 60)
//!
//! # Security Configuration
//!
//! - `ALLOWED_ORIGINS`: Comma-separated CORS allow-list, `*` allows any origin
//! - `TRUSTED_PROXIES`: Comma-separated CIDR ranges whose forwarding headers are believed

use std::env;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::limiter::{RateLimitError, RateQuota, RegistryBounds};
use crate::services::AnthropicSettings;

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8000)
    pub port: u16,

    /// Deployment environment (default: "development")
    /// "production" switches logs to JSON
    pub app_env: String,

    /// Maximum request body size in bytes (default: 1MB)
    pub max_request_body_size: usize,

    // =========================================================================
    // Generation API Configuration
    // =========================================================================
    /// Anthropic API key (required)
    pub anthropic_api_key: String,

    /// Model used for generation (default: "claude-3-haiku-20240307")
    pub claude_model: String,

    /// Messages API endpoint
    pub anthropic_api_url: String,

    /// Upper bound for one generation call (default: 30 seconds)
    pub generation_timeout: Duration,

    // =========================================================================
    // Rate Limiting Configuration
    // =========================================================================
    /// Generation requests per minute per client (default: 5)
    pub generate_rate_per_minute: u32,

    /// Generation burst capacity (default: 2)
    pub generate_rate_burst: u32,

    /// API requests per minute per client (default: 100)
    pub api_rate_per_minute: u32,

    /// API burst capacity (default: 10)
    pub api_rate_burst: u32,

    /// Clients tracked per registry (default: 10000)
    pub rate_limit_max_clients: usize,

    /// Idle time after which a client's bucket may be dropped (default: 600 seconds)
    pub rate_limit_idle_ttl: Duration,

    /// Period of the background idle sweep (default: 60 seconds)
    pub rate_limit_sweep_interval: Duration,

    // =========================================================================
    // Security Configuration
    // =========================================================================
    /// Allowed CORS origins
    /// Default: `http://localhost:3000,http://localhost:8000`
    pub allowed_origins: Vec<String>,

    /// Trusted proxy CIDR ranges.
    /// X-Forwarded-For / X-Real-IP are only used when the connection
    /// comes from one of these networks.
    ///
    /// Format: Comma-separated CIDR notation (e.g., "10.0.0.0/8,172.16.0.0/12")
    /// Default: Empty (forwarding headers ignored)
    pub trusted_proxies: Vec<String>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log filter (e.g., "info", "debug", "recipe_gateway=trace")
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a value does not parse or fails
    /// [`validate`](Self::validate).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 8000)?,
            app_env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 1024 * 1024)?,

            // Generation API
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            claude_model: env::var("CLAUDE_MODEL")
                .unwrap_or_else(|_| "claude-3-haiku-20240307".to_string()),
            anthropic_api_url: env::var("ANTHROPIC_API_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string()),
            generation_timeout: Duration::from_secs(Self::parse_env(
                "GENERATION_TIMEOUT_SECS",
                30,
            )?),

            // Rate limiting
            generate_rate_per_minute: Self::parse_env("GENERATE_RATE_PER_MINUTE", 5)?,
            generate_rate_burst: Self::parse_env("GENERATE_RATE_BURST", 2)?,
            api_rate_per_minute: Self::parse_env("API_RATE_PER_MINUTE", 100)?,
            api_rate_burst: Self::parse_env("API_RATE_BURST", 10)?,
            rate_limit_max_clients: Self::parse_env("RATE_LIMIT_MAX_CLIENTS", 10_000)?,
            rate_limit_idle_ttl: Duration::from_secs(Self::parse_env("RATE_LIMIT_IDLE_SECS", 600)?),
            rate_limit_sweep_interval: Duration::from_secs(Self::parse_env(
                "RATE_LIMIT_SWEEP_INTERVAL_SECS",
                60,
            )?),

            // Security
            allowed_origins: Self::parse_list("ALLOWED_ORIGINS")
                .unwrap_or_else(Self::default_origins),
            trusted_proxies: Self::parse_list("TRUSTED_PROXIES").unwrap_or_default(),

            // Observability
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    pub fn validate(&self) -> AppResult<()> {
        if self.anthropic_api_key.trim().is_empty() {
            return Err(AppError::ConfigError(
                "ANTHROPIC_API_KEY environment variable is required".to_string(),
            ));
        }

        if self.generate_rate_per_minute == 0 {
            return Err(AppError::ConfigError(
                "GENERATE_RATE_PER_MINUTE must be greater than 0".to_string(),
            ));
        }

        if self.api_rate_per_minute == 0 {
            return Err(AppError::ConfigError(
                "API_RATE_PER_MINUTE must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit_max_clients == 0 {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_MAX_CLIENTS must be greater than 0".to_string(),
            ));
        }

        if self.rate_limit_sweep_interval.is_zero() {
            return Err(AppError::ConfigError(
                "RATE_LIMIT_SWEEP_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }

        // Validate max request body size is reasonable
        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether this is a production deployment.
    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    /// Quota of the strict generation registry.
    pub fn generation_quota(&self) -> Result<RateQuota, RateLimitError> {
        RateQuota::per_minute(self.generate_rate_per_minute, self.generate_rate_burst)
    }

    /// Quota of the loose API registry.
    pub fn api_quota(&self) -> Result<RateQuota, RateLimitError> {
        RateQuota::per_minute(self.api_rate_per_minute, self.api_rate_burst)
    }

    /// Size and idle limits shared by both registries.
    pub fn registry_bounds(&self) -> RegistryBounds {
        RegistryBounds {
            max_clients: self.rate_limit_max_clients,
            idle_ttl: self.rate_limit_idle_ttl,
        }
    }

    /// Settings for the generation client.
    pub fn anthropic_settings(&self) -> AnthropicSettings {
        AnthropicSettings {
            api_url: self.anthropic_api_url.clone(),
            api_key: self.anthropic_api_key.clone(),
            model: self.claude_model.clone(),
            timeout: self.generation_timeout,
        }
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }

    /// Parse a comma-separated list, `None` if the variable is unset or empty.
    fn parse_list(name: &str) -> Option<Vec<String>> {
        env::var(name).ok().filter(|s| !s.trim().is_empty()).map(|s| {
            s.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
    }

    fn default_origins() -> Vec<String> {
        vec![
            "http://localhost:3000".to_string(),
            "http://localhost:8000".to_string(),
        ]
    }
}

/// Default configuration for testing and development.
///
/// The API key is empty, so this does not pass [`Config::validate`] as is.
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 8000,
            app_env: "development".to_string(),
            max_request_body_size: 1024 * 1024, // 1MB
            // Generation API
            anthropic_api_key: String::new(),
            claude_model: "claude-3-haiku-20240307".to_string(),
            anthropic_api_url: "https://api.anthropic.com/v1/messages".to_string(),
            generation_timeout: Duration::from_secs(30),
            // Rate limiting
            generate_rate_per_minute: 5,
            generate_rate_burst: 2,
            api_rate_per_minute: 100,
            api_rate_burst: 10,
            rate_limit_max_clients: 10_000,
            rate_limit_idle_ttl: Duration::from_secs(600),
            rate_limit_sweep_interval: Duration::from_secs(60),
            // Security
            allowed_origins: Self::default_origins(),
            trusted_proxies: vec![],
            // Observability
            log_level: "info".to_string(),
        }
    }
}
