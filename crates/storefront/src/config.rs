//! Configuration loading and validation

use anyhow::{Context, Result, bail};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use storefront_auth::{AuthConfig, CookieSettings, HasherConfig, SigningAlgorithm};
use tracing::{info, warn};

/// Secret shipped in the default configuration; never fit for production
pub const DEFAULT_JWT_SECRET: &str = "change-me-in-production";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Externally visible base URL, used in verification links
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub cookies: CookieConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Admin account created on first start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<BootstrapConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// sqlx connection URL, creating the file if missing
    pub fn url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// Token and password hashing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default)]
    pub jwt_algorithm: SigningAlgorithm,
    #[serde(default = "default_access_token_minutes")]
    pub access_token_minutes: i64,
    #[serde(default = "default_refresh_token_minutes")]
    pub refresh_token_minutes: i64,
    /// Argon2 memory cost in KiB
    #[serde(default = "default_hash_memory_kib")]
    pub hash_memory_kib: u32,
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
    #[serde(default = "default_hash_parallelism")]
    pub hash_parallelism: u32,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            jwt_algorithm: SigningAlgorithm::default(),
            access_token_minutes: default_access_token_minutes(),
            refresh_token_minutes: default_refresh_token_minutes(),
            hash_memory_kib: default_hash_memory_kib(),
            hash_iterations: default_hash_iterations(),
            hash_parallelism: default_hash_parallelism(),
        }
    }
}

/// Browser session cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    #[serde(default = "default_access_cookie")]
    pub access_name: String,
    #[serde(default = "default_refresh_cookie")]
    pub refresh_name: String,
    /// Only send cookies over HTTPS
    #[serde(default)]
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            access_name: default_access_cookie(),
            refresh_name: default_refresh_cookie(),
            secure: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Prometheus exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub admin_email: String,
    pub admin_password: String,
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "./data/storefront.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_jwt_secret() -> String {
    DEFAULT_JWT_SECRET.to_string()
}

fn default_access_token_minutes() -> i64 {
    storefront_auth::config::DEFAULT_ACCESS_TTL_MINUTES
}

fn default_refresh_token_minutes() -> i64 {
    storefront_auth::config::DEFAULT_REFRESH_TTL_MINUTES
}

fn default_hash_memory_kib() -> u32 {
    HasherConfig::default().memory_kib
}

fn default_hash_iterations() -> u32 {
    HasherConfig::default().iterations
}

fn default_hash_parallelism() -> u32 {
    HasherConfig::default().parallelism
}

fn default_access_cookie() -> String {
    "token".to_string()
}

fn default_refresh_cookie() -> String {
    "refresh_token".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.trim().is_empty() {
            bail!("auth.jwt_secret must not be empty");
        }
        if self.auth.access_token_minutes <= 0 {
            bail!("auth.access_token_minutes must be positive");
        }
        if self.auth.refresh_token_minutes <= 0 {
            bail!("auth.refresh_token_minutes must be positive");
        }
        if self.cookies.access_name == self.cookies.refresh_name {
            bail!("cookies.access_name and cookies.refresh_name must differ");
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            bail!("logging.format must be \"pretty\" or \"json\"");
        }
        if self.auth.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("Using the default JWT secret; set auth.jwt_secret or STOREFRONT_JWT_SECRET");
        }
        Ok(())
    }

    /// Settings for the auth service
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            secret: self.auth.jwt_secret.clone(),
            algorithm: self.auth.jwt_algorithm,
            access_ttl: Duration::minutes(self.auth.access_token_minutes),
            refresh_ttl: Duration::minutes(self.auth.refresh_token_minutes),
            hasher: HasherConfig {
                memory_kib: self.auth.hash_memory_kib,
                iterations: self.auth.hash_iterations,
                parallelism: self.auth.hash_parallelism,
            },
        }
    }

    pub fn cookie_settings(&self) -> CookieSettings {
        CookieSettings {
            access_name: self.cookies.access_name.clone(),
            refresh_name: self.cookies.refresh_name.clone(),
            secure: self.cookies.secure,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            public_url: default_public_url(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthSection::default(),
            cookies: CookieConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
            bootstrap: None,
        }
    }
}
