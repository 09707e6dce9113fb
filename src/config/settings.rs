//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Object storage configuration (reference photos, outputs, manifests, archives)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub base_path: String,
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
}

fn default_storage_path() -> String {
    "./data/bucket".to_string()
}

fn default_url_prefix() -> String {
    "http://localhost:8080/assets".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            url_prefix: default_url_prefix(),
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    /// JSON snapshot written after every mutation. Without it records live
    /// only as long as the process.
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

/// External image provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-3-pro-image-preview".to_string()
}

fn default_timeout() -> u64 {
    180_000
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_keys: vec![],
            timeout_ms: default_timeout(),
        }
    }
}

/// Outbound call throttling and rate-limit backoff
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThrottleConfig {
    #[serde(default = "default_min_interval")]
    pub min_interval_ms: u64,
    #[serde(default = "default_rate_limit_retries")]
    pub rate_limit_retries: u32,
    #[serde(default = "default_rate_limit_base")]
    pub rate_limit_base_ms: u64,
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max_ms: u64,
}

fn default_min_interval() -> u64 {
    4000
}

fn default_rate_limit_retries() -> u32 {
    3
}

fn default_rate_limit_base() -> u64 {
    8000
}

fn default_rate_limit_max() -> u64 {
    60_000
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval(),
            rate_limit_retries: default_rate_limit_retries(),
            rate_limit_base_ms: default_rate_limit_base(),
            rate_limit_max_ms: default_rate_limit_max(),
        }
    }
}

/// Orchestration defaults and pacing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentConfig {
    #[serde(default = "default_sets_per_day")]
    pub sets_per_day: u32,
    #[serde(default = "default_slides_per_set")]
    pub slides_per_set: u32,
    /// Retries after the first attempt of a slide.
    #[serde(default = "default_slide_retries")]
    pub slide_retries: u32,
    #[serde(default = "default_retry_base")]
    pub retry_base_ms: u64,
    /// Slides generated side by side inside one set.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_slide_delay")]
    pub slide_delay_ms: u64,
    #[serde(default = "default_set_cooldown")]
    pub set_cooldown_ms: u64,
    #[serde(default = "default_freshness_days")]
    pub freshness_days: u32,
}

fn default_sets_per_day() -> u32 {
    1
}

fn default_slides_per_set() -> u32 {
    6
}

fn default_slide_retries() -> u32 {
    2
}

fn default_retry_base() -> u64 {
    3000
}

fn default_concurrency() -> usize {
    1
}

fn default_slide_delay() -> u64 {
    2000
}

fn default_set_cooldown() -> u64 {
    5000
}

fn default_freshness_days() -> u32 {
    7
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            sets_per_day: default_sets_per_day(),
            slides_per_set: default_slides_per_set(),
            slide_retries: default_slide_retries(),
            retry_base_ms: default_retry_base(),
            concurrency: default_concurrency(),
            slide_delay_ms: default_slide_delay(),
            set_cooldown_ms: default_set_cooldown(),
            freshness_days: default_freshness_days(),
        }
    }
}

impl AgentConfig {
    pub fn slide_delay(&self) -> Duration {
        Duration::from_millis(self.slide_delay_ms)
    }

    pub fn set_cooldown(&self) -> Duration {
        Duration::from_millis(self.set_cooldown_ms)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}

/// Cron tick loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,
}

fn default_tick_interval() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tick_interval_secs: default_tick_interval(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables (prefixed with STYLESET__)
            .add_source(
                Environment::with_prefix("STYLESET")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("provider.api_keys")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        if self.agent.slides_per_set == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "agent.slides_per_set must be at least 1".to_string(),
            )));
        }

        if self.agent.concurrency == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "agent.concurrency must be at least 1".to_string(),
            )));
        }

        if self.provider.api_keys.iter().all(|k| k.trim().is_empty()) {
            tracing::warn!("No provider API keys configured; every generation will fail");
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
            store: StoreConfig::default(),
            provider: ProviderConfig::default(),
            throttle: ThrottleConfig::default(),
            agent: AgentConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}
