use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub transport: TransportSettings,
    #[serde(default)]
    pub rating: RatingSettings,
    #[serde(default)]
    pub broadcast: BroadcastSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// When unset the service runs on the in-memory store.
    pub url: Option<String>,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub cache_size: Option<u64>,
    pub cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportSettings {
    pub webhook_url: String,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatingSettings {
    #[serde(default = "default_auto_ban_dislikes")]
    pub auto_ban_dislikes: i64,
    #[serde(default = "default_auto_ban_min_rating")]
    pub auto_ban_min_rating: f64,
}

impl Default for RatingSettings {
    fn default() -> Self {
        Self {
            auto_ban_dislikes: default_auto_ban_dislikes(),
            auto_ban_min_rating: default_auto_ban_min_rating(),
        }
    }
}

fn default_auto_ban_dislikes() -> i64 { 30 }
fn default_auto_ban_min_rating() -> f64 { 50.0 }

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastSettings {
    /// Pause between consecutive recipient sends, to stay under gateway
    /// rate limits.
    #[serde(default = "default_broadcast_delay_ms")]
    pub delay_ms: u64,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self { delay_ms: default_broadcast_delay_ms() }
    }
}

fn default_broadcast_delay_ms() -> u64 { 50 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with PAIRLINE_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            // Add default config file
            .add_source(File::with_name("config/default").required(false))
            // Add local config file (for development overrides)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with PAIRLINE_)
            // e.g., PAIRLINE_SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("PAIRLINE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = apply_env_overrides(settings)?;

        settings.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("PAIRLINE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

/// Apply the conventional environment overrides.
///
/// `DATABASE_URL` wins over anything in the files, matching what deployment
/// platforms inject.
fn apply_env_overrides(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let database_url = env::var("DATABASE_URL")
        .or_else(|_| env::var("PAIRLINE_DATABASE__URL"))
        .ok();
    let webhook_url = env::var("PAIRLINE_TRANSPORT__WEBHOOK_URL").ok();

    let mut builder = Config::builder().add_source(settings);

    if let Some(url) = database_url {
        builder = builder.set_override("database.url", url)?;
    }
    if let Some(url) = webhook_url {
        builder = builder.set_override("transport.webhook_url", url)?;
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rating_thresholds() {
        let rating = RatingSettings::default();
        assert_eq!(rating.auto_ban_dislikes, 30);
        assert_eq!(rating.auto_ban_min_rating, 50.0);
    }

    #[test]
    fn test_default_broadcast_delay() {
        let broadcast = BroadcastSettings::default();
        assert_eq!(broadcast.delay_ms, 50);
    }

    #[test]
    fn test_default_logging() {
        let level = default_log_level();
        let format = default_log_format();
        assert_eq!(level, "info");
        assert_eq!(format, "json");
    }
}
