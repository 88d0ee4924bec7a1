//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Admin HTTP surface (host, port)
    pub server: ServerSettings,

    /// PostgreSQL; without a URL the in-memory backend is used
    pub database: DatabaseSettings,

    /// Redis push transport; without a URL pushes are only logged
    #[serde(default)]
    pub redis: RedisSettings,

    /// Outbox processor tuning
    pub outbox: OutboxSettings,

    /// Snowflake ID generator settings
    pub snowflake: SnowflakeSettings,

    /// "pretty" or "json"
    pub log_format: String,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    #[serde(default)]
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,
}

/// Redis configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisSettings {
    #[serde(default)]
    pub url: Option<String>,
}

/// Outbox processor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutboxSettings {
    /// Delay between polls in seconds
    pub polling_interval_seconds: u64,

    /// Maximum rows attempted per poll
    pub batch_size: usize,

    /// Attempts before a message is failed for good
    pub max_retry_count: i32,

    /// Whether undecodable payloads are retried like handler failures
    pub retry_malformed_payloads: bool,
}

impl Default for OutboxSettings {
    fn default() -> Self {
        Self {
            polling_interval_seconds: 5,
            batch_size: 50,
            max_retry_count: 3,
            retry_malformed_payloads: true,
        }
    }
}

impl OutboxSettings {
    /// Reject values that would stall or spin the processor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling_interval_seconds < 1 {
            return Err(ConfigError::Message(
                "outbox.polling_interval_seconds must be at least 1".into(),
            ));
        }
        if self.batch_size < 1 {
            return Err(ConfigError::Message("outbox.batch_size must be at least 1".into()));
        }
        if self.max_retry_count < 1 {
            return Err(ConfigError::Message(
                "outbox.max_retry_count must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Snowflake ID generator configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SnowflakeSettings {
    /// Machine ID (0-31)
    pub machine_id: u64,

    /// Node ID (0-31)
    pub node_id: u64,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. Built-in defaults
    /// 2. config/default.toml
    /// 3. config/{RUN_ENV}.toml
    /// 4. `APP__` prefixed environment variables
    /// 5. Plain overrides (`DATABASE_URL`, `OUTBOX_BATCH_SIZE`, ...)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the outbox settings are out of range.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("log_format", "pretty")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("outbox.polling_interval_seconds", 5)?
            .set_default("outbox.batch_size", 50)?
            .set_default("outbox.max_retry_count", 3)?
            .set_default("outbox.retry_malformed_payloads", true)?
            .set_default("snowflake.machine_id", 1)?
            .set_default("snowflake.node_id", 1)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__OUTBOX__BATCH_SIZE=100 -> outbox.batch_size = 100
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option(
                "outbox.polling_interval_seconds",
                std::env::var("OUTBOX_POLLING_INTERVAL_SECONDS").ok(),
            )?
            .set_override_option("outbox.batch_size", std::env::var("OUTBOX_BATCH_SIZE").ok())?
            .set_override_option(
                "outbox.max_retry_count",
                std::env::var("OUTBOX_MAX_RETRY_COUNT").ok(),
            )?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                settings.outbox.validate()?;
                Ok(settings)
            })
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn is_json_logging(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}
