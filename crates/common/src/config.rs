//! Application configuration.

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration. Broadcasts stay in-process when absent.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Lunch coordination settings.
    #[serde(default)]
    pub lunch: LunchConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis channels.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Lunch coordination settings.
///
/// Every "local" time in the system (today's date, the poll deadline, the
/// daily chat reset) is evaluated in [`LunchConfig::timezone`].
#[derive(Debug, Clone, Deserialize)]
pub struct LunchConfig {
    /// Deployment environment name (`production`, `development`, `testing`).
    #[serde(default = "default_environment")]
    pub environment: String,
    /// IANA timezone name.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Explicit override for poll deadline enforcement.
    #[serde(default)]
    pub enforce_poll_deadline: Option<bool>,
    /// Voting deadline as `HH:MM`.
    #[serde(default = "default_poll_deadline")]
    pub poll_deadline: String,
    /// Daily chat reset as `HH:MM`.
    #[serde(default = "default_chat_reset_at")]
    pub chat_reset_at: String,
    /// Maximum number of chat messages in a snapshot.
    #[serde(default = "default_chat_history_limit")]
    pub chat_history_limit: u64,
}

impl Default for LunchConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            timezone: default_timezone(),
            enforce_poll_deadline: None,
            poll_deadline: default_poll_deadline(),
            chat_reset_at: default_chat_reset_at(),
            chat_history_limit: default_chat_history_limit(),
        }
    }
}

impl LunchConfig {
    /// Whether a closed poll rejects votes.
    ///
    /// Unless overridden, only production deployments enforce the deadline.
    #[must_use]
    pub fn enforces_poll_deadline(&self) -> bool {
        self.enforce_poll_deadline
            .unwrap_or_else(|| self.environment == "production")
    }

    /// Parsed timezone.
    pub fn tz(&self) -> Result<Tz, config::ConfigError> {
        self.timezone.parse::<Tz>().map_err(|e| {
            config::ConfigError::Message(format!("invalid lunch.timezone {:?}: {e}", self.timezone))
        })
    }

    /// Parsed poll deadline.
    pub fn poll_deadline_time(&self) -> Result<NaiveTime, config::ConfigError> {
        parse_clock_time("lunch.poll_deadline", &self.poll_deadline)
    }

    /// Parsed chat reset time.
    pub fn chat_reset_time(&self) -> Result<NaiveTime, config::ConfigError> {
        parse_clock_time("lunch.chat_reset_at", &self.chat_reset_at)
    }
}

fn parse_clock_time(key: &str, value: &str) -> Result<NaiveTime, config::ConfigError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| config::ConfigError::Message(format!("invalid {key} {value:?}: {e}")))
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_redis_prefix() -> String {
    "lunchsync".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_timezone() -> String {
    "Europe/Stockholm".to_string()
}

fn default_poll_deadline() -> String {
    "11:00".to_string()
}

fn default_chat_reset_at() -> String {
    "13:15".to_string()
}

const fn default_chat_history_limit() -> u64 {
    100
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Variables from a `.env` file are exported first. Configuration is
    /// then loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `LUNCHSYNC_ENV`)
    /// 3. Environment variables with `LUNCHSYNC_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        // A missing .env is fine
        let _ = dotenvy::dotenv();

        let env = std::env::var("LUNCHSYNC_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .set_default("lunch.environment", env.clone())?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("LUNCHSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("LUNCHSYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
