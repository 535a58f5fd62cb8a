use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Enables per-IP rate limiting when present.
    pub redis: Option<RedisConfig>,
    /// Enables publishing seat events to Kafka when present.
    pub kafka: Option<KafkaConfig>,
    #[serde(default)]
    pub holds: HoldsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HoldsConfig {
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: i64,
    #[serde(default = "default_max_ttl_seconds")]
    pub max_ttl_seconds: i64,
    /// Background sweep cadence; 0 turns the sweeper off and leaves
    /// cleanup to the sweep that precedes every hold.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_ttl_seconds() -> i64 { 300 }
fn default_max_ttl_seconds() -> i64 { 3600 }
fn default_sweep_interval_seconds() -> u64 { 30 }

impl Default for HoldsConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_ttl_seconds(),
            max_ttl_seconds: default_max_ttl_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: i64,
}

fn default_requests_per_minute() -> i64 { 100 }

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests_per_minute: default_requests_per_minute() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `COACH_HOLDS__DEFAULT_TTL_SECONDS=600`
            .add_source(config::Environment::with_prefix("COACH").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_optional_sections_default() {
        let config = parse(
            r#"
            [server]
            port = 9000

            [database]
            url = "postgres://localhost/coach"
            "#,
        );

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.redis.is_none());
        assert!(config.kafka.is_none());
        assert_eq!(config.holds.default_ttl_seconds, 300);
        assert_eq!(config.holds.sweep_interval_seconds, 30);
        assert_eq!(config.rate_limit.requests_per_minute, 100);
    }

    #[test]
    fn test_hold_overrides() {
        let config = parse(
            r#"
            [server]
            port = 9000

            [database]
            url = "postgres://localhost/coach"

            [holds]
            default_ttl_seconds = 120
            sweep_interval_seconds = 0
            "#,
        );

        assert_eq!(config.holds.default_ttl_seconds, 120);
        assert_eq!(config.holds.max_ttl_seconds, 3600);
        assert_eq!(config.holds.sweep_interval_seconds, 0);
    }
}
