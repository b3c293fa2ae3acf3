//! Configuration management
//!
//! Configuration loads from a TOML file or from environment variables; the
//! env path reuses the variable names the deployment already exports
//! (`BOT_TOKEN`, `DEEPSEEK_API_KEY`, `INSTAGRAM_USERNAME`, ...). Channels
//! with no credentials configured are simply absent from the dispatch set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::generator::GeneratorConfig;
use crate::publish::channels::{InstagramConfig, TelegramConfig, TikTokConfig};
use crate::scheduler::ScheduleConfig;
use crate::utils::ReportingClock;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Quote store configuration
    pub store: StoreConfig,

    /// AI generation gateway
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Publish schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Channel adapters; unset channels are skipped at dispatch
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Reporting-zone offset from UTC in minutes (day-boundary zone)
    #[serde(default = "default_offset_minutes")]
    pub reporting_offset_minutes: i32,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Quote store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

/// Per-channel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,

    #[serde(default)]
    pub instagram: Option<InstagramConfig>,

    #[serde(default)]
    pub tiktok: Option<TikTokConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

// +03:00, where the original bot's audience lives
fn default_offset_minutes() -> i32 {
    180
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let sqlite_path = std::env::var("SAGE_SQLITE_PATH")
            .unwrap_or_else(|_| String::from("data/quotes.db"))
            .into();

        let reporting_offset_minutes = std::env::var("SAGE_UTC_OFFSET_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or_else(default_offset_minutes);

        let post_times: Vec<String> = std::env::var("SAGE_POST_TIMES")
            .map(|v| {
                v.split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let interval_minutes = std::env::var("SAGE_INTERVAL_MINUTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());
        let schedule = if post_times.is_empty() && interval_minutes.is_none() {
            ScheduleConfig::default()
        } else {
            ScheduleConfig {
                post_times,
                interval_minutes,
            }
        };

        let logging = LoggingConfig {
            level: std::env::var("SAGE_LOG_LEVEL").unwrap_or_else(|_| String::from("info")),
            format: std::env::var("SAGE_LOG_FORMAT").unwrap_or_else(|_| String::from("text")),
        };

        Ok(Self {
            store: StoreConfig { sqlite_path },
            generator: GeneratorConfig::from_env(),
            schedule,
            channels: ChannelsConfig {
                telegram: TelegramConfig::from_env(),
                instagram: InstagramConfig::from_env(),
                tiktok: Some(TikTokConfig::from_env()),
            },
            reporting_offset_minutes,
            logging,
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read config file {}: {e}", path.display()))
        })?;

        toml::from_str(&content).map_err(|e| {
            Error::config(format!(
                "failed to parse TOML config file {}: {e}",
                path.display()
            ))
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.store.sqlite_path.as_os_str().is_empty() {
            return Err(Error::config("sqlite_path must not be empty"));
        }
        self.schedule.validate()?;
        // Construction validates the offset range
        self.clock()?;
        Ok(())
    }

    /// Reporting clock configured for this deployment
    pub fn clock(&self) -> Result<ReportingClock> {
        ReportingClock::from_offset_minutes(self.reporting_offset_minutes)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                sqlite_path: PathBuf::from("data/quotes.db"),
            },
            generator: GeneratorConfig::default(),
            schedule: ScheduleConfig::default(),
            channels: ChannelsConfig::default(),
            reporting_offset_minutes: default_offset_minutes(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_offset_rejected() {
        let mut config = Config::default();
        config.reporting_offset_minutes = 24 * 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_sqlite_path_rejected() {
        let mut config = Config::default();
        config.store.sqlite_path = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let raw = r#"
            [store]
            sqlite_path = "quotes.db"

            [schedule]
            post_times = ["09:00", "21:00"]

            [channels.telegram]
            bot_token = "123:abc"
            chat_id = "@quotes"

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.schedule.post_times.len(), 2);
        assert_eq!(
            config.channels.telegram.unwrap().chat_id,
            "@quotes".to_string()
        );
        assert!(config.channels.instagram.is_none());
        // offset falls back to the deployment default
        assert_eq!(config.reporting_offset_minutes, 180);
    }
}
