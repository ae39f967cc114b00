use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub monitor: MonitorConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Maximum records per batch run.
    pub batch_limit: usize,
    /// Pause between records in a batch, milliseconds.
    pub item_delay_ms: u64,
    /// Soft time budget for one batch run, seconds. 0 disables the deadline.
    pub batch_deadline_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Cron expression with a seconds field, e.g. "0 */30 * * * *".
    pub cron: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "CARDWATCH"
            .add_source(Environment::with_prefix("CARDWATCH").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Message("Database url must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "Database max_connections must be greater than 0".into(),
            ));
        }

        if self.monitor.batch_limit == 0 {
            return Err(ConfigError::Message(
                "Monitor batch_limit must be greater than 0".into(),
            ));
        }

        if !is_valid_cron(&self.scheduler.cron) {
            return Err(ConfigError::Message(
                "Invalid cron expression in scheduler.cron".into(),
            ));
        }

        Ok(())
    }
}

// Basic cron validation. The scheduler takes expressions with a seconds
// field, so 6 parts (or 7 with a year) are expected.
fn is_valid_cron(cron_expr: &str) -> bool {
    let parts: Vec<&str> = cron_expr.split_whitespace().collect();
    if !(6..=7).contains(&parts.len()) {
        return false;
    }

    for part in parts {
        if part.is_empty() {
            return false;
        }
        // Allow numbers, ranges, lists, wildcards and the "any" marker
        if !part
            .chars()
            .all(|c| c.is_ascii_digit() || c == '*' || c == '-' || c == ',' || c == '/' || c == '?')
        {
            return false;
        }
    }

    true
}
