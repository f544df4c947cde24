// config.rs
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// When unset the service runs on the in-memory ledger store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub port: u16,
    pub response_window_minutes: i64,
    pub wallet_internal_technicians: bool,
    pub deadline_sweep_secs: u64,
    pub db_max_connections: u32,
}

fn optional(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        let jwt_secret = optional("JWT_SECRET_KEY").ok_or(ConfigError::Missing("JWT_SECRET_KEY"))?;

        let config = Config {
            database_url: optional("DATABASE_URL"),
            jwt_secret,
            port: parsed("PORT", 8000)?,
            response_window_minutes: parsed("RESPONSE_WINDOW_MINUTES", 30)?,
            wallet_internal_technicians: parsed("WALLET_INTERNAL_TECHNICIANS", false)?,
            deadline_sweep_secs: parsed("DEADLINE_SWEEP_SECS", 300)?,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", 10)?,
        };

        if config.response_window_minutes <= 0 {
            return Err(ConfigError::Invalid {
                name: "RESPONSE_WINDOW_MINUTES",
                value: config.response_window_minutes.to_string(),
            });
        }

        Ok(config)
    }
}
