use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bot_webhook_url: String,
    pub source_base_url: String,
    pub request_timeout_secs: u64,
    pub delay_between_requests: f64,
    pub delay_between_pages: f64,
    pub requests_per_minute: usize,
    pub requests_per_hour: usize,
    pub default_monitoring_interval_hours: u32,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            database_url: get_env("DATABASE_URL")?,
            bot_webhook_url: get_env("BOT_WEBHOOK_URL")?,
            source_base_url: get_env_or("SOURCE_BASE_URL", "https://gsz.gov.by"),
            request_timeout_secs: get_env_parse_or("REQUEST_TIMEOUT_SECS", 30)?,
            delay_between_requests: get_env_parse_or("PARSER_DELAY_BETWEEN_REQUESTS", 2.0)?,
            delay_between_pages: get_env_parse_or("PARSER_DELAY_BETWEEN_PAGES", 3.0)?,
            requests_per_minute: get_env_parse_or("PARSER_REQUESTS_PER_MINUTE", 20)?,
            requests_per_hour: get_env_parse_or("PARSER_REQUESTS_PER_HOUR", 500)?,
            default_monitoring_interval_hours: get_env_parse_or(
                "DEFAULT_MONITORING_INTERVAL_HOURS",
                3,
            )?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
