//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::str::FromStr;

use chrono::Duration;
use santri_core::ScanPolicy;
use tracing::Level;

// Upper bounds for the numeric settings. Larger values overflow chrono
// durations.
const MAX_LATE_THRESHOLD_MINUTES: i64 = 24 * 60;
const MAX_SESSION_TTL_DAYS: i64 = 3650;
const MAX_LIST_LIMIT_CEILING: u32 = 1000;
const MAX_PROGRESS_WEEKS_CEILING: u32 = 520;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub cors_origin: String,
    pub late_threshold_minutes: i64,
    pub allow_duplicate_scans: bool,
    pub session_ttl_days: i64,
    pub admin_emails: Vec<String>,
    pub default_list_limit: u32,
    pub max_list_limit: u32,
    pub max_progress_weeks: u32,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000".parse::<SocketAddr>().ok())?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Domain Settings ---
        let late_threshold_minutes = in_range(
            "LATE_THRESHOLD_MINUTES",
            parse_or(&lookup, "LATE_THRESHOLD_MINUTES", Some(15i64))?,
            0..=MAX_LATE_THRESHOLD_MINUTES,
        )?;
        let allow_duplicate_scans = parse_or(&lookup, "ALLOW_DUPLICATE_SCANS", Some(true))?;
        let session_ttl_days = in_range(
            "SESSION_TTL_DAYS",
            parse_or(&lookup, "SESSION_TTL_DAYS", Some(30i64))?,
            1..=MAX_SESSION_TTL_DAYS,
        )?;

        let admin_emails = lookup("ADMIN_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(|e| e.trim().to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let default_list_limit = parse_or(&lookup, "DEFAULT_LIST_LIMIT", Some(50u32))?;
        let max_list_limit = in_range(
            "MAX_LIST_LIMIT",
            parse_or(&lookup, "MAX_LIST_LIMIT", Some(200u32))?,
            1..=MAX_LIST_LIMIT_CEILING,
        )?;
        let max_progress_weeks = in_range(
            "MAX_PROGRESS_WEEKS",
            parse_or(&lookup, "MAX_PROGRESS_WEEKS", Some(52u32))?,
            1..=MAX_PROGRESS_WEEKS_CEILING,
        )?;
        if default_list_limit == 0 || default_list_limit > max_list_limit {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_LIST_LIMIT".to_string(),
                format!("must be between 1 and MAX_LIST_LIMIT ({})", max_list_limit),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            cors_origin,
            late_threshold_minutes,
            allow_duplicate_scans,
            session_ttl_days,
            admin_emails,
            default_list_limit,
            max_list_limit,
            max_progress_weeks,
        })
    }

    pub fn scan_policy(&self) -> ScanPolicy {
        ScanPolicy {
            late_after: Duration::minutes(self.late_threshold_minutes),
            allow_duplicate_scans: self.allow_duplicate_scans,
        }
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: Option<T>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => default.ok_or_else(|| ConfigError::MissingVar(key.to_string())),
    }
}

fn in_range<T>(key: &str, value: T, range: RangeInclusive<T>) -> Result<T, ConfigError>
where
    T: PartialOrd + std::fmt::Display,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue(
            key.to_string(),
            format!(
                "{} is outside {}..={}",
                value,
                range.start(),
                range.end()
            ),
        ))
    }
}
