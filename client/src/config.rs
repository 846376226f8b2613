//! Configuration module for the Brewdoro client.
//!
//! This module handles parsing configuration from environment variables.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `BREWDORO_API_URL` | No | `http://localhost:8080/api/v1` | Task/session API base URL |
//! | `BREWDORO_USER_ID` | No | `123` | User owning tasks and sessions |
//! | `BREWDORO_FOCUS_MINUTES` | No | 25 | Focus length requested for new sessions (1-240) |
//! | `BREWDORO_BREAK_MINUTES` | No | 5 | Break length requested for new sessions (1-120) |
//! | `BREWDORO_REQUEST_TIMEOUT_SECS` | No | 30 | HTTP request timeout |
//! | `BREWDORO_AUTO_CHAIN` | No | true | Start the next Pomodoro when a break ends |
//! | `BREWDORO_LOG_DIR` | No | `~/.brewdoro` | Directory for the TUI log file |
//!
//! # Example
//!
//! ```no_run
//! use brewdoro_client::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("API URL: {}", config.api_url);
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use thiserror::Error;

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";

/// Default user identifier.
pub const DEFAULT_USER_ID: &str = "123";

/// Default focus length in minutes.
pub const DEFAULT_FOCUS_MINUTES: u32 = 25;

/// Default break length in minutes.
pub const DEFAULT_BREAK_MINUTES: u32 = 5;

/// Default HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default log directory name relative to home.
const DEFAULT_LOG_DIR: &str = ".brewdoro";

/// Upper bound for the focus length.
const MAX_FOCUS_MINUTES: u32 = 240;

/// Upper bound for the break length.
const MAX_BREAK_MINUTES: u32 = 120;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,
}

/// Configuration for the Brewdoro client.
#[derive(Debug, Clone)]
pub struct Config {
    /// API base URL without a trailing slash.
    pub api_url: String,

    /// User owning the tasks and sessions.
    pub user_id: String,

    /// Focus length requested when a session is created.
    pub focus_minutes: u32,

    /// Break length requested when a session is created. Also used for
    /// local breaks when no remote session exists.
    pub break_minutes: u32,

    /// Timeout applied to every HTTP request.
    pub request_timeout: Duration,

    /// Whether the next Pomodoro starts automatically after a break.
    pub auto_chain: bool,

    /// Directory receiving `brewdoro.log` while the TUI owns the terminal.
    pub log_dir: PathBuf,
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - a numeric variable cannot be parsed or is out of range
    /// - `BREWDORO_AUTO_CHAIN` is not a boolean
    /// - `BREWDORO_LOG_DIR` is unset and the home directory cannot be determined
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = env::var("BREWDORO_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        if api_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "BREWDORO_API_URL".to_string(),
                message: "URL cannot be empty".to_string(),
            });
        }

        let user_id =
            env::var("BREWDORO_USER_ID").unwrap_or_else(|_| DEFAULT_USER_ID.to_string());

        let focus_minutes =
            parse_minutes("BREWDORO_FOCUS_MINUTES", DEFAULT_FOCUS_MINUTES, MAX_FOCUS_MINUTES)?;
        let break_minutes =
            parse_minutes("BREWDORO_BREAK_MINUTES", DEFAULT_BREAK_MINUTES, MAX_BREAK_MINUTES)?;

        let request_timeout_secs = match env::var("BREWDORO_REQUEST_TIMEOUT_SECS") {
            Ok(val) => {
                let secs = val.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                    key: "BREWDORO_REQUEST_TIMEOUT_SECS".to_string(),
                    message: format!("expected positive integer, got '{val}'"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "BREWDORO_REQUEST_TIMEOUT_SECS".to_string(),
                        message: "timeout must be at least 1 second".to_string(),
                    });
                }
                secs
            }
            Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let auto_chain = match env::var("BREWDORO_AUTO_CHAIN") {
            Ok(val) => parse_bool(&val).ok_or_else(|| ConfigError::InvalidValue {
                key: "BREWDORO_AUTO_CHAIN".to_string(),
                message: format!("expected true or false, got '{val}'"),
            })?,
            Err(_) => true,
        };

        let log_dir = match env::var("BREWDORO_LOG_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
                base_dirs.home_dir().join(DEFAULT_LOG_DIR)
            }
        };

        Ok(Self {
            api_url,
            user_id,
            focus_minutes,
            break_minutes,
            request_timeout: Duration::from_secs(request_timeout_secs),
            auto_chain,
            log_dir,
        })
    }
}

/// Parses a minutes variable bounded to `1..=max`.
fn parse_minutes(key: &str, default: u32, max: u32) -> Result<u32, ConfigError> {
    let Ok(val) = env::var(key) else {
        return Ok(default);
    };

    let minutes = val.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected positive integer, got '{val}'"),
    })?;
    if !(1..=max).contains(&minutes) {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("minutes must be between 1 and {max}, got {minutes}"),
        });
    }
    Ok(minutes)
}

fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
