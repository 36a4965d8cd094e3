// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, endpoint paths and default
//! values used by the session core. Configuration is loaded from the
//! environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `COACH_API_URL` | Backend base URL | `http://localhost:8000` |
//! | `COACH_DATA_DIR` | Directory holding the persisted credential slot | `./.coach` |
//! | `COACH_EXPIRY_BUFFER_MS` | Safety margin before local expiry fires | `5000` |
//! | `COACH_FAILURE_COOLDOWN_MS` | Duplicate-failure suppression window | `3000` |
//! | `COACH_REQUEST_TIMEOUT_SECS` | HTTP request timeout | `15` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,coach_session=debug` |

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

/// Environment variable name for the backend base URL.
pub const API_URL_ENV: &str = "COACH_API_URL";

/// Environment variable name for the data directory.
///
/// The persisted credential slot lives under this directory.
pub const DATA_DIR_ENV: &str = "COACH_DATA_DIR";

/// Environment variable name for the expiry buffer in milliseconds.
pub const EXPIRY_BUFFER_ENV: &str = "COACH_EXPIRY_BUFFER_MS";

/// Environment variable name for the failure suppression cool-down in milliseconds.
pub const FAILURE_COOLDOWN_ENV: &str = "COACH_FAILURE_COOLDOWN_MS";

/// Environment variable name for the HTTP request timeout in seconds.
pub const REQUEST_TIMEOUT_ENV: &str = "COACH_REQUEST_TIMEOUT_SECS";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_DATA_DIR: &str = "./.coach";
pub const DEFAULT_EXPIRY_BUFFER: Duration = Duration::from_millis(5000);
pub const DEFAULT_FAILURE_COOLDOWN: Duration = Duration::from_millis(3000);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Login endpoint. Never carries a bearer credential.
pub const LOGIN_PATH: &str = "/user/login";

/// Current-user profile endpoint.
pub const PROFILE_PATH: &str = "/user/me";

/// Logout endpoint (best-effort).
pub const LOGOUT_PATH: &str = "/user/logout";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("invalid API base URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Client configuration shared by the transport and session components.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    api_base_url: Url,
    data_dir: PathBuf,
    expiry_buffer: Duration,
    failure_cooldown: Duration,
    request_timeout: Duration,
    log_format: LogFormat,
}

impl ClientConfig {
    /// Create a configuration for the given backend with default tuning.
    pub fn new(api_base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_base_url(api_base_url)?,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            expiry_buffer: DEFAULT_EXPIRY_BUFFER,
            failure_cooldown: DEFAULT_FAILURE_COOLDOWN,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            log_format: LogFormat::default(),
        })
    }

    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = env_or_default(API_URL_ENV, DEFAULT_API_URL);
        let mut config = Self::new(&api_url)?;

        config.data_dir = PathBuf::from(env_or_default(DATA_DIR_ENV, DEFAULT_DATA_DIR));
        config.expiry_buffer = env_millis(EXPIRY_BUFFER_ENV, DEFAULT_EXPIRY_BUFFER)?;
        config.failure_cooldown = env_millis(FAILURE_COOLDOWN_ENV, DEFAULT_FAILURE_COOLDOWN)?;
        config.request_timeout = match env_optional(REQUEST_TIMEOUT_ENV) {
            Some(raw) => Duration::from_secs(parse_u64(REQUEST_TIMEOUT_ENV, &raw)?),
            None => DEFAULT_REQUEST_TIMEOUT,
        };
        config.log_format = env_optional(LOG_FORMAT_ENV)
            .map(|raw| LogFormat::parse(&raw))
            .unwrap_or_default();

        Ok(config)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_expiry_buffer(mut self, buffer: Duration) -> Self {
        self.expiry_buffer = buffer;
        self
    }

    pub fn with_failure_cooldown(mut self, cooldown: Duration) -> Self {
        self.failure_cooldown = cooldown;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn expiry_buffer(&self) -> Duration {
        self.expiry_buffer
    }

    pub fn failure_cooldown(&self) -> Duration {
        self.failure_cooldown
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Absolute URL for an endpoint path such as [`PROFILE_PATH`].
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.api_base_url.as_str().trim_end_matches('/'),
            path
        )
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

fn env_millis(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match env_optional(name) {
        Some(raw) => Ok(Duration::from_millis(parse_u64(name, &raw)?)),
        None => Ok(default),
    }
}

fn parse_u64(name: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
