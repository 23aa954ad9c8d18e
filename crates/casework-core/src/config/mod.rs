//! Engine configuration.
//!
//! Both remote endpoints are required; a missing or malformed value is a
//! configuration error reported to the user rather than a silent fallback.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const ENV_API_BASE_URL: &str = "CASEWORK_API_BASE_URL";
const ENV_UPLOAD_URL: &str = "CASEWORK_UPLOAD_URL";
const ENV_API_TOKEN: &str = "CASEWORK_API_TOKEN";
const ENV_SYNC_INTERVAL_SECS: &str = "CASEWORK_SYNC_INTERVAL_SECS";
const ENV_REQUEST_TIMEOUT_SECS: &str = "CASEWORK_REQUEST_TIMEOUT_SECS";

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Remote endpoints and timing used by the sync engine.
#[derive(Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Base URL of the case-management API (no trailing slash).
    pub api_base_url: String,
    /// Full URL of the binary upload endpoint.
    pub upload_url: String,
    /// Optional bearer token sent with every request.
    pub api_token: Option<String>,
    /// Interval between scheduled drains.
    pub sync_interval: Duration,
    /// Deadline applied to each network call.
    pub request_timeout: Duration,
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("EngineConfig")
            .field("api_base_url", &self.api_base_url)
            .field("upload_url", &self.upload_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("sync_interval", &self.sync_interval)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl EngineConfig {
    /// Build a configuration from explicit endpoints, using default timings.
    pub fn new(api_base_url: impl Into<String>, upload_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api_base_url: normalize_url(api_base_url.into(), ENV_API_BASE_URL)?,
            upload_url: normalize_url(upload_url.into(), ENV_UPLOAD_URL)?,
            api_token: None,
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        parse_config(|key| env::var(key).ok())
    }

    #[must_use]
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = normalize_text_option(Some(token.into()));
        self
    }

    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<EngineConfig> {
    let api_base_url = normalize_text_option(lookup(ENV_API_BASE_URL));
    let upload_url = normalize_text_option(lookup(ENV_UPLOAD_URL));

    let mut missing = Vec::new();
    if api_base_url.is_none() {
        missing.push(ENV_API_BASE_URL);
    }
    if upload_url.is_none() {
        missing.push(ENV_UPLOAD_URL);
    }
    let (Some(api_base_url), Some(upload_url)) = (api_base_url, upload_url) else {
        return Err(Error::Config(format!(
            "Remote endpoints are not configured. Missing: {}",
            missing.join(", ")
        )));
    };

    let mut config = EngineConfig::new(api_base_url, upload_url)?;
    config.api_token = normalize_text_option(lookup(ENV_API_TOKEN));
    if let Some(secs) = parse_seconds(lookup(ENV_SYNC_INTERVAL_SECS), ENV_SYNC_INTERVAL_SECS)? {
        config.sync_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = parse_seconds(lookup(ENV_REQUEST_TIMEOUT_SECS), ENV_REQUEST_TIMEOUT_SECS)?
    {
        config.request_timeout = Duration::from_secs(secs);
    }

    Ok(config)
}

fn normalize_url(raw: String, field: &str) -> Result<String> {
    let value = normalize_text_option(Some(raw))
        .ok_or_else(|| Error::Config(format!("{field} must not be empty")))?;
    if !is_http_url(&value) {
        return Err(Error::Config(format!(
            "{field} must start with http:// or https://"
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn parse_seconds(raw: Option<String>, field: &str) -> Result<Option<u64>> {
    let Some(value) = normalize_text_option(raw) else {
        return Ok(None);
    };

    match value.parse::<u64>() {
        Ok(0) | Err(_) => Err(Error::Config(format!(
            "{field} must be a positive number of seconds, got '{value}'"
        ))),
        Ok(secs) => Ok(Some(secs)),
    }
}
