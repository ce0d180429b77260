//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
    /// Upper bound on any token refresh, including the boot-time one.
    pub refresh_secs: u64,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            refresh_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
        }
    }
}

impl ClientTimeouts {
    #[must_use]
    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeouts: ClientTimeouts,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { api_url: DEFAULT_API_URL.to_owned(), timeouts: ClientTimeouts::default() }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `TASKDESK_API_URL`: default `http://127.0.0.1:5000`
    /// - `TASKDESK_REQUEST_TIMEOUT_SECS`: default 30
    /// - `TASKDESK_CONNECT_TIMEOUT_SECS`: default 10
    /// - `TASKDESK_REFRESH_TIMEOUT_SECS`: default 15
    #[must_use]
    pub fn from_env() -> Self {
        let api_url = std::env::var("TASKDESK_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_owned());
        let timeouts = ClientTimeouts {
            request_secs: env_parse_u64("TASKDESK_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("TASKDESK_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            refresh_secs: env_parse_u64("TASKDESK_REFRESH_TIMEOUT_SECS", DEFAULT_REFRESH_TIMEOUT_SECS),
        };
        Self::default().with_api_url(&api_url).with_timeouts(timeouts)
    }

    /// Replace the API base URL, dropping trailing slashes.
    #[must_use]
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        let trimmed = api_url.trim().trim_end_matches('/');
        self.api_url = if trimmed.is_empty() { DEFAULT_API_URL.to_owned() } else { trimmed.to_owned() };
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: ClientTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
