//! Client configuration shared by every request a client makes.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;

/// Version stamped by build.rs from `git describe`.
pub const VERSION: &str = env!("EASYHTTP_VERSION");

/// Per-dispatch timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Delay between retry attempts in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Shape of the value a request returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// Envelope with `data` decoded into a key-ordered JSON value.
    #[default]
    Array,
    /// Envelope with `data` decoded for typed access.
    Object,
    /// Envelope encoded as a single JSON string.
    Json,
    /// Raw response body, no envelope and no retries.
    Raw,
}

impl ResponseMode {
    pub const ALL: [ResponseMode; 4] = [
        ResponseMode::Array,
        ResponseMode::Object,
        ResponseMode::Json,
        ResponseMode::Raw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Array => "array",
            ResponseMode::Object => "object",
            ResponseMode::Json => "json",
            ResponseMode::Raw => "raw",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResponseMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| Error::InvalidResponseMode(s.to_string()))
    }
}

/// Settings read by every request. Only changed through the client's setters.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    default_headers: Vec<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub response_mode: ResponseMode,
    pub verify_tls: bool,
    pub follow_redirects: bool,
}

impl ClientConfig {
    /// Creates a configuration for `base_url` (trailing slashes are stripped).
    /// `headers` are appended after the built-in `Accept` and `User-Agent` lines.
    pub fn new(base_url: &str, headers: Vec<String>) -> Self {
        let mut default_headers = vec![
            "Accept: application/json".to_string(),
            format!("User-Agent: easyhttp/{}", VERSION),
        ];
        default_headers.extend(headers);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            default_headers,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 0,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            response_mode: ResponseMode::default(),
            verify_tls: true,
            follow_redirects: true,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_headers(&self) -> &[String] {
        &self.default_headers
    }

    pub(crate) fn push_default_header(&mut self, line: String) {
        self.default_headers.push(line);
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("", Vec::new())
    }
}
