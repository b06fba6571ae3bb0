// Client configuration for streaming chat sessions

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, StreamError};

/// Chat endpoint used when none is configured
pub const DEFAULT_ENDPOINT: &str = "/chat/sse";

/// Endpoint that asks the backend to stop generating for a session
pub const DEFAULT_STOP_ENDPOINT: &str = "/chat/stopSse";

/// `type` value that marks a thinking delta
pub const DEFAULT_THINKING_MARKER: &str = "thinking";

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_stop_endpoint() -> Option<String> {
    Some(DEFAULT_STOP_ENDPOINT.to_string())
}

fn default_thinking_marker() -> String {
    DEFAULT_THINKING_MARKER.to_string()
}

/// Configuration for a [`StreamClient`](crate::StreamClient)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL, e.g. `https://api.example.com`
    pub base_url: String,

    /// Path of the streaming chat endpoint (defaults to `/chat/sse`)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Path of the stop endpoint (defaults to `/chat/stopSse`); `None` disables
    /// server-side stop notifications
    #[serde(default = "default_stop_endpoint")]
    pub stop_endpoint: Option<String>,

    #[serde(default = "default_thinking_marker")]
    pub thinking_marker: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            endpoint: default_endpoint(),
            stop_endpoint: default_stop_endpoint(),
            thinking_marker: default_thinking_marker(),
            connect_timeout_secs: None,
            user_agent: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_stop_endpoint(mut self, stop_endpoint: Option<String>) -> Self {
        self.stop_endpoint = stop_endpoint;
        self
    }

    pub fn with_thinking_marker(mut self, marker: impl Into<String>) -> Self {
        self.thinking_marker = marker.into();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    /// Full request URL: base URL and endpoint joined by exactly one `/`
    pub fn url(&self) -> String {
        self.join(&self.endpoint)
    }

    /// Full stop URL, if stop notifications are enabled. An empty endpoint
    /// counts as disabled, so configuration files can turn it off.
    pub fn stop_url(&self) -> Option<String> {
        self.stop_endpoint
            .as_deref()
            .filter(|endpoint| !endpoint.trim().is_empty())
            .map(|endpoint| self.join(endpoint))
    }

    fn join(&self, endpoint: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let endpoint = endpoint.trim_start_matches('/');

        if endpoint.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, endpoint)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(StreamError::Config("base_url is required".to_string()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(StreamError::Config(format!(
                "base_url must start with http:// or https://, got {}",
                base
            )));
        }
        if self.thinking_marker.is_empty() {
            return Err(StreamError::Config(
                "thinking_marker must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
