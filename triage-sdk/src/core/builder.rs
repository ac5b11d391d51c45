//! Client builder implementation
//!
//! Provides a unified builder for the reqwest clients behind every service.

use std::time::Duration;

use reqwest::Client as ReqwestClient;

use crate::error::{Result, ServiceError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Unified client builder for all service clients
pub struct ClientBuilder {
    /// Whole-request timeout
    timeout: Option<Duration>,

    /// User agent
    user_agent: Option<String>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            user_agent: Some(format!("Field-Triage/{}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

impl ClientBuilder {
    /// Create a new client builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Remove the whole-request timeout. Only the connect phase stays bounded.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build an HTTP client with the configured settings
    pub fn build_http_client(&self) -> Result<ReqwestClient> {
        let mut builder = ReqwestClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .gzip(true);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(ref user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent);
        }

        builder
            .build()
            .map_err(|e| ServiceError::configuration(format!("Failed to build HTTP client: {}", e)))
    }
}
