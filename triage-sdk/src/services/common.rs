//! Common utilities for service clients
//!
//! This module provides shared functionality for all service clients.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::Client;

use crate::core::ClientBuilder;
use crate::error::{ErrorContext, Result, ServiceError};

/// UserAgent structure for identifying the client to upstream services
#[derive(Debug, Clone)]
pub struct UserAgent {
    /// Application name
    pub app_name: String,

    /// Version string
    pub version: String,

    /// Optional extra info
    pub extra: Option<String>,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            app_name: "Field-Triage".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            extra: Some("triage-sdk".to_string()),
        }
    }
}

impl UserAgent {
    /// Default agent tagged with the client that uses it
    pub fn for_client(client: &str) -> Self {
        Self {
            extra: Some(client.to_string()),
            ..Self::default()
        }
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_name, self.version)?;

        if let Some(ref extra) = self.extra {
            write!(f, " ({})", extra)?;
        }

        Ok(())
    }
}

/// Per-client request counters
#[derive(Debug, Default)]
pub struct ClientMetrics {
    request_count: AtomicU64,
    success_count: AtomicU64,
    error_count: AtomicU64,
    last_latency_ms: AtomicU64,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one request
    pub fn record(&self, success: bool, latency: Duration) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        if success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.last_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Get all metrics as a map
    pub fn as_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();

        map.insert("request_count".to_string(), self.request_count().to_string());
        map.insert(
            "success_count".to_string(),
            self.success_count.load(Ordering::Relaxed).to_string(),
        );
        map.insert("error_count".to_string(), self.error_count().to_string());
        map.insert(
            "last_latency_ms".to_string(),
            self.last_latency_ms.load(Ordering::Relaxed).to_string(),
        );

        map
    }
}

/// Build a standard HTTP client with default settings
pub fn build_http_client(user_agent: Option<UserAgent>, timeout: Option<Duration>) -> Result<Client> {
    let ua = user_agent.unwrap_or_default().to_string();

    let mut builder = ClientBuilder::new().user_agent(ua);
    builder = match timeout {
        Some(timeout) => builder.timeout(timeout),
        None => builder.no_timeout(),
    };

    builder.build_http_client()
}

/// Create error context for HTTP requests
pub fn create_error_context(service_name: &str, status: Option<reqwest::StatusCode>) -> ErrorContext {
    let mut context = ErrorContext::for_service(service_name);

    if let Some(status_code) = status {
        context = context.status_code(status_code.as_u16());
    }

    context
}

/// Parse error response from HTTP response
pub async fn parse_error_response(service_name: &str, response: reqwest::Response) -> ServiceError {
    let status = response.status();
    let mut context = create_error_context(service_name, Some(status));

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => format!("Failed to read error response: {}", e.without_url()),
    };

    crate::error::mapping::map_http_error(status, &body, &mut context).with_context(context)
}
