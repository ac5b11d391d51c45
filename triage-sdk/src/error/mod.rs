//! Error handling for the triage SDK
//!
//! This module provides the error system shared by every stage of the pipeline:
//! - Transport-level categories (network, auth, rate limit, timeout, ...)
//! - The pipeline taxonomy (session, streaming RPC, discovery, tool selection,
//!   integration gating, upload)
//! - Rich context for debugging without leaking credentials
//! - A convenient Result type alias

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

pub mod mapping;

/// Result type for triage SDK operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Main error type for the triage SDK
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Network or connection errors
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Authorization errors (permission issues)
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    /// Service-specific errors
    #[error("Service error: {0}")]
    Service(String),

    /// Caller-supplied input is invalid (missing report text, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Response parsing errors
    #[error("Parsing error: {0}")]
    Parsing(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// Resource not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// External service errors
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Asset upload failed; callers degrade to a ticket without attachment
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// The tool router could not allocate a session endpoint
    #[error("Session establishment failed: {0}")]
    SessionEstablishment(String),

    /// Non-success status, missing body, broken or stalled stream
    #[error("RPC transport error: {0}")]
    RpcTransport(String),

    /// The remote side reported an explicit error in the stream
    #[error("RPC remote error: {message}")]
    RpcRemote { message: String, payload: Value },

    /// The stream ended without a single decodable event
    #[error("RPC returned no result: {0}")]
    RpcNoResult(String),

    /// The discovery payload could not be re-parsed
    #[error("Discovery response malformed: {0}")]
    DiscoveryFormat(String),

    /// No discovered tool carries the required slug
    #[error("Tool '{slug}' not found among discovered tools [{}]", .available.join(", "))]
    ToolNotFound { slug: String, available: Vec<String> },

    /// The toolkit has no active connected account
    #[error(
        "Toolkit '{toolkit}' has no active connection. Connect a {toolkit} account for the \
         configured auth config (TOOL_ROUTER_AUTH_CONFIG_ID) in the tool router dashboard, \
         then resubmit the report"
    )]
    IntegrationNotConnected { toolkit: String },

    /// Errors with additional context
    #[error("{inner}")]
    WithContext {
        inner: Box<ServiceError>,
        context: ErrorContext,
    },
}

impl ServiceError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        ServiceError::Network(message.into())
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        ServiceError::Authentication(message.into())
    }

    /// Create an authorization error
    pub fn authorization(message: impl Into<String>) -> Self {
        ServiceError::Authorization(message.into())
    }

    /// Create a rate limit error
    pub fn rate_limit(message: impl Into<String>) -> Self {
        ServiceError::RateLimit(message.into())
    }

    /// Create a service-specific error
    pub fn service(message: impl Into<String>) -> Self {
        ServiceError::Service(message.into())
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    /// Create a parsing error
    pub fn parsing(message: impl Into<String>) -> Self {
        ServiceError::Parsing(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        ServiceError::Configuration(message.into())
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        ServiceError::Timeout(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        ServiceError::Internal(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    /// Create an external service error
    pub fn external_service(message: impl Into<String>) -> Self {
        ServiceError::ExternalService(message.into())
    }

    pub fn upload_failed(message: impl Into<String>) -> Self {
        ServiceError::UploadFailed(message.into())
    }

    pub fn session_establishment(message: impl Into<String>) -> Self {
        ServiceError::SessionEstablishment(message.into())
    }

    pub fn rpc_transport(message: impl Into<String>) -> Self {
        ServiceError::RpcTransport(message.into())
    }

    /// Create a remote RPC error, keeping the raw error payload
    pub fn rpc_remote(payload: Value) -> Self {
        let message = remote_error_message(&payload);
        ServiceError::RpcRemote { message, payload }
    }

    pub fn rpc_no_result(message: impl Into<String>) -> Self {
        ServiceError::RpcNoResult(message.into())
    }

    pub fn discovery_format(message: impl Into<String>) -> Self {
        ServiceError::DiscoveryFormat(message.into())
    }

    pub fn tool_not_found(slug: impl Into<String>, available: Vec<String>) -> Self {
        ServiceError::ToolNotFound {
            slug: slug.into(),
            available,
        }
    }

    pub fn integration_not_connected(toolkit: impl Into<String>) -> Self {
        ServiceError::IntegrationNotConnected {
            toolkit: toolkit.into(),
        }
    }

    /// Add context to an existing error
    pub fn with_context(self, context: ErrorContext) -> Self {
        ServiceError::WithContext {
            inner: Box::new(self),
            context,
        }
    }

    /// Add a single context key/value to an existing error
    pub fn with_context_value(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let mut context = ErrorContext::new();
        context.add(key, value);
        self.with_context(context)
    }

    /// The innermost error, with all context layers peeled off
    pub fn root(&self) -> &ServiceError {
        match self {
            ServiceError::WithContext { inner, .. } => inner.root(),
            other => other,
        }
    }

    /// Stable machine-readable code for this error category
    pub fn kind(&self) -> &'static str {
        match self.root() {
            ServiceError::Network(_) => "network",
            ServiceError::Authentication(_) => "authentication",
            ServiceError::Authorization(_) => "authorization",
            ServiceError::RateLimit(_) => "rate_limit",
            ServiceError::Service(_) => "service",
            ServiceError::Validation(_) => "validation",
            ServiceError::Parsing(_) => "parsing",
            ServiceError::Configuration(_) => "configuration",
            ServiceError::Timeout(_) => "timeout",
            ServiceError::Internal(_) => "internal",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::ExternalService(_) => "external_service",
            ServiceError::UploadFailed(_) => "upload_failed",
            ServiceError::SessionEstablishment(_) => "session_establishment",
            ServiceError::RpcTransport(_) => "rpc_transport",
            ServiceError::RpcRemote { .. } => "rpc_remote",
            ServiceError::RpcNoResult(_) => "rpc_no_result",
            ServiceError::DiscoveryFormat(_) => "discovery_format",
            ServiceError::ToolNotFound { .. } => "tool_not_found",
            ServiceError::IntegrationNotConnected { .. } => "integration_not_connected",
            ServiceError::WithContext { .. } => "internal",
        }
    }

    /// HTTP status the gateway should answer with
    pub fn http_status(&self) -> u16 {
        match self.root() {
            ServiceError::Validation(_) => 400,
            _ => 500,
        }
    }

    /// Get the error code if available
    pub fn error_code(&self) -> Option<&str> {
        match self {
            ServiceError::WithContext { context, .. } => context.error_code.as_deref(),
            _ => None,
        }
    }

    /// Get the service name if available
    pub fn service_name(&self) -> Option<&str> {
        match self {
            ServiceError::WithContext { context, .. } => Some(&context.service),
            _ => None,
        }
    }

    /// Get the HTTP status code if available
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ServiceError::WithContext { context, .. } => context.status_code,
            _ => None,
        }
    }

    /// Check if this is a retryable error.
    ///
    /// Nothing inside the SDK retries; this is advice for whoever invokes the
    /// orchestrator.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Network(_) => true,
            ServiceError::Timeout(_) => true,
            ServiceError::RateLimit(_) => true,
            ServiceError::RpcTransport(_) => true,
            ServiceError::SessionEstablishment(_) => true,
            ServiceError::WithContext { inner, .. } => inner.is_retryable(),
            _ => false,
        }
    }

    /// Check if this is a permanent error (not retryable)
    pub fn is_permanent(&self) -> bool {
        !self.is_retryable()
    }
}

/// Pull a human-readable message out of a JSON-RPC or tool error payload
fn remote_error_message(payload: &Value) -> String {
    let error = payload.get("error").unwrap_or(payload);

    if let Some(message) = error.as_str() {
        return message.to_string();
    }

    if let Some(message) = error.get("message").and_then(Value::as_str) {
        return match error.get("code") {
            Some(code) => format!("{} (code {})", message, code),
            None => message.to_string(),
        };
    }

    // MCP style: {"result": {"isError": true, "content": [{"text": "..."}]}}
    if let Some(text) = payload
        .pointer("/result/content/0/text")
        .and_then(Value::as_str)
    {
        return text.to_string();
    }

    let raw = error.to_string();
    crate::util::truncate_string(&raw, 200)
}

/// Error context information
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Service that generated the error
    pub service: String,

    /// Request timestamp
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,

    /// HTTP status code if applicable
    pub status_code: Option<u16>,

    /// Service-specific error code
    pub error_code: Option<String>,

    /// Request ID for tracing
    pub request_id: Option<String>,

    /// Endpoint that was called
    pub endpoint: Option<String>,

    /// Additional context data
    pub data: HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            service: "unknown".to_string(),
            timestamp: Some(chrono::Utc::now()),
            status_code: None,
            error_code: None,
            request_id: None,
            endpoint: None,
            data: HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new error context for a specific service
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    /// Add an HTTP status code
    pub fn status_code(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Add an error code
    pub fn error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Add a request ID
    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Add an endpoint
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Add a context value
    pub fn add<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.data.insert(key.into(), value.to_string());
    }

    /// Add a context value and return self (builder pattern)
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.add(key, value);
        self
    }
}

/// Convert reqwest errors to ServiceError.
///
/// The URL is stripped first: ticketing credentials travel as query
/// parameters and must never end up in an error message.
impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        let context = ErrorContext::for_service("http_client");

        let service_error = if err.is_timeout() {
            ServiceError::timeout(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            ServiceError::network(format!("Connection error: {}", err))
        } else if err.is_request() {
            ServiceError::network(format!("Request failed: {}", err))
        } else if err.is_redirect() {
            ServiceError::network(format!("Too many redirects: {}", err))
        } else if err.is_decode() {
            ServiceError::parsing(format!("Response decode error: {}", err))
        } else {
            ServiceError::internal(format!("HTTP client error: {}", err))
        };

        if let Some(status) = err.status() {
            service_error.with_context(context.status_code(status.as_u16()))
        } else {
            service_error.with_context(context)
        }
    }
}

/// Convert serde_json errors to ServiceError
impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::parsing(format!("JSON error: {}", err))
            .with_context(ErrorContext::for_service("json"))
    }
}
