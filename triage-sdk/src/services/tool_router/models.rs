//! Tool router data models

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A toolkit that must be connected for the session's tools to work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub toolkit: String,
    pub auth_config_id: String,
}

/// A tool-router session; one per run, never reused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: Option<String>,
    /// URL the JSON-RPC calls are posted to
    pub endpoint: String,
    pub owner_id: String,
    pub required_integrations: Vec<Integration>,
}

/// Body of the session creation request
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateSessionRequest<'a> {
    pub user_id: &'a str,
    pub toolkits: &'a [Integration],
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct McpEndpoint {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct CreateSessionResponse {
    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub mcp: Option<McpEndpoint>,
}

impl CreateSessionResponse {
    /// The RPC endpoint, if the response names a parseable URL
    pub fn endpoint(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or_else(|| self.mcp.as_ref().and_then(|m| m.url.as_deref()))
            .map(str::trim)
            .filter(|u| url::Url::parse(u).is_ok())
    }
}

/// A tool the router can execute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub slug: String,
    pub toolkit: String,
}

/// Whether the caller has a live account for a toolkit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub toolkit: String,
    pub active: bool,
}

/// Everything the discovery call told us
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Discovery {
    pub session_id: Option<String>,
    pub tools: Vec<ToolDescriptor>,
    pub connections: Vec<ConnectionStatus>,
    /// The answer had no explicit result frame
    #[serde(default)]
    pub degraded: bool,
    #[serde(default)]
    pub malformed_events: usize,
}

impl Discovery {
    pub fn slugs(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.slug.clone()).collect()
    }
}

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: String,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    /// New request with a fresh v4 UUID as id
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: uuid::Uuid::new_v4().to_string(),
            method: method.into(),
            params,
        }
    }
}

/// One decoded unit of a streamed response
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolFrame {
    /// Carries the extracted result value
    Result(Value),
    /// Carries the whole event payload
    Error(Value),
    Terminal,
    /// Well-formed JSON with neither a result nor an error
    Unrecognized(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultConfidence {
    /// A frame carried an explicit result
    Explicit,
    /// No result frame arrived; the last decoded event stands in for one
    LastEventFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcResult {
    pub payload: Value,
    pub confidence: ResultConfidence,
    pub frames_consumed: usize,
    pub malformed_events: usize,
}

impl RpcResult {
    pub fn is_degraded(&self) -> bool {
        self.confidence == ResultConfidence::LastEventFallback
    }
}

/// Body of the single-tool REST execution call
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ExecuteToolRequest<'a> {
    pub user_id: &'a str,
    pub arguments: &'a Value,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExecuteToolResponse {
    #[serde(default)]
    pub successful: bool,

    #[serde(default)]
    pub data: Value,

    #[serde(default)]
    pub error: Option<Value>,
}
