//! Configuration management for the triage pipeline
//!
//! This module provides utilities for loading configuration for the external
//! service clients, with support for environment variables.
//!
//! Loading never fails on a missing credential: every service config is
//! validated by the client right before the call that needs it, so a missing
//! Cloudinary secret only disables uploads instead of the whole process.

use std::collections::HashMap;
use std::env;
use std::fmt::{self, Debug};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get an integer configuration value
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value
            .trim()
            .parse::<i64>()
            .map_err(|e| ServiceError::configuration(format!("Invalid integer for key {}: {}", key, e)))
    }

    /// Get a boolean configuration value
    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ServiceError::configuration(format!(
                "Invalid boolean value for key {}: {}",
                key, value
            ))),
        }
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get an integer configuration value with a default
    fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.get_int(key).unwrap_or(default)
    }

    /// Get a boolean configuration value with a default
    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,

    /// Optional namespace for variables (e.g., "GEMINI", "TRELLO")
    namespace: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set a namespace for environment variables
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Format a configuration key as an environment variable
    pub(crate) fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        if let Some(ref namespace) = self.namespace {
            env_key.push_str(namespace);
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        match env::var(&env_key) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            Ok(_) => Err(ServiceError::configuration(format!(
                "Environment variable is empty: {}",
                env_key
            ))),
            Err(env::VarError::NotPresent) => Err(ServiceError::configuration(format!(
                "Environment variable not set: {}",
                env_key
            ))),
            Err(env::VarError::NotUnicode(_)) => Err(ServiceError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            ))),
        }
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::configuration(format!("Configuration key not found: {}", key)))
    }
}

/// A composite config provider that tries multiple providers in order
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    pub fn new() -> Self {
        Self { providers: Vec::new() }
    }

    /// Add a provider to the end of the chain
    pub fn add_provider(&mut self, provider: impl ConfigProvider + 'static) {
        self.providers.push(Box::new(provider));
    }
}

impl Default for CompositeConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.providers
            .iter()
            .find_map(|provider| provider.get_string(key).ok())
            .ok_or_else(|| {
                ServiceError::configuration(format!(
                    "Configuration key not found in any provider: {}",
                    key
                ))
            })
    }
}

/// Trait for service-specific configuration
pub trait ServiceConfig: Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;

    /// Service name
    fn service_name(&self) -> &str;
}

fn require(value: &str, what: &str, env_hint: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::configuration(format!(
            "{} is required (set {})",
            what, env_hint
        )));
    }
    Ok(())
}

fn positive_u64(provider: &dyn ConfigProvider, key: &str, default: u64) -> u64 {
    match provider.get_int_or(key, default as i64) {
        v if v > 0 => v as u64,
        _ => default,
    }
}

/// Configuration for the Gemini text-generation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl GeminiConfig {
    /// Load configuration from a config provider
    pub fn from_provider(provider: &dyn ConfigProvider) -> Self {
        let defaults = Self::default();
        Self {
            api_key: provider.get_string_or("gemini_api_key", ""),
            model: provider.get_string_or("gemini_model", &defaults.model),
            base_url: provider.get_string_or("gemini_base_url", &defaults.base_url),
            timeout_seconds: positive_u64(provider, "gemini_timeout_seconds", defaults.timeout_seconds),
        }
    }
}

impl ServiceConfig for GeminiConfig {
    fn validate(&self) -> Result<()> {
        require(&self.api_key, "Gemini API key", "GEMINI_API_KEY")?;
        require(&self.model, "Gemini model", "GEMINI_MODEL")?;
        require(&self.base_url, "Gemini base URL", "GEMINI_BASE_URL")
    }

    fn service_name(&self) -> &str {
        "gemini"
    }
}

/// Configuration for the Cloudinary asset store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    pub folder: String,
    /// Photos above this size are rejected before any network call
    pub max_upload_bytes: u64,
    pub timeout_seconds: u64,
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            base_url: "https://api.cloudinary.com/v1_1".to_string(),
            folder: "reports".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
            timeout_seconds: 60,
        }
    }
}

impl CloudinaryConfig {
    pub fn from_provider(provider: &dyn ConfigProvider) -> Self {
        let defaults = Self::default();
        Self {
            cloud_name: provider.get_string_or("cloudinary_cloud_name", ""),
            api_key: provider.get_string_or("cloudinary_api_key", ""),
            api_secret: provider.get_string_or("cloudinary_api_secret", ""),
            base_url: provider.get_string_or("cloudinary_base_url", &defaults.base_url),
            folder: provider.get_string_or("cloudinary_folder", &defaults.folder),
            max_upload_bytes: positive_u64(provider, "cloudinary_max_upload_bytes", defaults.max_upload_bytes),
            timeout_seconds: positive_u64(provider, "cloudinary_timeout_seconds", defaults.timeout_seconds),
        }
    }
}

impl ServiceConfig for CloudinaryConfig {
    fn validate(&self) -> Result<()> {
        require(&self.cloud_name, "Cloudinary cloud name", "CLOUDINARY_CLOUD_NAME")?;
        require(&self.api_key, "Cloudinary API key", "CLOUDINARY_API_KEY")?;
        require(&self.api_secret, "Cloudinary API secret", "CLOUDINARY_API_SECRET")
    }

    fn service_name(&self) -> &str {
        "cloudinary"
    }
}

/// Configuration for direct Trello REST access
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrelloConfig {
    pub api_key: String,
    pub token: String,
    pub list_id: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for TrelloConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            token: String::new(),
            list_id: String::new(),
            base_url: "https://api.trello.com".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl TrelloConfig {
    pub fn from_provider(provider: &dyn ConfigProvider) -> Self {
        let defaults = Self::default();
        Self {
            api_key: provider.get_string_or("trello_api_key", ""),
            token: provider.get_string_or("trello_token", ""),
            list_id: provider.get_string_or("trello_list_id", ""),
            base_url: provider.get_string_or("trello_base_url", &defaults.base_url),
            timeout_seconds: positive_u64(provider, "trello_timeout_seconds", defaults.timeout_seconds),
        }
    }
}

impl ServiceConfig for TrelloConfig {
    fn validate(&self) -> Result<()> {
        require(&self.api_key, "Trello API key", "TRELLO_API_KEY")?;
        require(&self.token, "Trello token", "TRELLO_TOKEN")?;
        require(&self.list_id, "Trello list id", "TRELLO_LIST_ID")
    }

    fn service_name(&self) -> &str {
        "trello"
    }
}

/// Configuration for the tool router (session, discovery and execution)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRouterConfig {
    pub api_key: String,
    pub base_url: String,
    /// Caller identity the session is scoped to
    pub user_id: String,
    /// Toolkit that must be connected before a ticket can be created
    pub toolkit: String,
    pub auth_config_id: String,
    /// Slug of the ticket-creation tool
    pub create_tool_slug: String,
    pub discovery_tool: String,
    pub execute_tool: String,
    /// Board list handed to the create tool, when known
    pub list_id: Option<String>,
    pub timeout_seconds: u64,
    /// Longest wait for the next chunk of an event stream
    pub stream_idle_timeout_seconds: u64,
}

impl Default for ToolRouterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://backend.composio.dev".to_string(),
            user_id: "field-triage".to_string(),
            toolkit: "trello".to_string(),
            auth_config_id: String::new(),
            create_tool_slug: "TRELLO_ADD_CARDS".to_string(),
            discovery_tool: "COMPOSIO_SEARCH_TOOLS".to_string(),
            execute_tool: "COMPOSIO_MULTI_EXECUTE_TOOL".to_string(),
            list_id: None,
            timeout_seconds: 60,
            stream_idle_timeout_seconds: 30,
        }
    }
}

impl ToolRouterConfig {
    pub fn from_provider(provider: &dyn ConfigProvider) -> Self {
        let defaults = Self::default();
        Self {
            api_key: provider.get_string_or("tool_router_api_key", ""),
            base_url: provider.get_string_or("tool_router_base_url", &defaults.base_url),
            user_id: provider.get_string_or("tool_router_user_id", &defaults.user_id),
            toolkit: provider.get_string_or("tool_router_toolkit", &defaults.toolkit),
            auth_config_id: provider.get_string_or("tool_router_auth_config_id", ""),
            create_tool_slug: provider.get_string_or("tool_router_create_tool_slug", &defaults.create_tool_slug),
            discovery_tool: provider.get_string_or("tool_router_discovery_tool", &defaults.discovery_tool),
            execute_tool: provider.get_string_or("tool_router_execute_tool", &defaults.execute_tool),
            list_id: provider
                .get_string("tool_router_list_id")
                .or_else(|_| provider.get_string("trello_list_id"))
                .ok(),
            timeout_seconds: positive_u64(provider, "tool_router_timeout_seconds", defaults.timeout_seconds),
            stream_idle_timeout_seconds: positive_u64(
                provider,
                "tool_router_stream_idle_timeout_seconds",
                defaults.stream_idle_timeout_seconds,
            ),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_seconds)
    }
}

impl ServiceConfig for ToolRouterConfig {
    fn validate(&self) -> Result<()> {
        require(&self.api_key, "Tool router API key", "TOOL_ROUTER_API_KEY")?;
        require(&self.base_url, "Tool router base URL", "TOOL_ROUTER_BASE_URL")?;
        require(&self.user_id, "Tool router user id", "TOOL_ROUTER_USER_ID")?;
        require(&self.toolkit, "Tool router toolkit", "TOOL_ROUTER_TOOLKIT")?;
        require(&self.create_tool_slug, "Ticket creation tool slug", "TOOL_ROUTER_CREATE_TOOL_SLUG")
    }

    fn service_name(&self) -> &str {
        "tool_router"
    }
}

/// Which integration style creates tickets; chosen once per deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketTier {
    /// Plain REST calls against the ticketing backend
    #[default]
    Direct,
    /// One fixed tool executed against the tool router's REST surface
    SingleTool,
    /// Session, discovery and streamed execution
    Discovery,
}

impl FromStr for TicketTier {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "direct" | "a" => Ok(TicketTier::Direct),
            "single_tool" | "single" | "b" => Ok(TicketTier::SingleTool),
            "discovery" | "c" => Ok(TicketTier::Discovery),
            other => Err(ServiceError::configuration(format!(
                "Unknown ticket tier '{}', expected direct, single_tool or discovery",
                other
            ))),
        }
    }
}

impl fmt::Display for TicketTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketTier::Direct => write!(f, "direct"),
            TicketTier::SingleTool => write!(f, "single_tool"),
            TicketTier::Discovery => write!(f, "discovery"),
        }
    }
}

/// Everything the pipeline needs, built once at process start
#[derive(Debug, Clone, Default)]
pub struct TriageConfig {
    pub tier: TicketTier,
    pub gemini: GeminiConfig,
    pub cloudinary: CloudinaryConfig,
    pub trello: TrelloConfig,
    pub tool_router: ToolRouterConfig,
}

impl TriageConfig {
    /// Load from a provider; only a malformed tier name is rejected here
    pub fn from_provider(provider: &dyn ConfigProvider) -> Result<Self> {
        let tier = match provider.get_string("triage_ticket_tier") {
            Ok(value) => value.parse()?,
            Err(_) => TicketTier::default(),
        };

        Ok(Self {
            tier,
            gemini: GeminiConfig::from_provider(provider),
            cloudinary: CloudinaryConfig::from_provider(provider),
            trello: TrelloConfig::from_provider(provider),
            tool_router: ToolRouterConfig::from_provider(provider),
        })
    }

    /// Load from process environment variables (no prefix)
    pub fn from_env() -> Result<Self> {
        Self::from_provider(&EnvConfigProvider::new())
    }
}
