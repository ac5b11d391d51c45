//! Tool discovery, selection and connection gating
//!
//! The discovery tool answers with an MCP-style `content` list whose first
//! text item is itself a JSON document. Its layout varies between router
//! versions, so every lookup below tries several locations and never fails
//! on a missing field. Only the outer re-parse is allowed to fail.

use std::sync::Arc;

use log::{debug, info};
use serde_json::{json, Value};

use super::models::{ConnectionStatus, Discovery, ToolDescriptor};
use super::rpc::RpcCaller;
use crate::error::{Result, ServiceError};
use crate::util::{sanitize_for_logging, truncate_string};

/// MCP method used for every tool invocation
pub const TOOLS_CALL: &str = "tools/call";

pub struct ToolResolver {
    rpc: Arc<dyn RpcCaller>,
    discovery_tool: String,
}

impl ToolResolver {
    pub fn new(rpc: Arc<dyn RpcCaller>, discovery_tool: impl Into<String>) -> Self {
        Self {
            rpc,
            discovery_tool: discovery_tool.into(),
        }
    }

    /// Ask the router which tools fit `intent`
    pub async fn discover(&self, endpoint: &str, intent: &str, known_fields: &str) -> Result<Discovery> {
        let params = json!({
            "name": self.discovery_tool,
            "arguments": {
                "queries": [{
                    "use_case": intent,
                    "known_fields": known_fields,
                }]
            }
        });

        let result = self.rpc.call(endpoint, TOOLS_CALL, params).await?;
        if result.is_degraded() {
            debug!("Discovery answer came from the last-event fallback");
        }

        let mut discovery = parse_discovery(&result.payload)?;
        discovery.degraded = result.is_degraded();
        discovery.malformed_events = result.malformed_events;
        info!(
            "Discovered {} tools and {} connection statuses",
            discovery.tools.len(),
            discovery.connections.len()
        );
        Ok(discovery)
    }

    /// Exact, case-sensitive slug match
    pub fn select(tools: &[ToolDescriptor], required_slug: &str) -> Result<ToolDescriptor> {
        tools
            .iter()
            .find(|t| t.slug == required_slug)
            .cloned()
            .ok_or_else(|| {
                ServiceError::tool_not_found(
                    required_slug,
                    tools.iter().map(|t| t.slug.clone()).collect(),
                )
            })
    }

    /// The toolkit must appear with an active connection (name compared case-insensitively)
    pub fn assert_connected(statuses: &[ConnectionStatus], toolkit: &str) -> Result<()> {
        let connected = statuses
            .iter()
            .any(|s| s.active && s.toolkit.eq_ignore_ascii_case(toolkit));

        if connected {
            Ok(())
        } else {
            Err(ServiceError::integration_not_connected(toolkit))
        }
    }
}

/// First `text` item of an MCP content list, wherever the list sits
pub(crate) fn content_text(payload: &Value) -> Option<&str> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(_) => payload.get("content")?.as_array()?,
        Value::String(text) => return Some(text.as_str()),
        _ => return None,
    };

    items.iter().find_map(|item| item.get("text").and_then(Value::as_str))
}

/// Re-parse the nested discovery document and extract what it describes
pub fn parse_discovery(payload: &Value) -> Result<Discovery> {
    let text = content_text(payload).ok_or_else(|| {
        ServiceError::discovery_format(format!(
            "No text content in discovery result: {}",
            sanitize_for_logging(&truncate_string(&payload.to_string(), 200))
        ))
    })?;

    let document: Value = serde_json::from_str(text).map_err(|e| {
        ServiceError::discovery_format(format!("Discovery text is not JSON ({}): {}", e, truncate_string(text, 120)))
    })?;

    Ok(Discovery {
        session_id: extract_session_id(&document),
        tools: extract_tools(&document),
        connections: extract_connections(&document),
        ..Discovery::default()
    })
}

fn extract_session_id(doc: &Value) -> Option<String> {
    ["/data/session/id", "/data/session_id", "/session_id", "/session/id"]
        .iter()
        .find_map(|path| doc.pointer(path).and_then(Value::as_str))
        .map(str::to_string)
}

/// `TRELLO_ADD_CARDS` belongs to `trello`
fn toolkit_from_slug(slug: &str) -> String {
    slug.split('_').next().unwrap_or(slug).to_lowercase()
}

fn string_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn descriptor(entry: &Value) -> Option<ToolDescriptor> {
    let slug = match entry {
        Value::String(slug) => slug.as_str(),
        _ => string_field(entry, &["tool_slug", "slug"])?,
    };

    let toolkit = string_field(entry, &["toolkit", "toolkit_slug"])
        .map(str::to_string)
        .or_else(|| entry.pointer("/toolkit/slug").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| toolkit_from_slug(slug));

    Some(ToolDescriptor {
        slug: slug.to_string(),
        toolkit,
    })
}

/// Containers that may hold `tools`, `primary_tool_slugs` or connection statuses
fn containers(doc: &Value) -> Vec<&Value> {
    let mut found = Vec::new();

    for root in [doc.get("data"), Some(doc)].into_iter().flatten() {
        found.push(root);
        if let Some(results) = root.get("results").and_then(Value::as_array) {
            found.extend(results.iter());
        }
    }

    found
}

fn extract_tools(doc: &Value) -> Vec<ToolDescriptor> {
    let mut tools: Vec<ToolDescriptor> = Vec::new();

    for container in containers(doc) {
        for key in ["tools", "primary_tool_slugs"] {
            let Some(entries) = container.get(key).and_then(Value::as_array) else {
                continue;
            };

            for tool in entries.iter().filter_map(descriptor) {
                if !tools.iter().any(|t| t.slug == tool.slug) {
                    tools.push(tool);
                }
            }
        }
    }

    tools
}

fn extract_connections(doc: &Value) -> Vec<ConnectionStatus> {
    let mut statuses: Vec<ConnectionStatus> = Vec::new();

    for container in containers(doc) {
        let Some(entries) = container
            .get("toolkit_connection_statuses")
            .and_then(Value::as_array)
        else {
            continue;
        };

        for entry in entries {
            let Some(toolkit) = string_field(entry, &["toolkit", "toolkit_slug", "slug"]) else {
                continue;
            };

            let active = ["has_active_connection", "active"]
                .iter()
                .find_map(|k| entry.get(*k).and_then(Value::as_bool))
                .unwrap_or(false);

            match statuses.iter_mut().find(|s| s.toolkit.eq_ignore_ascii_case(toolkit)) {
                Some(existing) => existing.active |= active,
                None => statuses.push(ConnectionStatus {
                    toolkit: toolkit.to_string(),
                    active,
                }),
            }
        }
    }

    statuses
}
