//! Ticket backends, one per integration tier
//!
//! - `DirectBackend`: Trello REST
//! - `SingleToolBackend`: one fixed tool through the router's REST surface
//! - `DiscoveryBackend`: session, discovery and streamed execution

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use serde_json::{json, Map, Value};

use super::model::{Diagnostic, Stage, TicketDraft, TicketReceipt};
use crate::config::{TicketTier, ToolRouterConfig};
use crate::core::TicketBackend;
use crate::error::{Result, ServiceError};
use crate::services::tool_router::{
    resolver::content_text, Integration, RestToolExecutor, RpcCaller, SessionManager, SessionProvider,
    StreamingRpcClient, ToolExecutor, ToolResolver, TOOLS_CALL,
};
use crate::services::trello::TrelloClient;

/// Nesting levels searched for a ticket id or URL
const MAX_SEARCH_DEPTH: usize = 16;

/// Ticket identity found in a tool result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketRef {
    pub id: Option<String>,
    pub url: Option<String>,
}

impl TicketRef {
    fn is_empty(&self) -> bool {
        self.id.is_none() && self.url.is_none()
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn http_url<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
}

/// Apply `visit` to every object reachable from `value`, depth first,
/// descending into string-encoded JSON. Stops at the first `Some`.
fn search<T>(value: &Value, depth: usize, visit: &dyn Fn(&Map<String, Value>) -> Option<T>) -> Option<T> {
    if depth > MAX_SEARCH_DEPTH {
        return None;
    }

    match value {
        Value::Object(map) => visit(map).or_else(|| map.values().find_map(|v| search(v, depth + 1, visit))),
        Value::Array(items) => items.iter().find_map(|v| search(v, depth + 1, visit)),
        Value::String(s) => {
            let trimmed = s.trim();
            if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
                return None;
            }
            serde_json::from_str::<Value>(trimmed)
                .ok()
                .and_then(|nested| search(&nested, depth + 1, visit))
        }
        _ => None,
    }
}

/// Find a ticket id and URL anywhere in a tool result.
///
/// Prefers the first object carrying `shortUrl` or `url`, taking `id` from
/// the same object; otherwise settles for the first `id` found.
pub fn extract_ticket_ref(payload: &Value) -> TicketRef {
    let with_url = search(payload, 0, &|map| {
        let url = ["shortUrl", "short_url", "url"]
            .iter()
            .find_map(|key| http_url(map, key))?;

        Some(TicketRef {
            id: map.get("id").and_then(id_string),
            url: Some(url.to_string()),
        })
    });

    if let Some(found) = with_url {
        return found;
    }

    TicketRef {
        id: search(payload, 0, &|map| map.get("id").and_then(id_string)),
        url: None,
    }
}

/// Arguments for the card-creation tool
pub fn build_tool_arguments(draft: &TicketDraft, list_id: Option<&str>) -> Value {
    let mut arguments = Map::new();

    if let Some(list_id) = list_id.filter(|l| !l.is_empty()) {
        arguments.insert("idList".to_string(), json!(list_id));
    }
    arguments.insert("name".to_string(), json!(draft.title));
    arguments.insert("desc".to_string(), json!(draft.description));
    if let Some(url) = &draft.attachment_url {
        arguments.insert("urlSource".to_string(), json!(url));
    }

    Value::Object(arguments)
}

fn receipt_from(found: TicketRef, mut diagnostics: Vec<Diagnostic>) -> TicketReceipt {
    if found.is_empty() {
        warn!("Ticket created but the result carried no id or URL");
        diagnostics.push(Diagnostic::warning(
            Stage::Execution,
            "Ticket created but no id or URL was found in the tool result",
        ));
    }

    TicketReceipt {
        id: found.id,
        url: found.url,
        diagnostics,
    }
}

/// Plain REST against Trello
pub struct DirectBackend {
    trello: Arc<TrelloClient>,
}

impl DirectBackend {
    pub fn new(trello: Arc<TrelloClient>) -> Self {
        Self { trello }
    }
}

#[async_trait]
impl TicketBackend for DirectBackend {
    fn tier(&self) -> TicketTier {
        TicketTier::Direct
    }

    async fn create_ticket(&self, draft: &TicketDraft) -> Result<TicketReceipt> {
        let card = self.trello.create_card(&draft.title, &draft.description).await?;
        let mut diagnostics = Vec::new();

        if let Some(attachment_url) = &draft.attachment_url {
            match self.trello.attach_url(&card.id, attachment_url).await {
                Ok(_) => diagnostics.push(Diagnostic::info(Stage::Attachment, "Photo attached to ticket")),
                Err(e) => {
                    warn!("Could not attach photo to card {}: {}", card.id, e);
                    diagnostics.push(Diagnostic::warning(
                        Stage::Attachment,
                        format!("Photo could not be attached: {}", e.root()),
                    ));
                }
            }
        }

        let url = card.link().map(str::to_string);
        Ok(TicketReceipt {
            id: Some(card.id),
            url,
            diagnostics,
        })
    }
}

/// One fixed tool executed through the router's REST endpoint
pub struct SingleToolBackend {
    executor: Arc<dyn ToolExecutor>,
    slug: String,
    list_id: Option<String>,
}

impl SingleToolBackend {
    pub fn new(executor: Arc<dyn ToolExecutor>, slug: impl Into<String>, list_id: Option<String>) -> Self {
        Self {
            executor,
            slug: slug.into(),
            list_id,
        }
    }

    pub fn from_config(config: &ToolRouterConfig) -> Result<Self> {
        let executor = RestToolExecutor::new(config.clone())?;
        Ok(Self::new(
            Arc::new(executor),
            config.create_tool_slug.clone(),
            config.list_id.clone(),
        ))
    }
}

#[async_trait]
impl TicketBackend for SingleToolBackend {
    fn tier(&self) -> TicketTier {
        TicketTier::SingleTool
    }

    async fn create_ticket(&self, draft: &TicketDraft) -> Result<TicketReceipt> {
        let arguments = build_tool_arguments(draft, self.list_id.as_deref());
        let data = self.executor.execute(&self.slug, arguments).await?;
        Ok(receipt_from(extract_ticket_ref(&data), Vec::new()))
    }
}

/// Session, discovery, selection, connection check, then streamed execution
pub struct DiscoveryBackend {
    sessions: Arc<dyn SessionProvider>,
    rpc: Arc<dyn RpcCaller>,
    resolver: ToolResolver,
    config: ToolRouterConfig,
}

impl DiscoveryBackend {
    pub fn new(sessions: Arc<dyn SessionProvider>, rpc: Arc<dyn RpcCaller>, config: ToolRouterConfig) -> Self {
        let resolver = ToolResolver::new(rpc.clone(), config.discovery_tool.clone());
        Self {
            sessions,
            rpc,
            resolver,
            config,
        }
    }

    pub fn from_config(config: &ToolRouterConfig) -> Result<Self> {
        let sessions = Arc::new(SessionManager::new(config.clone())?);
        let rpc = Arc::new(StreamingRpcClient::new(config.clone())?);
        Ok(Self::new(sessions, rpc, config.clone()))
    }

    fn intent(&self) -> String {
        format!("Create a new {} card for a field maintenance report", self.config.toolkit)
    }

    fn known_fields(&self) -> String {
        match &self.config.list_id {
            Some(list_id) => format!("idList: {}", list_id),
            None => String::new(),
        }
    }
}

/// Warnings for an answer that lacked an explicit result or skipped events
fn stream_warnings(stage: Stage, call: &str, degraded: bool, malformed_events: usize) -> Vec<Diagnostic> {
    let mut warnings = Vec::new();
    if degraded {
        warnings.push(Diagnostic::warning(
            stage,
            format!("{} answer had no explicit result; used the last stream event", call),
        ));
    }
    if malformed_events > 0 {
        warnings.push(Diagnostic::warning(
            stage,
            format!("{} malformed stream events were skipped", malformed_events),
        ));
    }
    warnings
}

/// A tool result that reports failure inside an otherwise explicit result
fn nested_failure(payload: &Value) -> Option<Value> {
    let text = content_text(payload)?;
    let document: Value = serde_json::from_str(text).ok()?;

    let failed = document.get("successful").and_then(Value::as_bool) == Some(false);
    let error = document.get("error").filter(|e| !e.is_null());

    match (failed, error) {
        (true, Some(error)) => Some(json!({ "error": error })),
        (true, None) => Some(json!({ "error": "Tool execution reported failure" })),
        _ => None,
    }
}

#[async_trait]
impl TicketBackend for DiscoveryBackend {
    fn tier(&self) -> TicketTier {
        TicketTier::Discovery
    }

    async fn create_ticket(&self, draft: &TicketDraft) -> Result<TicketReceipt> {
        let mut diagnostics = Vec::new();

        let session = self
            .sessions
            .create_session(
                &self.config.user_id,
                vec![Integration {
                    toolkit: self.config.toolkit.clone(),
                    auth_config_id: self.config.auth_config_id.clone(),
                }],
            )
            .await?;
        diagnostics.push(Diagnostic::info(
            Stage::Session,
            format!("Session {} opened", session.id.as_deref().unwrap_or("(unnamed)")),
        ));

        let discovery = self
            .resolver
            .discover(&session.endpoint, &self.intent(), &self.known_fields())
            .await?;
        diagnostics.extend(stream_warnings(
            Stage::Discovery,
            "Discovery",
            discovery.degraded,
            discovery.malformed_events,
        ));

        let tool = ToolResolver::select(&discovery.tools, &self.config.create_tool_slug)?;
        ToolResolver::assert_connected(&discovery.connections, &self.config.toolkit)?;
        diagnostics.push(Diagnostic::info(
            Stage::Discovery,
            format!("Selected {} from {} discovered tools", tool.slug, discovery.tools.len()),
        ));

        let session_id = discovery.session_id.clone().or_else(|| session.id.clone());
        let params = json!({
            "name": self.config.execute_tool,
            "arguments": {
                "tools": [{
                    "tool_slug": tool.slug,
                    "arguments": build_tool_arguments(draft, self.config.list_id.as_deref()),
                }],
                "session_id": session_id,
            }
        });

        let result = self.rpc.call(&session.endpoint, TOOLS_CALL, params).await?;
        diagnostics.extend(stream_warnings(
            Stage::Execution,
            "Execution",
            result.is_degraded(),
            result.malformed_events,
        ));

        if let Some(failure) = nested_failure(&result.payload) {
            return Err(ServiceError::rpc_remote(failure));
        }

        info!("Executed {} through session {:?}", tool.slug, session_id);
        Ok(receipt_from(extract_ticket_ref(&result.payload), diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::model::{Category, Classification, Severity};
    use crate::services::tool_router::execute::MockToolExecutor;
    use crate::services::tool_router::rpc::MockRpcCaller;
    use crate::services::tool_router::session::MockSessionProvider;
    use crate::services::tool_router::{ResultConfidence, RpcResult, Session};

    fn draft(attachment_url: Option<&str>) -> TicketDraft {
        TicketDraft {
            title: "[Major - Mechanical] Belt slipping".to_string(),
            description: "Belt slipping on line 2\n\nMachine: L2".to_string(),
            attachment_url: attachment_url.map(str::to_string),
            classification: Classification {
                severity: Severity::Major,
                category: Category::Mechanical,
                title: "Belt slipping".to_string(),
            },
        }
    }

    fn text_content(document: Value) -> Value {
        json!({ "content": [{ "type": "text", "text": document.to_string() }] })
    }

    fn explicit(payload: Value) -> RpcResult {
        RpcResult {
            payload,
            confidence: ResultConfidence::Explicit,
            frames_consumed: 2,
            malformed_events: 0,
        }
    }

    fn router_config() -> ToolRouterConfig {
        ToolRouterConfig {
            api_key: "test-key".to_string(),
            auth_config_id: "ac_123".to_string(),
            list_id: Some("list-1".to_string()),
            ..ToolRouterConfig::default()
        }
    }

    fn session_provider() -> MockSessionProvider {
        let mut sessions = MockSessionProvider::new();
        sessions.expect_create_session().returning(|owner, integrations| {
            Ok(Session {
                id: Some("sess-1".to_string()),
                endpoint: "http://router.test/mcp".to_string(),
                owner_id: owner.to_string(),
                required_integrations: integrations,
            })
        });
        sessions
    }

    fn discovery_payload(slug: &str, active: bool) -> Value {
        text_content(json!({
            "data": {
                "session": { "id": "sess-1" },
                "results": [{ "primary_tool_slugs": [slug] }],
                "toolkit_connection_statuses": [{ "toolkit": "trello", "has_active_connection": active }]
            }
        }))
    }

    #[test]
    fn test_tool_arguments_omit_missing_fields() {
        let arguments = build_tool_arguments(&draft(None), None);
        assert_eq!(
            arguments,
            json!({ "name": "[Major - Mechanical] Belt slipping", "desc": "Belt slipping on line 2\n\nMachine: L2" })
        );

        let arguments = build_tool_arguments(&draft(Some("https://cdn.test/p.jpg")), Some("list-1"));
        assert_eq!(arguments["idList"], "list-1");
        assert_eq!(arguments["urlSource"], "https://cdn.test/p.jpg");
    }

    #[test]
    fn test_extract_ticket_ref_from_nested_string() {
        let card = json!({ "id": "c1", "shortUrl": "https://trello.com/c/abc", "idList": "list-1" });
        let payload = text_content(json!({
            "successful": true,
            "data": { "results": [{ "response": { "data": card.to_string() } }] }
        }));

        assert_eq!(
            extract_ticket_ref(&payload),
            TicketRef {
                id: Some("c1".to_string()),
                url: Some("https://trello.com/c/abc".to_string()),
            }
        );
    }

    #[test]
    fn test_extract_ticket_ref_id_only() {
        let found = extract_ticket_ref(&json!({ "data": { "id": 42 } }));
        assert_eq!(found.id.as_deref(), Some("42"));
        assert!(found.url.is_none());

        assert_eq!(extract_ticket_ref(&json!("plain text")), TicketRef::default());
    }

    #[tokio::test]
    async fn test_single_tool_backend_success() {
        let mut executor = MockToolExecutor::new();
        executor
            .expect_execute()
            .withf(|slug, arguments| slug == "TRELLO_ADD_CARDS" && arguments.get("urlSource").is_none())
            .returning(|_, _| Ok(json!({ "id": "c9", "url": "https://trello.com/c/c9" })));

        let backend = SingleToolBackend::new(Arc::new(executor), "TRELLO_ADD_CARDS", Some("list-1".to_string()));
        let receipt = backend.create_ticket(&draft(None)).await.unwrap();

        assert_eq!(receipt.id.as_deref(), Some("c9"));
        assert_eq!(receipt.url.as_deref(), Some("https://trello.com/c/c9"));
        assert!(receipt.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_single_tool_backend_missing_ref_warns() {
        let mut executor = MockToolExecutor::new();
        executor.expect_execute().returning(|_, _| Ok(json!({ "ok": true })));

        let backend = SingleToolBackend::new(Arc::new(executor), "TRELLO_ADD_CARDS", None);
        let receipt = backend.create_ticket(&draft(None)).await.unwrap();

        assert!(receipt.id.is_none());
        assert_eq!(receipt.diagnostics.len(), 1);
        assert_eq!(receipt.diagnostics[0].stage, Stage::Execution);
    }

    #[tokio::test]
    async fn test_discovery_backend_happy_path() {
        let mut rpc = MockRpcCaller::new();
        rpc.expect_call()
            .withf(|_, method, params| method == TOOLS_CALL && params["name"] == "COMPOSIO_SEARCH_TOOLS")
            .times(1)
            .returning(|_, _, _| Ok(explicit(discovery_payload("TRELLO_ADD_CARDS", true))));
        rpc.expect_call()
            .withf(|endpoint, _, params| {
                endpoint == "http://router.test/mcp"
                    && params["name"] == "COMPOSIO_MULTI_EXECUTE_TOOL"
                    && params["arguments"]["session_id"] == "sess-1"
                    && params["arguments"]["tools"][0]["tool_slug"] == "TRELLO_ADD_CARDS"
                    && params["arguments"]["tools"][0]["arguments"]["urlSource"] == "https://cdn.test/p.jpg"
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(explicit(text_content(json!({
                    "successful": true,
                    "data": { "results": [{ "response": { "data": { "id": "c7", "shortUrl": "https://trello.com/c/c7" } } }] }
                }))))
            });

        let backend = DiscoveryBackend::new(Arc::new(session_provider()), Arc::new(rpc), router_config());
        let receipt = backend
            .create_ticket(&draft(Some("https://cdn.test/p.jpg")))
            .await
            .unwrap();

        assert_eq!(receipt.id.as_deref(), Some("c7"));
        assert_eq!(receipt.url.as_deref(), Some("https://trello.com/c/c7"));
        assert!(receipt.diagnostics.iter().all(|d| d.level == crate::pipeline::model::Level::Info));
    }

    #[tokio::test]
    async fn test_discovery_backend_flags_degraded_discovery() {
        let mut rpc = MockRpcCaller::new();
        rpc.expect_call()
            .withf(|_, _, params| params["name"] == "COMPOSIO_SEARCH_TOOLS")
            .times(1)
            .returning(|_, _, _| {
                Ok(RpcResult {
                    payload: discovery_payload("TRELLO_ADD_CARDS", true),
                    confidence: ResultConfidence::LastEventFallback,
                    frames_consumed: 5,
                    malformed_events: 3,
                })
            });
        rpc.expect_call()
            .withf(|_, _, params| params["name"] == "COMPOSIO_MULTI_EXECUTE_TOOL")
            .times(1)
            .returning(|_, _, _| Ok(explicit(json!({ "id": "c8", "url": "https://trello.com/c/c8" }))));

        let backend = DiscoveryBackend::new(Arc::new(session_provider()), Arc::new(rpc), router_config());
        let receipt = backend.create_ticket(&draft(None)).await.unwrap();

        let warnings: Vec<_> = receipt
            .diagnostics
            .iter()
            .filter(|d| d.level == crate::pipeline::model::Level::Warning)
            .collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|d| d.stage == Stage::Discovery));
        assert!(warnings[0].message.contains("last stream event"));
        assert!(warnings[1].message.contains("3 malformed"));
        assert_eq!(receipt.id.as_deref(), Some("c8"));
    }

    #[tokio::test]
    async fn test_discovery_backend_tool_not_found() {
        let mut rpc = MockRpcCaller::new();
        rpc.expect_call()
            .times(1)
            .returning(|_, _, _| Ok(explicit(discovery_payload("GITHUB_CREATE_ISSUE", true))));

        let backend = DiscoveryBackend::new(Arc::new(session_provider()), Arc::new(rpc), router_config());
        let err = backend.create_ticket(&draft(None)).await.unwrap_err();

        assert_eq!(err.kind(), "tool_not_found");
        assert!(err.to_string().contains("GITHUB_CREATE_ISSUE"));
    }

    #[tokio::test]
    async fn test_discovery_backend_requires_active_connection() {
        let mut rpc = MockRpcCaller::new();
        rpc.expect_call()
            .times(1)
            .returning(|_, _, _| Ok(explicit(discovery_payload("TRELLO_ADD_CARDS", false))));

        let backend = DiscoveryBackend::new(Arc::new(session_provider()), Arc::new(rpc), router_config());
        let err = backend.create_ticket(&draft(None)).await.unwrap_err();

        assert_eq!(err.kind(), "integration_not_connected");
    }

    #[tokio::test]
    async fn test_discovery_backend_session_failure_stops_early() {
        let mut sessions = MockSessionProvider::new();
        sessions
            .expect_create_session()
            .returning(|_, _| Err(ServiceError::session_establishment("401 Unauthorized")));
        let mut rpc = MockRpcCaller::new();
        rpc.expect_call().times(0);

        let backend = DiscoveryBackend::new(Arc::new(sessions), Arc::new(rpc), router_config());
        let err = backend.create_ticket(&draft(None)).await.unwrap_err();

        assert_eq!(err.kind(), "session_establishment");
    }

    #[tokio::test]
    async fn test_discovery_backend_nested_tool_failure() {
        let mut rpc = MockRpcCaller::new();
        rpc.expect_call()
            .withf(|_, _, params| params["name"] == "COMPOSIO_SEARCH_TOOLS")
            .times(1)
            .returning(|_, _, _| Ok(explicit(discovery_payload("TRELLO_ADD_CARDS", true))));
        rpc.expect_call()
            .withf(|_, _, params| params["name"] == "COMPOSIO_MULTI_EXECUTE_TOOL")
            .times(1)
            .returning(|_, _, _| {
            Ok(explicit(text_content(json!({ "successful": false, "error": "invalid idList" }))))
        });

        let backend = DiscoveryBackend::new(Arc::new(session_provider()), Arc::new(rpc), router_config());
        let err = backend.create_ticket(&draft(None)).await.unwrap_err();

        assert_eq!(err.kind(), "rpc_remote");
        assert!(err.to_string().contains("invalid idList"));
    }
}
