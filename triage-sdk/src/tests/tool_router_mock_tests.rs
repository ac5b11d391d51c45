//! Mock tests for the tool router: sessions, streamed JSON-RPC, discovery and
//! REST execution
//!
//! Event-stream bodies are served whole by WireMock; the decoder does not
//! care whether the bytes arrive in one chunk or many.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::ToolRouterConfig;
    use crate::services::tool_router::{
        Integration, ResultConfidence, RestToolExecutor, RpcCaller, SessionManager, SessionProvider,
        StreamingRpcClient, ToolExecutor, ToolResolver, TOOLS_CALL,
    };

    const RPC_PATH: &str = "/tool_router/sess_1/mcp";

    fn config(mock_server: &MockServer) -> ToolRouterConfig {
        ToolRouterConfig {
            api_key: "router_key".to_string(),
            base_url: mock_server.uri(),
            timeout_seconds: 5,
            stream_idle_timeout_seconds: 2,
            ..ToolRouterConfig::default()
        }
    }

    fn endpoint(mock_server: &MockServer) -> String {
        format!("{}{}", mock_server.uri(), RPC_PATH)
    }

    fn integration() -> Vec<Integration> {
        vec![Integration {
            toolkit: "trello".to_string(),
            auth_config_id: "ac_trello".to_string(),
        }]
    }

    /// Render JSON values as `data:` events, each followed by a blank line
    fn sse(events: &[&str]) -> String {
        events.iter().map(|e| format!("data: {}\n\n", e)).collect()
    }

    fn result_event(id: u32, value: Value) -> String {
        json!({ "jsonrpc": "2.0", "id": id, "result": value }).to_string()
    }

    async fn serve_stream(mock_server: &MockServer, body: String) {
        Mock::given(method("POST"))
            .and(path(RPC_PATH))
            .and(header("x-api-key", "router_key"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(mock_server)
            .await;
    }

    fn rpc_client(mock_server: &MockServer) -> StreamingRpcClient {
        StreamingRpcClient::new(config(mock_server)).expect("Failed to build RPC client")
    }

    // Sessions

    #[tokio::test]
    async fn test_create_session_with_url() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v3/labs/tool_router/session"))
            .and(header("x-api-key", "router_key"))
            .and(body_partial_json(json!({
                "user_id": "owner-7",
                "toolkits": [{ "toolkit": "trello", "auth_config_id": "ac_trello" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session_id": "sess_1",
                "url": format!("{}{}", mock_server.uri(), RPC_PATH)
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sessions = SessionManager::new(config(&mock_server)).unwrap();
        let session = sessions.create_session("owner-7", integration()).await.unwrap();

        assert_eq!(session.id.as_deref(), Some("sess_1"));
        assert_eq!(session.endpoint, endpoint(&mock_server));
        assert_eq!(session.owner_id, "owner-7");
        assert_eq!(session.required_integrations, integration());
    }

    #[tokio::test]
    async fn test_create_session_with_nested_endpoint() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v3/labs/tool_router/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session_id": "sess_2",
                "mcp": { "url": "https://router.test/tool_router/sess_2/mcp" }
            })))
            .mount(&mock_server)
            .await;

        let sessions = SessionManager::new(config(&mock_server)).unwrap();
        let session = sessions.create_session("owner-7", integration()).await.unwrap();

        assert_eq!(session.endpoint, "https://router.test/tool_router/sess_2/mcp");
    }

    #[tokio::test]
    async fn test_create_session_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v3/labs/tool_router/session"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Invalid API key" }
            })))
            .mount(&mock_server)
            .await;

        let sessions = SessionManager::new(config(&mock_server)).unwrap();
        let err = sessions.create_session("owner-7", integration()).await.unwrap_err();

        assert_eq!(err.kind(), "session_establishment");
        assert!(!err.to_string().contains("router_key"));
    }

    #[tokio::test]
    async fn test_create_session_without_endpoint() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v3/labs/tool_router/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "session_id": "sess_3",
                "url": "not a url"
            })))
            .mount(&mock_server)
            .await;

        let sessions = SessionManager::new(config(&mock_server)).unwrap();
        let err = sessions.create_session("owner-7", integration()).await.unwrap_err();

        assert_eq!(err.kind(), "session_establishment");
        assert!(err.to_string().contains("no endpoint"));
    }

    #[tokio::test]
    async fn test_create_session_without_api_key() {
        let sessions = SessionManager::new(ToolRouterConfig::default()).unwrap();
        let err = sessions.create_session("owner-7", integration()).await.unwrap_err();

        assert_eq!(err.kind(), "session_establishment");
        assert!(err.to_string().contains("TOOL_ROUTER_API_KEY"));
    }

    // Streamed JSON-RPC

    #[tokio::test]
    async fn test_first_result_wins() {
        let mock_server = MockServer::start().await;
        let first = result_event(1, json!({ "step": 1 }));
        let second = result_event(1, json!({ "step": 2 }));
        let third = result_event(1, json!({ "step": 3 }));
        serve_stream(&mock_server, sse(&[&first, &second, &third, "[DONE]"])).await;

        let result = rpc_client(&mock_server)
            .call(&endpoint(&mock_server), TOOLS_CALL, json!({}))
            .await
            .unwrap();

        assert_eq!(result.payload, json!({ "step": 1 }));
        assert_eq!(result.confidence, ResultConfidence::Explicit);
        assert_eq!(result.frames_consumed, 4);
        assert_eq!(result.malformed_events, 0);
    }

    #[tokio::test]
    async fn test_malformed_event_is_skipped() {
        let mock_server = MockServer::start().await;
        let first = result_event(1, json!({ "step": 1 }));
        let third = result_event(1, json!({ "step": 3 }));
        serve_stream(&mock_server, sse(&[&first, "{not json", &third])).await;

        let result = rpc_client(&mock_server)
            .call(&endpoint(&mock_server), TOOLS_CALL, json!({}))
            .await
            .unwrap();

        assert_eq!(result.payload, json!({ "step": 1 }));
        assert_eq!(result.frames_consumed, 2);
        assert_eq!(result.malformed_events, 1);
    }

    #[tokio::test]
    async fn test_error_after_result_fails_call() {
        let mock_server = MockServer::start().await;
        let first = result_event(1, json!({ "step": 1 }));
        let error = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32000, "message": "Tool crashed" }
        })
        .to_string();
        serve_stream(&mock_server, sse(&[&first, &error])).await;

        let err = rpc_client(&mock_server)
            .call(&endpoint(&mock_server), TOOLS_CALL, json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "rpc_remote");
        assert!(err.to_string().contains("Tool crashed"));
    }

    #[tokio::test]
    async fn test_last_event_fallback() {
        let mock_server = MockServer::start().await;
        serve_stream(
            &mock_server,
            sse(&[r#"{"progress": 10}"#, r#"{"progress": 100, "status": "done"}"#]),
        )
        .await;

        let result = rpc_client(&mock_server)
            .call(&endpoint(&mock_server), TOOLS_CALL, json!({}))
            .await
            .unwrap();

        assert_eq!(result.confidence, ResultConfidence::LastEventFallback);
        assert!(result.is_degraded());
        assert_eq!(result.payload["status"], "done");
    }

    #[tokio::test]
    async fn test_stream_of_comments_has_no_result() {
        let mock_server = MockServer::start().await;
        serve_stream(&mock_server, ": keep-alive\n\n: keep-alive\n\n".to_string()).await;

        let err = rpc_client(&mock_server)
            .call(&endpoint(&mock_server), TOOLS_CALL, json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "rpc_no_result");
    }

    #[tokio::test]
    async fn test_server_error_is_transport_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(RPC_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&mock_server)
            .await;

        let err = rpc_client(&mock_server)
            .call(&endpoint(&mock_server), TOOLS_CALL, json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "rpc_transport");
        assert!(err.to_string().contains("upstream exploded"));
    }

    #[tokio::test]
    async fn test_unanswered_call_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(RPC_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(sse(&[&result_event(1, json!("late"))]), "text/event-stream")
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let client = StreamingRpcClient::new(ToolRouterConfig {
            timeout_seconds: 1,
            ..config(&mock_server)
        })
        .unwrap();
        let err = client
            .call(&endpoint(&mock_server), TOOLS_CALL, json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "rpc_transport");
        assert!(err.to_string().contains("no response within 1s"));
    }

    #[tokio::test]
    async fn test_plain_json_answer() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(RPC_PATH))
            .and(body_partial_json(json!({ "jsonrpc": "2.0", "method": "tools/call" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": "x",
                "result": { "content": [{ "type": "text", "text": "ok" }] }
            })))
            .mount(&mock_server)
            .await;

        let result = rpc_client(&mock_server)
            .call(&endpoint(&mock_server), TOOLS_CALL, json!({}))
            .await
            .unwrap();

        assert_eq!(result.confidence, ResultConfidence::Explicit);
        assert_eq!(result.payload["content"][0]["text"], "ok");
        assert_eq!(result.frames_consumed, 1);
    }

    // Discovery over the wire

    #[tokio::test]
    async fn test_resolver_discovers_over_stream() {
        let mock_server = MockServer::start().await;

        let document = json!({
            "successful": true,
            "data": {
                "results": [{ "primary_tool_slugs": ["TRELLO_ADD_CARDS"] }],
                "toolkit_connection_statuses": [{ "toolkit": "trello", "has_active_connection": true }],
                "session": { "id": "sess_1" }
            }
        });
        let event = result_event(1, json!({ "content": [{ "type": "text", "text": document.to_string() }] }));

        Mock::given(method("POST"))
            .and(path(RPC_PATH))
            .and(body_partial_json(json!({
                "method": "tools/call",
                "params": {
                    "name": "COMPOSIO_SEARCH_TOOLS",
                    "arguments": { "queries": [{ "known_fields": "idList: list-1" }] }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse(&[&event]), "text/event-stream"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let rpc: Arc<dyn RpcCaller> = Arc::new(rpc_client(&mock_server));
        let resolver = ToolResolver::new(rpc, "COMPOSIO_SEARCH_TOOLS");
        let discovery = resolver
            .discover(&endpoint(&mock_server), "Create a new trello card", "idList: list-1")
            .await
            .unwrap();

        assert_eq!(discovery.session_id.as_deref(), Some("sess_1"));
        let tool = ToolResolver::select(&discovery.tools, "TRELLO_ADD_CARDS").unwrap();
        assert_eq!(tool.toolkit, "trello");
        ToolResolver::assert_connected(&discovery.connections, "Trello").unwrap();
    }

    #[tokio::test]
    async fn test_resolver_marks_fallback_discovery_degraded() {
        let mock_server = MockServer::start().await;

        let document = json!({
            "tools": [{ "slug": "TRELLO_ADD_CARDS", "toolkit": "trello" }],
            "toolkit_connection_statuses": [{ "toolkit": "trello", "active": true }]
        });
        // A bare JSON string carries neither a result nor content
        let bare = Value::String(document.to_string()).to_string();
        serve_stream(&mock_server, sse(&["{broken", &bare])).await;

        let rpc: Arc<dyn RpcCaller> = Arc::new(rpc_client(&mock_server));
        let resolver = ToolResolver::new(rpc, "COMPOSIO_SEARCH_TOOLS");
        let discovery = resolver
            .discover(&endpoint(&mock_server), "Create a new trello card", "")
            .await
            .unwrap();

        assert!(discovery.degraded);
        assert_eq!(discovery.malformed_events, 1);
        assert_eq!(discovery.slugs(), vec!["TRELLO_ADD_CARDS"]);
    }

    #[tokio::test]
    async fn test_resolver_rejects_non_json_discovery() {
        let mock_server = MockServer::start().await;
        let event = result_event(1, json!({ "content": [{ "type": "text", "text": "Search failed" }] }));
        serve_stream(&mock_server, sse(&[&event])).await;

        let rpc: Arc<dyn RpcCaller> = Arc::new(rpc_client(&mock_server));
        let resolver = ToolResolver::new(rpc, "COMPOSIO_SEARCH_TOOLS");
        let err = resolver
            .discover(&endpoint(&mock_server), "Create a new trello card", "")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "discovery_format");
    }

    // Single-tool REST execution

    #[tokio::test]
    async fn test_rest_execute_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v3/tools/execute/TRELLO_ADD_CARDS"))
            .and(header("x-api-key", "router_key"))
            .and(body_partial_json(json!({
                "user_id": "field-triage",
                "arguments": { "name": "Card" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "successful": true,
                "data": { "id": "card-9", "shortUrl": "https://trello.com/c/Zz9" },
                "error": null
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let executor = RestToolExecutor::new(config(&mock_server)).unwrap();
        let data = executor
            .execute("TRELLO_ADD_CARDS", json!({ "name": "Card" }))
            .await
            .unwrap();

        assert_eq!(data["id"], "card-9");
    }

    #[tokio::test]
    async fn test_rest_execute_reported_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/v3/tools/execute/TRELLO_ADD_CARDS"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "successful": false,
                "data": {},
                "error": "Connected account not found"
            })))
            .mount(&mock_server)
            .await;

        let executor = RestToolExecutor::new(config(&mock_server)).unwrap();
        let err = executor
            .execute("TRELLO_ADD_CARDS", json!({ "name": "Card" }))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "rpc_remote");
        assert!(err.to_string().contains("Connected account not found"));
    }
}
