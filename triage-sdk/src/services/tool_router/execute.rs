//! Single-tool execution over the router's REST surface

use std::time::Instant;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde_json::Value;

use super::models::{ExecuteToolRequest, ExecuteToolResponse};
use crate::config::{ServiceConfig, ToolRouterConfig};
use crate::error::{Result, ServiceError};
use crate::services::common::{build_http_client, parse_error_response, ClientMetrics, UserAgent};

/// Executes one tool by slug and returns its `data`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, slug: &str, arguments: Value) -> Result<Value>;
}

pub struct RestToolExecutor {
    http_client: Client,
    config: ToolRouterConfig,
    metrics: ClientMetrics,
}

impl RestToolExecutor {
    pub fn new(config: ToolRouterConfig) -> Result<Self> {
        let http_client = build_http_client(
            Some(UserAgent::for_client("Tool-Router-Execute")),
            Some(config.timeout()),
        )?;

        Ok(Self {
            http_client,
            config,
            metrics: ClientMetrics::new(),
        })
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    async fn post(&self, slug: &str, arguments: &Value) -> Result<ExecuteToolResponse> {
        let url = format!(
            "{}/api/v3/tools/execute/{}",
            self.config.base_url.trim_end_matches('/'),
            slug
        );
        debug!("Executing tool {}: POST {}", slug, url);

        let body = ExecuteToolRequest {
            user_id: &self.config.user_id,
            arguments,
        };

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(parse_error_response("tool_router", response).await);
        }

        response
            .json::<ExecuteToolResponse>()
            .await
            .map_err(|e| ServiceError::parsing(format!("Unreadable tool execution response: {}", e.without_url())))
    }
}

#[async_trait]
impl ToolExecutor for RestToolExecutor {
    async fn execute(&self, slug: &str, arguments: Value) -> Result<Value> {
        self.config.validate()?;

        let start_time = Instant::now();
        let response = self.post(slug, &arguments).await;
        self.metrics
            .record(matches!(&response, Ok(r) if r.successful), start_time.elapsed());

        let response = response?;
        if !response.successful {
            let error = response
                .error
                .filter(|e| !e.is_null())
                .unwrap_or_else(|| Value::String(format!("Tool {} reported failure", slug)));
            return Err(ServiceError::rpc_remote(serde_json::json!({ "error": error, "data": response.data })));
        }

        info!("Tool {} executed", slug);
        Ok(response.data)
    }
}
