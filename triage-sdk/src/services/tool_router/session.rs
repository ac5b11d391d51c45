//! Tool-router session creation

use std::time::Instant;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;

use super::models::{CreateSessionRequest, CreateSessionResponse, Integration, Session};
use crate::config::{ServiceConfig, ToolRouterConfig};
use crate::error::{Result, ServiceError};
use crate::services::common::{build_http_client, parse_error_response, ClientMetrics, UserAgent};

/// Opens sessions scoped to one owner and a set of required toolkits
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn create_session(&self, owner_id: &str, required_integrations: Vec<Integration>) -> Result<Session>;
}

pub struct SessionManager {
    http_client: Client,
    config: ToolRouterConfig,
    metrics: ClientMetrics,
}

impl SessionManager {
    pub fn new(config: ToolRouterConfig) -> Result<Self> {
        let http_client = build_http_client(
            Some(UserAgent::for_client("Tool-Router-Session")),
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

    async fn request_session(&self, owner_id: &str, integrations: &[Integration]) -> Result<CreateSessionResponse> {
        let url = format!(
            "{}/api/v3/labs/tool_router/session",
            self.config.base_url.trim_end_matches('/')
        );
        debug!("Creating tool router session: POST {}", url);

        let body = CreateSessionRequest {
            user_id: owner_id,
            toolkits: integrations,
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
            .json::<CreateSessionResponse>()
            .await
            .map_err(|e| ServiceError::parsing(format!("Unreadable session response: {}", e.without_url())))
    }
}

#[async_trait]
impl SessionProvider for SessionManager {
    async fn create_session(&self, owner_id: &str, required_integrations: Vec<Integration>) -> Result<Session> {
        self.config
            .validate()
            .map_err(|e| ServiceError::session_establishment(e.to_string()))?;

        let start_time = Instant::now();
        let response = self.request_session(owner_id, &required_integrations).await;
        self.metrics.record(response.is_ok(), start_time.elapsed());

        let response = response.map_err(|e| ServiceError::session_establishment(e.root().to_string()))?;

        let endpoint = response
            .endpoint()
            .ok_or_else(|| ServiceError::session_establishment("Session response carried no endpoint URL"))?
            .to_string();

        info!(
            "Opened tool router session {}",
            response.session_id.as_deref().unwrap_or("<unnamed>")
        );

        Ok(Session {
            id: response.session_id.clone(),
            endpoint,
            owner_id: owner_id.to_string(),
            required_integrations,
        })
    }
}
