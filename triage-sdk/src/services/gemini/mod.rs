//! Gemini text-generation client
//!
//! A thin client for the generateContent endpoint, used by the classifier
//! through the `TextGenerator` trait.

mod models;
pub use models::*;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;

use crate::config::{GeminiConfig, ServiceConfig};
use crate::core::{ServiceClient, TextGenerator};
use crate::error::{Result, ServiceError};
use crate::services::common::{build_http_client, parse_error_response, ClientMetrics, UserAgent};

/// Gemini API client
pub struct GeminiClient {
    http_client: Client,
    config: GeminiConfig,
    metrics: ClientMetrics,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http_client = build_http_client(
            Some(UserAgent::for_client("Gemini-Client")),
            Some(Duration::from_secs(config.timeout_seconds)),
        )?;

        Ok(Self {
            http_client,
            config,
            metrics: ClientMetrics::new(),
        })
    }

    /// Send a generateContent request
    pub async fn generate_content(&self, request: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        self.config.validate()?;

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        debug!("Sending request to Gemini: POST {}", url);

        let start_time = Instant::now();
        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record(false, start_time.elapsed());
                return Err(e.into());
            }
        };

        if !response.status().is_success() {
            self.metrics.record(false, start_time.elapsed());
            return Err(parse_error_response("gemini", response).await);
        }

        let parsed = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| ServiceError::parsing(format!("Failed to parse Gemini response: {}", e.without_url())));
        self.metrics.record(parsed.is_ok(), start_time.elapsed());
        parsed
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .generate_content(&GenerateContentRequest::from_prompt(prompt))
            .await?;

        let text = response.first_text();
        if text.is_empty() {
            warn!("Gemini returned no candidate text");
        }
        Ok(text)
    }
}

#[async_trait]
impl ServiceClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.config.validate().is_ok())
    }

    fn metrics(&self) -> Option<HashMap<String, String>> {
        Some(self.metrics.as_map())
    }
}
