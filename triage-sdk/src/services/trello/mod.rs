//! Trello REST client
//!
//! Used by the direct ticket tier and by report listing. Credentials travel
//! as query parameters, so every transport error is stripped of its URL.

mod models;
pub use models::*;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::config::{ServiceConfig, TrelloConfig};
use crate::core::ServiceClient;
use crate::error::{Result, ServiceError};
use crate::pipeline::model::ReportSummary;
use crate::services::common::{build_http_client, parse_error_response, ClientMetrics, UserAgent};

pub struct TrelloClient {
    http_client: Client,
    config: TrelloConfig,
    metrics: ClientMetrics,
}

impl TrelloClient {
    pub fn new(config: TrelloConfig) -> Result<Self> {
        let http_client = build_http_client(
            Some(UserAgent::for_client("Trello-Client")),
            Some(Duration::from_secs(config.timeout_seconds)),
        )?;

        Ok(Self {
            http_client,
            config,
            metrics: ClientMetrics::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.query(&[
            ("key", self.config.api_key.as_str()),
            ("token", self.config.token.as_str()),
        ])
    }

    async fn send<R: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<R> {
        let start_time = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record(false, start_time.elapsed());
                return Err(e.into());
            }
        };

        if !response.status().is_success() {
            self.metrics.record(false, start_time.elapsed());
            return Err(parse_error_response("trello", response).await);
        }

        let parsed = response
            .json::<R>()
            .await
            .map_err(|e| ServiceError::parsing(format!("Failed to parse Trello response: {}", e.without_url())));
        self.metrics.record(parsed.is_ok(), start_time.elapsed());
        parsed
    }

    /// Create a card on the configured list
    pub async fn create_card(&self, name: &str, desc: &str) -> Result<Card> {
        self.config.validate()?;

        let url = self.url("/1/cards");
        debug!("Creating Trello card on list {}", self.config.list_id);

        let builder = self.authorized(self.http_client.post(&url)).query(&[
            ("idList", self.config.list_id.as_str()),
            ("name", name),
            ("desc", desc),
        ]);

        let card: Card = self.send(builder).await?;
        info!("Created Trello card {}", card.id);
        Ok(card)
    }

    /// Attach an external URL to an existing card
    pub async fn attach_url(&self, card_id: &str, attachment_url: &str) -> Result<Attachment> {
        self.config.validate()?;

        let url = self.url(&format!("/1/cards/{}/attachments", card_id));
        let builder = self
            .authorized(self.http_client.post(&url))
            .query(&[("url", attachment_url)]);

        self.send(builder).await
    }

    /// All cards on the configured list, with attachments
    pub async fn list_cards(&self) -> Result<Vec<Card>> {
        self.config.validate()?;

        let url = self.url(&format!("/1/lists/{}/cards", self.config.list_id));
        let builder = self
            .authorized(self.http_client.get(&url))
            .query(&[("attachments", "true")]);

        self.send(builder).await
    }

    /// Previously filed reports, in board order
    pub async fn list_reports(&self) -> Result<Vec<ReportSummary>> {
        let cards = self.list_cards().await?;
        Ok(cards.into_iter().map(ReportSummary::from).collect())
    }
}

#[async_trait]
impl ServiceClient for TrelloClient {
    fn name(&self) -> &str {
        "trello"
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
