//! Cloudinary asset store client
//!
//! Uploads report photos as base64 data URIs through the signed upload API
//! and returns their public HTTPS URL.

mod models;
pub use models::*;

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use log::{debug, info};
use reqwest::Client;
use sha2::{Digest, Sha256};

use crate::config::{CloudinaryConfig, ServiceConfig};
use crate::core::{AssetStore, ServiceClient, UploadedAsset};
use crate::error::{Result, ServiceError};
use crate::services::common::{build_http_client, parse_error_response, ClientMetrics, UserAgent};

/// Cloudinary client
pub struct CloudinaryClient {
    http_client: Client,
    config: CloudinaryConfig,
    metrics: ClientMetrics,
}

impl CloudinaryClient {
    pub fn new(config: CloudinaryConfig) -> Result<Self> {
        let http_client = build_http_client(
            Some(UserAgent::for_client("Cloudinary-Client")),
            Some(Duration::from_secs(config.timeout_seconds)),
        )?;

        Ok(Self {
            http_client,
            config,
            metrics: ClientMetrics::new(),
        })
    }

    /// Folder used when the caller has no preference
    pub fn default_folder(&self) -> &str {
        &self.config.folder
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/image/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.cloud_name,
            action
        )
    }

    /// Signed form parameters for `params`, which must exclude `file` and `api_key`
    fn signed_params(&self, mut params: BTreeMap<&'static str, String>) -> Vec<(&'static str, String)> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        params.insert("timestamp", timestamp);

        let signature = sign_params(&params, &self.config.api_secret);

        let mut form: Vec<(&'static str, String)> = params.into_iter().collect();
        form.push(("api_key", self.config.api_key.clone()));
        form.push(("signature", signature));
        form.push(("signature_algorithm", "sha256".to_string()));
        form
    }

    async fn post_form<R>(&self, action: &str, form: &[(&'static str, String)]) -> Result<R>
    where
        R: serde::de::DeserializeOwned,
    {
        let url = self.endpoint(action);
        debug!("Sending request to Cloudinary: POST {}", url);

        let start_time = Instant::now();
        let response = match self.http_client.post(&url).form(form).send().await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record(false, start_time.elapsed());
                return Err(ServiceError::upload_failed(ServiceError::from(e).to_string()));
            }
        };

        if !response.status().is_success() {
            self.metrics.record(false, start_time.elapsed());
            return Err(parse_error_response("cloudinary", response).await);
        }

        let parsed = response
            .json::<R>()
            .await
            .map_err(|e| ServiceError::upload_failed(format!("Unreadable Cloudinary response: {}", e.without_url())));
        self.metrics.record(parsed.is_ok(), start_time.elapsed());
        parsed
    }
}

/// SHA-256 over `k1=v1&k2=v2...` (keys sorted) followed by the API secret
pub(crate) fn sign_params(params: &BTreeMap<&'static str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl AssetStore for CloudinaryClient {
    async fn upload(&self, bytes: &[u8], content_type: &str, folder: &str) -> Result<UploadedAsset> {
        self.config
            .validate()
            .map_err(|e| ServiceError::upload_failed(e.to_string()))?;

        if bytes.is_empty() {
            return Err(ServiceError::upload_failed("Photo is empty"));
        }

        if bytes.len() as u64 > self.config.max_upload_bytes {
            return Err(ServiceError::upload_failed(format!(
                "Photo is {} bytes, limit is {} bytes",
                bytes.len(),
                self.config.max_upload_bytes
            )));
        }

        let folder = if folder.trim().is_empty() { &self.config.folder } else { folder };

        let mut params = BTreeMap::new();
        params.insert("folder", folder.to_string());
        let mut form = self.signed_params(params);

        let data_uri = format!(
            "data:{};base64,{}",
            content_type,
            base64::engine::general_purpose::STANDARD.encode(bytes)
        );
        form.push(("file", data_uri));

        let response: UploadResponse = self.post_form("upload", &form).await?;
        let url = response
            .public_url()
            .ok_or_else(|| ServiceError::upload_failed("Cloudinary response carried no URL"))?
            .to_string();

        info!("Uploaded asset {} ({} bytes)", response.public_id, bytes.len());

        Ok(UploadedAsset {
            url,
            public_id: response.public_id,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<()> {
        self.config.validate()?;

        let mut params = BTreeMap::new();
        params.insert("public_id", public_id.to_string());
        let form = self.signed_params(params);

        let response: DestroyResponse = self.post_form("destroy", &form).await?;
        match response.result.as_str() {
            "ok" => Ok(()),
            "not found" => Err(ServiceError::not_found(format!("Asset {} not found", public_id))),
            other => Err(ServiceError::external_service(format!(
                "Cloudinary refused to delete {}: {}",
                public_id, other
            ))),
        }
    }
}

#[async_trait]
impl ServiceClient for CloudinaryClient {
    fn name(&self) -> &str {
        "cloudinary"
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
