//! Core abstractions for the triage SDK
//!
//! The pipeline only talks to its collaborators through these traits:
//!
//! - `ServiceClient`: identity, health and metrics shared by every HTTP client
//! - `TextGenerator`: free-form text generation used by the classifier
//! - `AssetStore`: "upload bytes, get a URL"
//! - `TicketBackend`: one of the three ticket-creation tiers
//! - `ClientBuilder`: builder for the underlying HTTP clients

pub mod builder;
pub use builder::ClientBuilder;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::TicketTier;
use crate::error::Result;
use crate::pipeline::model::{TicketDraft, TicketReceipt};

/// Base trait for all service clients
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// The client name/identifier
    fn name(&self) -> &str;

    /// The base URL for the service
    fn base_url(&self) -> &str;

    /// Cheap reachability/configuration probe
    async fn health_check(&self) -> Result<bool>;

    /// Returns the client's request counters
    fn metrics(&self) -> Option<HashMap<String, String>>;
}

/// Text-generation backend. Output carries no schema guarantee.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// A stored asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAsset {
    /// Stable public HTTPS URL
    pub url: String,
    pub public_id: String,
}

/// Binary asset storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn upload(&self, bytes: &[u8], content_type: &str, folder: &str) -> Result<UploadedAsset>;

    async fn delete(&self, public_id: &str) -> Result<()>;
}

/// Creates a ticket from a prepared draft.
///
/// Implementations must not fail because an attachment could not be added;
/// that is reported through `TicketReceipt::diagnostics` instead.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketBackend: Send + Sync {
    fn tier(&self) -> TicketTier;

    async fn create_ticket(&self, draft: &TicketDraft) -> Result<TicketReceipt>;
}
