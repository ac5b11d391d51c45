//! Execution orchestrator
//!
//! Runs one report through classification, best-effort photo upload and the
//! configured ticket backend, and folds everything into one
//! `ExecutionOutcome`.

use std::sync::Arc;

use log::{error, info, warn};

use super::backends::{DirectBackend, DiscoveryBackend, SingleToolBackend};
use super::classifier::Classifier;
use super::model::{Diagnostic, ExecutionOutcome, Report, Stage, TicketDraft};
use crate::config::{TicketTier, TriageConfig};
use crate::core::{AssetStore, TicketBackend};
use crate::error::{Result, ServiceError};
use crate::services::cloudinary::CloudinaryClient;
use crate::services::gemini::GeminiClient;
use crate::services::trello::TrelloClient;

pub struct Orchestrator {
    classifier: Classifier,
    assets: Arc<dyn AssetStore>,
    folder: String,
    backend: Arc<dyn TicketBackend>,
}

impl Orchestrator {
    pub fn new(
        classifier: Classifier,
        assets: Arc<dyn AssetStore>,
        folder: impl Into<String>,
        backend: Arc<dyn TicketBackend>,
    ) -> Self {
        Self {
            classifier,
            assets,
            folder: folder.into(),
            backend,
        }
    }

    /// Wire the production clients, choosing the backend from `config.tier`
    pub fn from_config(config: &TriageConfig) -> Result<Self> {
        let classifier = Classifier::new(Arc::new(GeminiClient::new(config.gemini.clone())?));
        let assets = Arc::new(CloudinaryClient::new(config.cloudinary.clone())?);

        let backend: Arc<dyn TicketBackend> = match config.tier {
            TicketTier::Direct => Arc::new(DirectBackend::new(Arc::new(TrelloClient::new(config.trello.clone())?))),
            TicketTier::SingleTool => Arc::new(SingleToolBackend::from_config(&config.tool_router)?),
            TicketTier::Discovery => Arc::new(DiscoveryBackend::from_config(&config.tool_router)?),
        };

        info!("Ticket tier: {}", config.tier);
        Ok(Self::new(classifier, assets, config.cloudinary.folder.clone(), backend))
    }

    pub fn tier(&self) -> TicketTier {
        self.backend.tier()
    }

    /// Process one report. Only a ticket-creation failure makes the outcome
    /// unsuccessful.
    pub async fn run(&self, report: &Report) -> ExecutionOutcome {
        let mut diagnostics = Vec::new();

        let classified = self.classifier.classify_detailed(report.text()).await;
        if let Some(reason) = &classified.degraded {
            diagnostics.push(Diagnostic::warning(
                Stage::Classification,
                format!("Classification defaulted: {}", reason),
            ));
        }
        let classification = classified.classification;

        let attachment_url = match report.photo() {
            Some(photo) => match self.assets.upload(&photo.bytes, &photo.content_type, &self.folder).await {
                Ok(asset) => {
                    diagnostics.push(Diagnostic::info(Stage::Upload, format!("Photo uploaded as {}", asset.public_id)));
                    Some(asset.url)
                }
                Err(e) => {
                    warn!("Photo upload failed, continuing without attachment: {}", e);
                    diagnostics.push(Diagnostic::warning(
                        Stage::Upload,
                        format!("Photo not attached: {}", e.root()),
                    ));
                    None
                }
            },
            None => None,
        };

        let draft = TicketDraft::from_report(report, classification.clone(), attachment_url);

        match self.backend.create_ticket(&draft).await {
            Ok(receipt) => {
                info!(
                    "Ticket created via {} tier: {}",
                    self.backend.tier(),
                    receipt.url.as_deref().or(receipt.id.as_deref()).unwrap_or("(no reference)")
                );
                ExecutionOutcome::success(classification, receipt, diagnostics)
            }
            Err(e) => {
                error!("Ticket creation failed [{}]: {}", e.kind(), e);
                diagnostics.push(Diagnostic::error(stage_of(&e), e.root().to_string()));
                ExecutionOutcome::failed(classification, &e, diagnostics)
            }
        }
    }
}

/// Pipeline step a ticket-creation error belongs to
fn stage_of(error: &ServiceError) -> Stage {
    match error.root() {
        ServiceError::SessionEstablishment(_) => Stage::Session,
        ServiceError::DiscoveryFormat(_)
        | ServiceError::ToolNotFound { .. }
        | ServiceError::IntegrationNotConnected { .. } => Stage::Discovery,
        _ => Stage::Execution,
    }
}
