//! Triage Gateway
//!
//! HTTP intake for field reports. A multipart submission is validated,
//! turned into a `Report` and run through the triage pipeline; the JSON
//! answer carries the ticket link, the classification and every diagnostic
//! collected on the way.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use triage_sdk::pipeline::{Classification, Diagnostic, ExecutionOutcome, Photo, Report, ReportSummary};
use triage_sdk::trello::TrelloClient;
use triage_sdk::{Orchestrator, ServiceClient, TicketTier, TriageConfig};

pub mod validation;

use validation::{
    payload_limit_config, validate_content_type, validate_machine_id, validate_report_text, ApiValidationError,
    ValidationErrorResponse, MAX_PAYLOAD_SIZE,
};

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

pub const SERVICE_NAME: &str = "triage-gateway";

/// Answer of `POST /api/triage`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageResponse {
    pub success: bool,
    pub message: String,
    pub ticket_url: Option<String>,
    pub ticket_id: Option<String>,
    pub classification: Classification,
    pub diagnostics: Vec<Diagnostic>,
}

impl From<&ExecutionOutcome> for TriageResponse {
    fn from(outcome: &ExecutionOutcome) -> Self {
        let message = match outcome.failure() {
            None => match outcome.ticket_url() {
                Some(url) => format!("Ticket created: {}", url),
                None => "Ticket created".to_string(),
            },
            Some(failure) => format!("Could not create a ticket: {}", failure.message),
        };

        Self {
            success: outcome.succeeded(),
            message,
            ticket_url: outcome.ticket_url().map(str::to_string),
            ticket_id: outcome.ticket_id().map(str::to_string),
            classification: outcome.classification().clone(),
            diagnostics: outcome.diagnostics().to_vec(),
        }
    }
}

/// Answer of `GET /api/reports`
#[derive(Debug, Serialize)]
pub struct ReportsResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<ReportSummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service_name: String,
    pub uptime_seconds: i64,
    pub status: String,
    pub ticket_tier: TicketTier,
}

/// Fields collected from the multipart form
#[derive(Debug, Default)]
struct Submission {
    text: Option<String>,
    machine_id: Option<String>,
    photo: Option<Photo>,
}

/// Gateway state shared by every handler
pub struct TriageGateway {
    orchestrator: Arc<Orchestrator>,
    reports: Option<Arc<TrelloClient>>,
}

impl TriageGateway {
    pub fn new(orchestrator: Arc<Orchestrator>, reports: Option<Arc<TrelloClient>>) -> Self {
        Lazy::force(&START_TIME);
        Self { orchestrator, reports }
    }

    /// Build the pipeline and the report lister from configuration
    pub fn from_config(config: &TriageConfig) -> triage_sdk::Result<Self> {
        let orchestrator = Arc::new(Orchestrator::from_config(config)?);
        let reports = Arc::new(TrelloClient::new(config.trello.clone())?);
        Ok(Self::new(orchestrator, Some(reports)))
    }

    /// Create the Axum router with all routes and middleware
    pub fn create_router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(Self::root_handler))
            .route("/health", get(Self::health_handler))
            .route("/api/triage", post(Self::triage_handler))
            .route("/api/reports", get(Self::reports_handler))
            .layer(middleware::from_fn(Self::validate_content_type_middleware))
            .layer(DefaultBodyLimit::max(MAX_PAYLOAD_SIZE))
            .layer(payload_limit_config())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .with_state(self)
    }

    async fn root_handler() -> impl IntoResponse {
        Json(serde_json::json!({
            "service": "Field Report Triage Gateway",
            "version": env!("CARGO_PKG_VERSION"),
            "endpoints": [
                "GET /health",
                "POST /api/triage",
                "GET /api/reports"
            ]
        }))
    }

    async fn health_handler(State(state): State<Arc<Self>>) -> impl IntoResponse {
        let uptime = START_TIME.elapsed().as_secs() as i64;

        let reports_healthy = match &state.reports {
            Some(reports) => reports.health_check().await.unwrap_or(false),
            None => false,
        };

        Json(HealthResponse {
            healthy: true,
            service_name: SERVICE_NAME.to_string(),
            uptime_seconds: uptime,
            status: if reports_healthy { "SERVING" } else { "DEGRADED" }.to_string(),
            ticket_tier: state.orchestrator.tier(),
        })
    }

    async fn triage_handler(State(state): State<Arc<Self>>, multipart: Multipart) -> Response {
        let report = match read_report(multipart).await {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!("Rejected triage request: {}", err);
                return err.to_response().into_response();
            }
        };

        tracing::info!(
            machine_id = report.machine_id().unwrap_or("-"),
            has_photo = report.photo().is_some(),
            "Triage request accepted"
        );

        let outcome = state.orchestrator.run(&report).await;
        let status = if outcome.succeeded() {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if let Some(failure) = outcome.failure() {
            tracing::error!(kind = %failure.kind, "Triage failed: {}", failure.message);
        }

        (status, Json(TriageResponse::from(&outcome))).into_response()
    }

    async fn reports_handler(State(state): State<Arc<Self>>) -> Response {
        let Some(reports) = &state.reports else {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ReportsResponse {
                    success: false,
                    data: None,
                    message: Some("Report listing is not configured".to_string()),
                }),
            )
                .into_response();
        };

        match reports.list_reports().await {
            Ok(data) => Json(ReportsResponse {
                success: true,
                data: Some(data),
                message: None,
            })
            .into_response(),
            Err(err) => {
                tracing::error!("Failed to list reports: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ReportsResponse {
                        success: false,
                        data: None,
                        message: Some(format!("Could not list reports: {}", err.root())),
                    }),
                )
                    .into_response()
            }
        }
    }

    async fn validate_content_type_middleware(
        req: Request<Body>,
        next: Next,
    ) -> Result<Response, (StatusCode, Json<ValidationErrorResponse>)> {
        if req.method() != Method::POST || req.uri().path() != "/api/triage" {
            return Ok(next.run(req).await);
        }

        validate_content_type(req.headers(), "multipart/form-data").map_err(|err| err.to_response())?;

        Ok(next.run(req).await)
    }
}

/// Drain the multipart form into a validated `Report`
async fn read_report(mut multipart: Multipart) -> Result<Report, ApiValidationError> {
    let mut submission = Submission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiValidationError::InvalidFormat(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "report" | "text" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiValidationError::InvalidFormat(e.body_text()))?;
                // `report` wins over its alias when both are sent
                if name == "report" || submission.text.is_none() {
                    submission.text = Some(value);
                }
            }
            "machineId" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiValidationError::InvalidFormat(e.body_text()))?;
                submission.machine_id = Some(value);
            }
            "photo" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| {
                    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                        ApiValidationError::PayloadTooLarge(e.body_text())
                    } else {
                        ApiValidationError::InvalidFormat(e.body_text())
                    }
                })?;

                if !bytes.is_empty() {
                    let mut photo = Photo::new(bytes.to_vec(), content_type);
                    if let Some(file_name) = file_name {
                        photo = photo.with_file_name(file_name);
                    }
                    submission.photo = Some(photo);
                }
            }
            other => tracing::debug!("Ignoring unknown form field '{}'", other),
        }
    }

    let text = validate_report_text(submission.text.as_deref())?;
    let machine_id = validate_machine_id(submission.machine_id.as_deref())?;

    let mut report = Report::new(text).map_err(|_| ApiValidationError::MissingText)?;
    if let Some(machine_id) = machine_id {
        report = report.with_machine_id(machine_id);
    }
    if let Some(photo) = submission.photo {
        report = report.with_photo(photo);
    }
    Ok(report)
}
