//! Triage Gateway Input Validation
//!
//! Request checks and text sanitization for the intake endpoint, applied
//! before a report reaches the pipeline.

use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Serialize;

/// Maximum request payload size (10 MiB); photos above the asset store's
/// own limit still get through here and are rejected at upload
pub const MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Longest machine identifier kept on a ticket
pub const MAX_MACHINE_ID_LEN: usize = 128;

/// Body of every 4xx answer
#[derive(Debug, Serialize)]
pub struct ValidationErrorResponse {
    pub success: bool,
    pub message: String,
}

/// Validation error for intake requests
#[derive(Debug, thiserror::Error)]
pub enum ApiValidationError {
    #[error("Invalid request format: {0}")]
    InvalidFormat(String),

    #[error("Content type must be {0}")]
    ContentType(String),

    #[error("Request payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("No report text provided")]
    MissingText,
}

impl ApiValidationError {
    /// Convert to HTTP status code and error response
    pub fn to_response(&self) -> (StatusCode, Json<ValidationErrorResponse>) {
        let status = match self {
            Self::InvalidFormat(_) | Self::MissingText => StatusCode::BAD_REQUEST,
            Self::ContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        };

        (
            status,
            Json(ValidationErrorResponse {
                success: false,
                message: self.to_string(),
            }),
        )
    }
}

/// Validate the Content-Type header
pub fn validate_content_type(headers: &HeaderMap, expected: &str) -> Result<(), ApiValidationError> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !content_type.starts_with(expected) {
        return Err(ApiValidationError::ContentType(format!(
            "Expected content type '{}', got '{}'",
            expected, content_type
        )));
    }

    Ok(())
}

/// Trim and strip control characters, keeping line breaks and tabs
pub fn sanitize_text(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|&c| !c.is_control() || c == '\n' || c == '\t' || c == '\r')
        .collect()
}

/// Report text must survive sanitization with something left
pub fn validate_report_text(raw: Option<&str>) -> Result<String, ApiValidationError> {
    let text = raw.map(sanitize_text).unwrap_or_default();
    if text.is_empty() {
        return Err(ApiValidationError::MissingText);
    }
    Ok(text)
}

/// Optional machine identifier: sanitized, single line, bounded
pub fn validate_machine_id(raw: Option<&str>) -> Result<Option<String>, ApiValidationError> {
    let Some(machine_id) = raw.map(sanitize_text).filter(|m| !m.is_empty()) else {
        return Ok(None);
    };

    if machine_id.contains(['\n', '\r']) {
        return Err(ApiValidationError::InvalidFormat(
            "machineId must be a single line".to_string(),
        ));
    }

    if machine_id.chars().count() > MAX_MACHINE_ID_LEN {
        return Err(ApiValidationError::InvalidFormat(format!(
            "machineId too long (max {} chars)",
            MAX_MACHINE_ID_LEN
        )));
    }

    Ok(Some(machine_id))
}

/// Generate middleware config for payload limits
pub fn payload_limit_config() -> tower_http::limit::RequestBodyLimitLayer {
    tower_http::limit::RequestBodyLimitLayer::new(MAX_PAYLOAD_SIZE)
}
