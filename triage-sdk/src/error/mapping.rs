//! Error mapping for service-specific APIs
//!
//! Converts non-success responses from the generation, asset, ticketing and
//! tool-router backends into the normalized ServiceError type.

use reqwest::StatusCode;
use serde_json::Value;

use super::{ErrorContext, ServiceError};

/// Map a Gemini (Google API style) error body to a ServiceError
pub fn map_gemini_error(
    status: StatusCode,
    json: &Value,
    context: &mut ErrorContext,
) -> ServiceError {
    context.service = "gemini".to_string();

    let error = json.get("error").unwrap_or(json);

    if let Some(reason) = error.get("status").and_then(|s| s.as_str()) {
        context.error_code = Some(reason.to_string());
    }

    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown Gemini error");

    map_by_status(status, message)
}

/// Map a Cloudinary error body (`{"error": {"message": ...}}`)
pub fn map_cloudinary_error(
    status: StatusCode,
    json: &Value,
    context: &mut ErrorContext,
) -> ServiceError {
    context.service = "cloudinary".to_string();

    let message = json
        .pointer("/error/message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown Cloudinary error");

    ServiceError::upload_failed(format!("{} ({})", message, status))
}

/// Map a tool-router error body (`{"error": {"message", "code"}}` or `{"message"}`)
pub fn map_tool_router_error(
    status: StatusCode,
    json: &Value,
    context: &mut ErrorContext,
) -> ServiceError {
    context.service = "tool_router".to_string();

    let error = json.get("error").unwrap_or(json);

    if let Some(code) = error.get("code") {
        context.error_code = Some(code.to_string().trim_matches('"').to_string());
    }

    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .unwrap_or("Unknown tool router error");

    map_by_status(status, message)
}

fn map_by_status(status: StatusCode, message: &str) -> ServiceError {
    match status {
        StatusCode::UNAUTHORIZED => ServiceError::authentication(message),
        StatusCode::FORBIDDEN => ServiceError::authorization(message),
        StatusCode::TOO_MANY_REQUESTS => ServiceError::rate_limit(message),
        StatusCode::BAD_REQUEST => ServiceError::validation(message),
        StatusCode::NOT_FOUND => ServiceError::not_found(message),
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE => ServiceError::external_service(message),
        _ => ServiceError::service(message),
    }
}

/// Map a generic HTTP error to a ServiceError
pub fn map_http_error(status: StatusCode, body: &str, context: &mut ErrorContext) -> ServiceError {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        match context.service.as_str() {
            "gemini" => return map_gemini_error(status, &json, context),
            "cloudinary" => return map_cloudinary_error(status, &json, context),
            "tool_router" => return map_tool_router_error(status, &json, context),
            _ => {
                let message = json
                    .get("message")
                    .or_else(|| json.get("error"))
                    .and_then(|m| m.as_str())
                    .unwrap_or(body);

                return map_by_status(status, message);
            }
        }
    }

    // Trello answers with plain-text bodies such as "invalid token"
    let message = if body.is_empty() {
        status.to_string()
    } else if body.len() > 100 {
        format!("{}: {}", status, crate::util::truncate_string(body, 100))
    } else {
        format!("{}: {}", status, body)
    };

    map_by_status(status, &message)
}

/// Helper function to classify HTTP errors by category
pub fn classify_http_error(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "validation",
        401 => "authentication",
        403 => "authorization",
        404 => "not_found",
        408 => "timeout",
        429 => "rate_limit",
        500..=599 => "server",
        _ => "unknown",
    }
}

/// Determine if an HTTP status code indicates a retryable error
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}
