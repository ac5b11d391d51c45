//! Mock tests for the Gemini client
//!
//! These tests use WireMock to simulate the generateContent endpoint and
//! verify that the client and the classifier interact with it correctly.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::GeminiConfig;
    use crate::core::{ServiceClient, TextGenerator};
    use crate::pipeline::{Category, Classifier, Severity};
    use crate::services::gemini::GeminiClient;

    fn create_test_client(mock_server: &MockServer) -> GeminiClient {
        GeminiClient::new(GeminiConfig {
            api_key: "mock_gemini_key".to_string(),
            base_url: mock_server.uri(),
            timeout_seconds: 5,
            ..GeminiConfig::default()
        })
        .expect("Failed to build Gemini client")
    }

    fn answer(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }],
            "modelVersion": "gemini-2.0-flash"
        })
    }

    #[tokio::test]
    async fn test_generate_sends_key_and_prompt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "mock_gemini_key"))
            .and(body_partial_json(json!({ "contents": [{ "parts": [{ "text": "hello" }] }] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("  hi there \n")))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let text = client.generate("hello").await.unwrap();

        assert_eq!(text, "hi there");
        assert_eq!(client.metrics().unwrap()["request_count"], "1");
    }

    #[tokio::test]
    async fn test_generate_without_candidates_is_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        assert_eq!(client.generate("hello").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_generate_maps_api_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": { "code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED" }
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let err = client.generate("hello").await.unwrap_err();

        assert_eq!(err.kind(), "authorization");
        assert_eq!(err.service_name(), Some("gemini"));
        assert_eq!(err.error_code(), Some("PERMISSION_DENIED"));
    }

    #[tokio::test]
    async fn test_generate_requires_api_key() {
        let client = GeminiClient::new(GeminiConfig::default()).unwrap();
        let err = client.generate("hello").await.unwrap_err();

        assert_eq!(err.kind(), "configuration");
        assert!(err.to_string().contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn test_classifier_over_gemini() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer(
                "```json\n{\"severity\": \"Critical\", \"category\": \"Electrical\", \"title\": \"Sparks from panel\"}\n```",
            )))
            .mount(&mock_server)
            .await;

        let classifier = Classifier::new(Arc::new(create_test_client(&mock_server)));
        let classification = classifier.classify("Sparks coming out of the control panel").await;

        assert_eq!(classification.severity, Severity::Critical);
        assert_eq!(classification.category, Category::Electrical);
        assert_eq!(classification.title, "Sparks from panel");
    }

    #[tokio::test]
    async fn test_classifier_degrades_on_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&mock_server)
            .await;

        let classifier = Classifier::new(Arc::new(create_test_client(&mock_server)));
        let result = classifier.classify_detailed("Hydraulic press leaking oil").await;

        assert!(result.degraded.is_some());
        assert_eq!(result.classification.severity, Severity::Minor);
        assert_eq!(result.classification.title, "Hydraulic press leaking oil");
    }
}
