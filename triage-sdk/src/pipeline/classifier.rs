//! Report classification
//!
//! The generator's answer is free-form text. The classifier pulls the first
//! well-formed JSON object out of it and maps the fields it recognizes; it
//! never fails.

use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;

use super::model::{fallback_title, Category, Classification, Severity};
use crate::core::TextGenerator;
use crate::util::{sanitize_for_logging, truncate_string};

/// Prompt sent to the generator. `{report}` is replaced with the report text.
const PROMPT_TEMPLATE: &str = r#"You are a maintenance triage assistant for a manufacturing floor.
Classify the field report below.

Respond with a single JSON object and nothing else, using exactly these keys:
{"severity": "Critical" | "Major" | "Minor", "category": "Mechanical" | "Electrical" | "Software" | "Other", "title": "<short summary, at most 8 words>"}

Report:
"""
{report}
""""#;

/// Classification plus the reason it fell back to defaults, if it did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub classification: Classification,
    pub degraded: Option<String>,
}

pub struct Classifier {
    generator: Arc<dyn TextGenerator>,
}

impl Classifier {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Classify a report; falls back to defaults on any problem
    pub async fn classify(&self, report_text: &str) -> Classification {
        self.classify_detailed(report_text).await.classification
    }

    /// Like `classify`, but says why defaults were used
    pub async fn classify_detailed(&self, report_text: &str) -> ClassificationResult {
        let answer = match self.generator.generate(&build_prompt(report_text)).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Classification request failed, using defaults: {}", e);
                return degraded(report_text, format!("generation failed: {}", e.root()));
            }
        };

        debug!(
            "Classifier answer: {}",
            sanitize_for_logging(&truncate_string(&answer, 300))
        );

        match extract_first_json_object(&answer) {
            Some(object) => ClassificationResult {
                classification: classification_from_value(&object, report_text),
                degraded: None,
            },
            None => {
                warn!("No JSON object in classifier answer, using defaults");
                degraded(report_text, "no JSON object in generator answer".to_string())
            }
        }
    }
}

fn degraded(report_text: &str, reason: String) -> ClassificationResult {
    ClassificationResult {
        classification: Classification::fallback(report_text),
        degraded: Some(reason),
    }
}

/// The instruction prompt with the report embedded verbatim
pub fn build_prompt(report_text: &str) -> String {
    PROMPT_TEMPLATE.replace("{report}", report_text)
}

/// First `{` offset at which a complete JSON object deserializes
pub fn extract_first_json_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(offset, _)| {
        let mut objects = serde_json::Deserializer::from_str(&text[offset..]).into_iter::<Value>();
        match objects.next() {
            Some(Ok(value)) if value.is_object() => Some(value),
            _ => None,
        }
    })
}

/// Total mapping from an arbitrary JSON object to a classification
pub fn classification_from_value(value: &Value, report_text: &str) -> Classification {
    let severity = value
        .get("severity")
        .and_then(Value::as_str)
        .map(Severity::parse_lenient)
        .unwrap_or_default();

    let category = value
        .get("category")
        .and_then(Value::as_str)
        .map(Category::parse_lenient)
        .unwrap_or_default();

    let title = value
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| fallback_title(report_text));

    Classification {
        severity,
        category,
        title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MockTextGenerator;
    use crate::error::ServiceError;
    use serde_json::json;

    fn classifier_answering(answer: &'static str) -> Classifier {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .returning(move |_| Ok(answer.to_string()));
        Classifier::new(Arc::new(generator))
    }

    #[test]
    fn test_extract_skips_non_json_braces() {
        let text = "Sure! {not json} here you go: {\"severity\": \"Major\"} and {\"x\": 1}";
        assert_eq!(extract_first_json_object(text), Some(json!({"severity": "Major"})));
    }

    #[test]
    fn test_extract_handles_nested_objects() {
        let text = "```json\n{\"title\": \"a {b}\", \"meta\": {\"k\": 1}}\n```";
        let value = extract_first_json_object(text).unwrap();
        assert_eq!(value["title"], "a {b}");
        assert_eq!(value["meta"]["k"], 1);
    }

    #[test]
    fn test_extract_none_without_object() {
        assert!(extract_first_json_object("no braces here").is_none());
        assert!(extract_first_json_object("{ unterminated").is_none());
    }

    #[test]
    fn test_prompt_embeds_report_verbatim() {
        let report = "Valve \"A\" leaking\n{\"severity\": \"Critical\"}";
        let prompt = build_prompt(report);
        assert!(prompt.contains(report));
        assert!(prompt.contains("\"\"\"\nValve"));
    }

    #[tokio::test]
    async fn test_classify_maps_fields_case_insensitively() {
        let classifier = classifier_answering(
            "Here is the result:\n{\"severity\": \"critical\", \"category\": \"ELECTRICAL\", \"title\": \" Breaker tripped \"}",
        );

        let classification = classifier.classify("The main breaker tripped twice").await;
        assert_eq!(classification.severity, Severity::Critical);
        assert_eq!(classification.category, Category::Electrical);
        assert_eq!(classification.title, "Breaker tripped");
    }

    #[tokio::test]
    async fn test_classify_partial_object_uses_field_defaults() {
        let classifier = classifier_answering("{\"severity\": \"Major\", \"category\": \"Plumbing\"}");

        let result = classifier.classify_detailed("Coolant pump is noisy").await;
        assert!(result.degraded.is_none());
        assert_eq!(result.classification.severity, Severity::Major);
        assert_eq!(result.classification.category, Category::General);
        assert_eq!(result.classification.title, "Coolant pump is noisy");
    }

    #[tokio::test]
    async fn test_classify_without_json_returns_exact_default() {
        let report = "Conveyor belt on line 3 is making a grinding noise near the motor";
        let classifier = classifier_answering("I could not classify this report.");

        let result = classifier.classify_detailed(report).await;
        assert!(result.degraded.is_some());
        assert_eq!(
            result.classification,
            Classification {
                severity: Severity::Minor,
                category: Category::General,
                title: report.chars().take(40).collect(),
            }
        );
    }

    #[tokio::test]
    async fn test_classify_generator_error_degrades() {
        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Err(ServiceError::timeout("generation timed out")));
        let classifier = Classifier::new(Arc::new(generator));

        let result = classifier.classify_detailed("Screen is blank").await;
        assert_eq!(result.classification, Classification::fallback("Screen is blank"));
        assert!(result.degraded.unwrap().contains("generation failed"));
    }

    #[tokio::test]
    async fn test_classify_is_idempotent() {
        let classifier = classifier_answering("{\"severity\": \"Minor\", \"category\": \"Software\", \"title\": \"HMI freeze\"}");
        let first = classifier.classify("HMI froze").await;
        let second = classifier.classify("HMI froze").await;
        assert_eq!(first, second);
        assert!(!first.title.is_empty());
    }
}
