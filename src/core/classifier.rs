use crate::core::normalizer::strip_code_fence;
use crate::domain::model::{ChatMessage, ChatRequest, ClassificationResult, Route};
use crate::domain::ports::ChatModel;
use std::sync::Arc;
use std::time::Duration;

const CLASSIFIER_PROMPT: &str = r#"Classify whether this query needs external, real-time search data or can be answered using contextual AI alone.

Consider a query as requiring external search if it involves ANY of these aspects:
1. Time-sensitive information (events, schedules, "this weekend", "today", etc.)
2. Current status or conditions (wait times, operating hours, "right now", etc.)
3. Recent changes or updates (new openings, closures, etc.)
4. Specific dates or time periods in the near future
5. Real-time availability or capacity

Respond in JSON format with:
{
  "route": "EXTERNAL_SEARCH" or "AI_ONLY",
  "confidence": 0.0-1.0
}"#;

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ClassificationOutcome {
    pub result: ClassificationResult,
    pub raw_reply: Option<String>,
    pub fallback_reason: Option<String>,
}

impl ClassificationOutcome {
    fn fallback(raw_reply: Option<String>, reason: String) -> Self {
        tracing::warn!("🧭 Classification fell back to AI_ONLY: {}", reason);
        Self {
            result: ClassificationResult::fallback(),
            raw_reply,
            fallback_reason: Some(reason),
        }
    }
}

pub struct Classifier {
    model: Arc<dyn ChatModel>,
    settings: ClassifierSettings,
}

impl Classifier {
    pub fn new(model: Arc<dyn ChatModel>, settings: ClassifierSettings) -> Self {
        Self { model, settings }
    }

    pub fn model_name(&self) -> &str {
        &self.settings.model
    }

    /// Never fails: timeouts, transport errors and unparseable replies all yield AI_ONLY / 0.0.
    pub async fn classify(&self, query: &str, timeout: Duration) -> ClassificationOutcome {
        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage::system(CLASSIFIER_PROMPT),
                ChatMessage::user(query),
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let reply = match tokio::time::timeout(timeout, self.model.complete(request)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return ClassificationOutcome::fallback(None, e.to_string()),
            Err(_) => {
                return ClassificationOutcome::fallback(
                    None,
                    format!("Classification timeout after {}ms", timeout.as_millis()),
                )
            }
        };

        match parse_classification(&reply) {
            Ok(result) => {
                tracing::debug!(
                    "🧭 Classified as {:?} (confidence {:.2})",
                    result.route,
                    result.confidence
                );
                ClassificationOutcome {
                    result,
                    raw_reply: Some(reply),
                    fallback_reason: None,
                }
            }
            Err(reason) => ClassificationOutcome::fallback(Some(reply), reason),
        }
    }
}

fn parse_classification(reply: &str) -> std::result::Result<ClassificationResult, String> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(reply))
        .map_err(|e| format!("Classification reply is not JSON: {}", e))?;

    let route = value
        .get("route")
        .and_then(|v| v.as_str())
        .and_then(Route::parse)
        .ok_or_else(|| "Classification reply has no usable route".to_string())?;

    // confidence 缺少或型別錯誤時視為 0
    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);

    Ok(ClassificationResult::new(route, confidence))
}
