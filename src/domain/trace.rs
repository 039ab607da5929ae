//! Diagnostic snapshot attached to results outside production mode.

use crate::domain::model::{ClassificationResult, GenerationMode, Route};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugTrace {
    pub classification_model: String,
    pub response_model: String,
    pub route: Route,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_provider: Option<String>,
    pub stages: Vec<StageTiming>,
    pub steps: DebugSteps,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTiming {
    pub stage: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSteps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<ClassificationStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_search: Option<ExternalSearchStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_response: Option<FinalResponseStep>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationStep {
    pub model: String,
    pub response: ClassificationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalSearchStep {
    pub provider: String,
    pub query: String,
    pub status: SearchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub result_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    Ok,
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherStep {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub forecast: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalResponseStep {
    pub model: String,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_context: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub mode: GenerationMode,
    pub partial: bool,
}
