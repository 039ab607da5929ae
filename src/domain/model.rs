use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
    ExternalSearch,
    AiOnly,
}

impl Route {
    pub fn needs_external_search(self) -> bool {
        matches!(self, Route::ExternalSearch)
    }

    /// 模型回覆的 route 字串，大小寫與底線/連字號不敏感
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "EXTERNAL_SEARCH" => Some(Route::ExternalSearch),
            "AI_ONLY" => Some(Route::AiOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub route: Route,
    pub confidence: f64,
}

impl ClassificationResult {
    /// Confidence is clamped into `[0, 1]`; NaN collapses to zero.
    pub fn new(route: Route, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self { route, confidence }
    }

    pub fn fallback() -> Self {
        Self {
            route: Route::AiOnly,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start_date: date,
            end_date: date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchContext {
    pub answer: Option<String>,
    pub citations: Vec<Citation>,
}

impl SearchContext {
    /// 可放入 prompt 的摘要文字，空白視為沒有
    pub fn prompt_text(&self) -> Option<&str> {
        self.answer
            .as_deref()
            .map(str::trim)
            .filter(|answer| !answer.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(SearchContext),
    Unavailable { reason: String },
}

impl SearchOutcome {
    pub fn context(&self) -> Option<&SearchContext> {
        match self {
            SearchOutcome::Found(context) => Some(context),
            SearchOutcome::Unavailable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub datetime: String,
    pub tempmax: f64,
    pub tempmin: f64,
    #[serde(default)]
    pub temp: Option<f64>,
    #[serde(default)]
    pub conditions: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temp: f64,
    #[serde(default)]
    pub feelslike: Option<f64>,
    #[serde(default)]
    pub conditions: String,
    #[serde(default)]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub current: CurrentConditions,
    pub days: Vec<DailyForecast>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Batch,
    Stream,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}
