//! Typed answers returned to callers.
//!
//! The generator is asked to pick exactly one of five JSON shapes; the `type`
//! field is the discriminator. `Error` is produced only by the orchestrator.

use crate::domain::model::Citation;
use crate::domain::trace::DebugTrace;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeneratedAnswer {
    Information(InformationAnswer),
    News(NewsAnswer),
    Recommendations(RecommendationsAnswer),
    Reviews(ReviewsAnswer),
    Directions(DirectionsAnswer),
    Error(ErrorAnswer),
}

impl GeneratedAnswer {
    pub fn information(content: impl Into<String>) -> Self {
        GeneratedAnswer::Information(InformationAnswer {
            content: content.into(),
            steps: Vec::new(),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GeneratedAnswer::Information(_) => "information",
            GeneratedAnswer::News(_) => "news",
            GeneratedAnswer::Recommendations(_) => "recommendations",
            GeneratedAnswer::Reviews(_) => "reviews",
            GeneratedAnswer::Directions(_) => "directions",
            GeneratedAnswer::Error(_) => "error",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            GeneratedAnswer::Information(a) => &a.content,
            GeneratedAnswer::News(a) => &a.content,
            GeneratedAnswer::Recommendations(a) => &a.content,
            GeneratedAnswer::Reviews(a) => &a.content,
            GeneratedAnswer::Directions(a) => &a.content,
            GeneratedAnswer::Error(a) => &a.content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InformationAnswer {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsAnswer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_live: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationsAnswer {
    pub content: String,
    #[serde(default)]
    pub items: Vec<RecommendationItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewsAnswer {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub transport: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOption {
    #[serde(rename = "type")]
    pub label: String,
    #[serde(default)]
    pub steps: Vec<RouteStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionsAnswer {
    pub content: String,
    #[serde(default)]
    pub options: Vec<RouteOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    pub error_message: String,
    pub error_code: String,
    pub error_status: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnswer {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,
}

/// Wire shape of `POST /search`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub answer: GeneratedAnswer,
    pub is_external_search: bool,
    pub citations: Vec<Citation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugTrace>,
}

impl SearchResult {
    pub fn is_error(&self) -> bool {
        matches!(self.answer, GeneratedAnswer::Error(_))
    }
}
