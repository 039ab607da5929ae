use crate::domain::model::{Citation, SearchContext};
use crate::domain::ports::WebSearch;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const SERVICE: &str = "tavily";

#[derive(Debug, Clone)]
pub struct TavilyConfig {
    pub base_url: String,
    pub api_key: String,
    pub search_depth: String,
    pub max_results: u32,
    pub request_timeout: Duration,
}

pub struct TavilySearch {
    config: TavilyConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TavilySearchRequest<'a> {
    query: &'a str,
    search_depth: &'a str,
    include_answer: bool,
    include_raw_content: bool,
    include_images: bool,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    answer: Option<String>,
    #[serde(default)]
    results: Option<Vec<TavilyResult>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: Option<String>,
}

impl TavilySearch {
    pub fn new(config: TavilyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> Result<SearchContext> {
        let url = format!("{}/search", self.config.base_url.trim_end_matches('/'));
        let body = TavilySearchRequest {
            query,
            search_depth: &self.config.search_depth,
            include_answer: true,
            include_raw_content: false,
            include_images: false,
            max_results: self.config.max_results,
        };

        tracing::debug!("🔎 POST {} ({:?})", url, body);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let payload: TavilySearchResponse = response.json().await?;
        if let Some(error) = payload.error.as_ref().filter(|e| is_truthy(e)) {
            return Err(AppError::malformed(SERVICE, format!("search reported error: {}", error)));
        }

        let citations = payload
            .results
            .unwrap_or_default()
            .into_iter()
            .map(|result| Citation {
                title: result.title,
                url: result.url,
                content: result.content,
            })
            .collect();

        Ok(SearchContext {
            answer: payload.answer,
            citations,
        })
    }

    fn provider_name(&self) -> &str {
        "Tavily"
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
