use crate::domain::model::{ChatRequest, DailyForecast, DateRange, SearchContext, WeatherSnapshot};
use crate::utils::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Incrementally delivered reply fragments, in arrival order. Finite and not restartable.
pub type TextStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One-shot completion, returns the whole reply.
    async fn complete(&self, request: ChatRequest) -> Result<String>;

    /// Opens a streaming completion; each item is one delta fragment.
    async fn stream(&self, request: ChatRequest) -> Result<TextStream>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchContext>;

    fn provider_name(&self) -> &str;
}

#[async_trait]
pub trait ForecastProvider: Send + Sync {
    async fn daily_forecast(&self, range: &DateRange) -> Result<Vec<DailyForecast>>;

    async fn current_snapshot(&self) -> Result<WeatherSnapshot>;
}
