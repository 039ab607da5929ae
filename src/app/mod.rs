pub mod server;

use crate::adapters::{
    OpenAiChatModel, OpenAiConfig, TavilyConfig, TavilySearch, VisualCrossingConfig,
    VisualCrossingWeather,
};
use crate::config::AppConfig;
use crate::core::classifier::Classifier;
use crate::core::generator::ResponseGenerator;
use crate::core::search::ExternalSearchClient;
use crate::core::weather::WeatherLookup;
use crate::core::Orchestrator;
use crate::domain::ports::{ChatModel, ForecastProvider, WebSearch};
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// The three outbound dependencies, shared by every run.
#[derive(Clone)]
pub struct Providers {
    pub chat: Arc<dyn ChatModel>,
    pub search: Arc<dyn WebSearch>,
    pub forecast: Arc<dyn ForecastProvider>,
}

impl Providers {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let chat = OpenAiChatModel::new(OpenAiConfig {
            base_url: config.llm.base_url.clone(),
            api_key: config.llm.api_key.clone(),
            request_timeout: Duration::from_secs(config.llm.request_timeout_secs),
        })?;
        let search = TavilySearch::new(TavilyConfig {
            base_url: config.search.base_url.clone(),
            api_key: config.search.api_key.clone(),
            search_depth: config.search.search_depth.clone(),
            max_results: config.search.max_results,
            request_timeout: Duration::from_secs(config.search.request_timeout_secs),
        })?;
        let forecast = VisualCrossingWeather::new(VisualCrossingConfig {
            base_url: config.weather.base_url.clone(),
            api_key: config.weather.api_key.clone(),
            location: config.weather.location.clone(),
            unit_group: config.weather.unit_group.clone(),
            request_timeout: Duration::from_secs(config.weather.request_timeout_secs),
        })?;

        Ok(Self {
            chat: Arc::new(chat),
            search: Arc::new(search),
            forecast: Arc::new(forecast),
        })
    }
}

pub fn build_orchestrator(config: &AppConfig, providers: &Providers) -> Orchestrator {
    Orchestrator::new(
        config.orchestrator_settings(),
        Classifier::new(providers.chat.clone(), config.classifier_settings()),
        WeatherLookup::new(
            providers.forecast.clone(),
            config.weather.label.clone(),
            &config.weather.unit_group,
        ),
        ExternalSearchClient::new(providers.search.clone()),
        ResponseGenerator::new(providers.chat.clone(), config.generation_settings()),
    )
}
