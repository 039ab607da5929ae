use crate::domain::model::{CurrentConditions, DailyForecast, DateRange, WeatherSnapshot};
use crate::domain::ports::ForecastProvider;
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const SERVICE: &str = "visual-crossing";

#[derive(Debug, Clone)]
pub struct VisualCrossingConfig {
    pub base_url: String,
    pub api_key: String,
    pub location: String,
    pub unit_group: String,
    pub request_timeout: Duration,
}

/// Timeline API client; the location is encoded as a single path segment.
pub struct VisualCrossingWeather {
    config: VisualCrossingConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TimelineDays {
    #[serde(default)]
    days: Vec<DailyForecast>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimelineSnapshot {
    current_conditions: Option<CurrentConditions>,
    #[serde(default)]
    days: Vec<DailyForecast>,
}

impl VisualCrossingWeather {
    pub fn new(config: VisualCrossingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }

    fn timeline_url(&self, segments: &[&str], include: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url).map_err(|e| AppError::ConfigError {
            message: format!("Invalid weather base_url: {}", e),
        })?;
        url.path_segments_mut()
            .map_err(|_| AppError::ConfigError {
                message: "weather base_url cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .push(&self.config.location)
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("key", &self.config.api_key)
            .append_pair("unitGroup", &self.config.unit_group)
            .append_pair("include", include)
            .append_pair("contentType", "json");
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::debug!("🌤️ GET {}{}", url.origin().ascii_serialization(), url.path());

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ForecastProvider for VisualCrossingWeather {
    async fn daily_forecast(&self, range: &DateRange) -> Result<Vec<DailyForecast>> {
        let start = range.start_date.to_string();
        let end = range.end_date.to_string();
        let url = self.timeline_url(&[&start, &end], "days")?;
        let timeline: TimelineDays = self.fetch(url).await?;
        Ok(timeline.days)
    }

    async fn current_snapshot(&self) -> Result<WeatherSnapshot> {
        let url = self.timeline_url(&[], "current,days")?;
        let timeline: TimelineSnapshot = self.fetch(url).await?;
        let current = timeline
            .current_conditions
            .ok_or_else(|| AppError::malformed(SERVICE, "response has no currentConditions"))?;
        Ok(WeatherSnapshot {
            current,
            days: timeline.days,
        })
    }
}
