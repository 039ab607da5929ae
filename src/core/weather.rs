use crate::domain::model::{DailyForecast, DateRange};
use crate::domain::ports::ForecastProvider;
use std::sync::Arc;
use std::time::Duration;

pub const WEATHER_UNAVAILABLE: &str = "Weather data unavailable for the specified dates.";

/// Soft dependency: always yields text, never an error.
pub struct WeatherLookup {
    provider: Arc<dyn ForecastProvider>,
    label: String,
    unit_symbol: &'static str,
}

impl WeatherLookup {
    pub fn new(provider: Arc<dyn ForecastProvider>, label: impl Into<String>, unit_group: &str) -> Self {
        let unit_symbol = if unit_group.eq_ignore_ascii_case("us") {
            "°F"
        } else {
            "°C"
        };
        Self {
            provider,
            label: label.into(),
            unit_symbol,
        }
    }

    pub async fn fetch(&self, range: &DateRange, timeout: Duration) -> String {
        let days = match tokio::time::timeout(timeout, self.provider.daily_forecast(range)).await {
            Ok(Ok(days)) => days,
            Ok(Err(e)) => {
                tracing::warn!("🌧️ Weather lookup failed: {}", e);
                return WEATHER_UNAVAILABLE.to_string();
            }
            Err(_) => {
                tracing::warn!("🌧️ Weather lookup timed out after {:?}", timeout);
                return WEATHER_UNAVAILABLE.to_string();
            }
        };

        if days.is_empty() {
            tracing::warn!(
                "🌧️ No forecast days for {}..{}",
                range.start_date,
                range.end_date
            );
            return WEATHER_UNAVAILABLE.to_string();
        }

        self.format(&days)
    }

    fn format(&self, days: &[DailyForecast]) -> String {
        let lines: Vec<String> = days
            .iter()
            .map(|day| {
                format!(
                    "{}: {} ({}{} - {}{}), {}",
                    day.datetime,
                    day.conditions,
                    day.tempmin,
                    self.unit_symbol,
                    day.tempmax,
                    self.unit_symbol,
                    day.description
                )
            })
            .collect();

        format!("Weather forecast for {}:\n{}", self.label, lines.join("\n"))
    }
}
