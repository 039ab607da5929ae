//! HTTP surface: `POST /search`, `GET /weather`, `GET /health`.

use crate::core::Orchestrator;
use crate::domain::answer::SearchResult;
use crate::domain::model::WeatherSnapshot;
use crate::domain::ports::ForecastProvider;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tower_http::trace::TraceLayer;

const FORECAST_DAYS: usize = 14;

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub forecast: Arc<dyn ForecastProvider>,
    pub weather_refresh: Duration,
    weather_cache: RwLock<Option<CachedWeather>>,
}

struct CachedWeather {
    fetched_at: Instant,
    report: WeatherReport,
}

impl CachedWeather {
    fn fresh(&self, refresh: Duration) -> Option<WeatherReport> {
        (self.fetched_at.elapsed() < refresh).then(|| self.report.clone())
    }
}

impl AppState {
    pub fn new(
        orchestrator: Orchestrator,
        forecast: Arc<dyn ForecastProvider>,
        weather_refresh: Duration,
    ) -> Self {
        Self {
            orchestrator,
            forecast,
            weather_refresh,
            weather_cache: RwLock::new(None),
        }
    }

    async fn weather_report(&self) -> crate::utils::error::Result<WeatherReport> {
        if let Some(report) = self.fresh_weather(self.weather_cache.read().await.as_ref()) {
            tracing::debug!("🌤️ Serving cached weather from {}", report.updated_at);
            return Ok(report);
        }

        // 持有寫入鎖期間更新，同時錯過快取的請求只會呼叫供應商一次
        let mut cache = self.weather_cache.write().await;
        if let Some(report) = self.fresh_weather(cache.as_ref()) {
            return Ok(report);
        }

        let snapshot = self.forecast.current_snapshot().await?;
        let report = WeatherReport::from_snapshot(&snapshot, Utc::now());
        *cache = Some(CachedWeather {
            fetched_at: Instant::now(),
            report: report.clone(),
        });
        tracing::info!("🌤️ Weather refreshed: {}° {}", report.temperature, report.conditions);
        Ok(report)
    }

    fn fresh_weather(&self, cached: Option<&CachedWeather>) -> Option<WeatherReport> {
        cached.and_then(|cached| cached.fresh(self.weather_refresh))
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub date: String,
    pub temperature: i64,
    pub conditions: String,
    pub forecast: Vec<ForecastDay>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastDay {
    pub date: String,
    pub temperature: i64,
    pub conditions: String,
}

impl WeatherReport {
    pub fn from_snapshot(snapshot: &WeatherSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            date: now.date_naive().to_string(),
            temperature: round_half_up(snapshot.current.temp),
            conditions: snapshot.current.conditions.clone(),
            forecast: snapshot
                .days
                .iter()
                .take(FORECAST_DAYS)
                .map(|day| ForecastDay {
                    date: day.datetime.clone(),
                    temperature: round_half_up((day.tempmax + day.tempmin) / 2.0),
                    conditions: day.conditions.clone(),
                })
                .collect(),
            updated_at: now,
        }
    }
}

// .5 一律往正無窮方向進位
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/search", post(search))
        .route("/weather", get(weather))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn run(state: AppState, addr: &str) -> anyhow::Result<()> {
    let app = router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("🌐 Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
    }
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResult>, (StatusCode, Json<serde_json::Value>)> {
    let query = request
        .query
        .as_deref()
        .map(str::trim)
        .filter(|query| !query.is_empty())
        .ok_or_else(|| {
            tracing::warn!("⚠️ Rejected search request without a query");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Query is required"})),
            )
        })?;

    Ok(Json(state.orchestrator.run(query).await))
}

async fn weather(State(state): State<Arc<AppState>>) -> Response {
    match state.weather_report().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            tracing::error!("❌ Weather API error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to fetch weather data"})),
            )
                .into_response()
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
