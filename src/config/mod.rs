#[cfg(feature = "cli")]
pub mod cli;

use crate::core::classifier::ClassifierSettings;
use crate::core::generator::GenerationSettings;
use crate::core::orchestrator::OrchestratorSettings;
use crate::domain::model::GenerationMode;
use crate::utils::error::{AppError, Result};
use crate::utils::validation::{self, Validate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

lazy_static! {
    static ref ENV_VAR: Regex = Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern");
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub llm: LlmConfig,
    pub classification: ClassificationConfig,
    pub generation: GenerationConfig,
    pub search: SearchConfig,
    pub weather: WeatherConfig,
    pub budget: BudgetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub city: String,
    pub bind: String,
    /// 正式環境不回傳 debug 追蹤資訊
    pub production: bool,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub classification_model: String,
    pub response_model: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub mode: GenerationMode,
    pub temperature: f32,
    pub batch_max_tokens: u32,
    pub stream_max_tokens: u32,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key: String,
    pub search_depth: String,
    pub max_results: u32,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub api_key: String,
    pub location: String,
    /// 出現在天氣摘要標題中的名稱
    pub label: String,
    pub unit_group: String,
    pub refresh_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub total_ms: u64,
    pub stage_timeout_ms: u64,
    pub min_generation_ms: u64,
}

/// 金鑰在日誌中只顯示是否已設定
pub(crate) fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("classification_model", &self.classification_model)
            .field("response_model", &self.response_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("search_depth", &self.search_depth)
            .field("max_results", &self.max_results)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl fmt::Debug for WeatherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("location", &self.location)
            .field("label", &self.label)
            .field("unit_group", &self.unit_group)
            .field("refresh_secs", &self.refresh_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            city: "NYC".to_string(),
            bind: "127.0.0.1:3000".to_string(),
            production: false,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            classification_model: "gpt-4".to_string(),
            response_model: "gpt-4".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 50,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            mode: GenerationMode::Stream,
            temperature: 0.7,
            batch_max_tokens: 500,
            stream_max_tokens: 1000,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tavily.com".to_string(),
            api_key: String::new(),
            search_depth: "advanced".to_string(),
            max_results: 5,
            request_timeout_secs: 30,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline"
                .to_string(),
            api_key: String::new(),
            location: "New York City".to_string(),
            label: "NYC".to_string(),
            unit_group: "us".to_string(),
            refresh_secs: 600,
            request_timeout_secs: 30,
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            total_ms: 8000,
            stage_timeout_ms: 10_000,
            min_generation_ms: 1000,
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置，缺少的欄位使用預設值
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content);
        toml::from_str(&processed).map_err(|e| AppError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 檔案不存在時退回預設值，金鑰仍可由環境變數提供
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            tracing::info!("📄 Loading configuration from {}", path.display());
            Self::from_file(path)
        } else {
            tracing::warn!(
                "📄 {} not found, using defaults and environment variables",
                path.display()
            );
            let mut config = Self::default();
            config.apply_env_keys();
            Ok(config)
        }
    }

    /// 以環境變數補上空白的 API 金鑰
    pub fn apply_env_keys(&mut self) {
        fill_from_env(&mut self.llm.api_key, "OPENAI_API_KEY");
        fill_from_env(&mut self.search.api_key, "TAVILY_API_KEY");
        fill_from_env(&mut self.weather.api_key, "WEATHER_API_KEY");
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            total_budget: Duration::from_millis(self.budget.total_ms),
            stage_timeout: Duration::from_millis(self.budget.stage_timeout_ms),
            min_generation_budget: Duration::from_millis(self.budget.min_generation_ms),
            mode: self.generation.mode,
            include_debug: !self.service.production,
        }
    }

    pub fn classifier_settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            model: self.llm.classification_model.clone(),
            temperature: self.classification.temperature,
            max_tokens: self.classification.max_tokens,
        }
    }

    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            model: self.llm.response_model.clone(),
            city: self.service.city.clone(),
            temperature: self.generation.temperature,
            batch_max_tokens: self.generation.batch_max_tokens,
            stream_max_tokens: self.generation.stream_max_tokens,
        }
    }

    pub fn weather_refresh(&self) -> Duration {
        Duration::from_secs(self.weather.refresh_secs)
    }
}

/// 替換環境變數 (例如 ${OPENAI_API_KEY})，未設定的變數保持原樣
fn substitute_env_vars(content: &str) -> String {
    ENV_VAR
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
}

fn fill_from_env(target: &mut String, var_name: &str) {
    if target.trim().is_empty() {
        if let Ok(value) = std::env::var(var_name) {
            *target = value;
        }
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("service.city", &self.service.city)?;
        validation::validate_socket_addr("service.bind", &self.service.bind)?;

        validation::validate_url("llm.base_url", &self.llm.base_url)?;
        validation::validate_non_empty_string("llm.classification_model", &self.llm.classification_model)?;
        validation::validate_non_empty_string("llm.response_model", &self.llm.response_model)?;
        validation::validate_positive_number("llm.request_timeout_secs", self.llm.request_timeout_secs, 1)?;

        validation::validate_range("classification.temperature", self.classification.temperature, 0.0, 2.0)?;
        validation::validate_positive_number(
            "classification.max_tokens",
            self.classification.max_tokens as u64,
            1,
        )?;

        validation::validate_range("generation.temperature", self.generation.temperature, 0.0, 2.0)?;
        validation::validate_positive_number(
            "generation.batch_max_tokens",
            self.generation.batch_max_tokens as u64,
            1,
        )?;
        validation::validate_positive_number(
            "generation.stream_max_tokens",
            self.generation.stream_max_tokens as u64,
            1,
        )?;

        validation::validate_url("search.base_url", &self.search.base_url)?;
        let valid_depths = ["basic", "advanced"];
        if !valid_depths.contains(&self.search.search_depth.as_str()) {
            return Err(AppError::InvalidConfigValueError {
                field: "search.search_depth".to_string(),
                value: self.search.search_depth.clone(),
                reason: format!("Valid values: {}", valid_depths.join(", ")),
            });
        }
        validation::validate_range("search.max_results", self.search.max_results, 1, 20)?;

        validation::validate_url("weather.base_url", &self.weather.base_url)?;
        validation::validate_non_empty_string("weather.location", &self.weather.location)?;
        validation::validate_non_empty_string("weather.unit_group", &self.weather.unit_group)?;

        validation::validate_positive_number("budget.total_ms", self.budget.total_ms, 1)?;
        validation::validate_positive_number("budget.stage_timeout_ms", self.budget.stage_timeout_ms, 1)?;
        if self.budget.min_generation_ms >= self.budget.total_ms {
            return Err(AppError::InvalidConfigValueError {
                field: "budget.min_generation_ms".to_string(),
                value: self.budget.min_generation_ms.to_string(),
                reason: format!(
                    "Must be below budget.total_ms ({}) or generation can never start",
                    self.budget.total_ms
                ),
            });
        }

        Ok(())
    }
}
