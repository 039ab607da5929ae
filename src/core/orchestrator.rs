//! One query in, one typed `SearchResult` out.
//!
//! Stage order: classify ∥ extract dates → weather ∥ search → generate → normalize.
//! Every stage failure either degrades context or ends the run with an
//! `error`-typed answer; nothing escapes `run` as an `Err` or a panic.

use crate::core::budget::Deadline;
use crate::core::classifier::Classifier;
use crate::core::date_extractor;
use crate::core::generator::{GenerationInput, ResponseGenerator};
use crate::core::normalizer;
use crate::core::search::ExternalSearchClient;
use crate::core::weather::WeatherLookup;
use crate::domain::answer::{ErrorAnswer, ErrorContext, GeneratedAnswer, SearchResult};
use crate::domain::model::{Citation, ClassificationResult, GenerationMode, SearchOutcome};
use crate::domain::trace::{
    ClassificationStep, DebugSteps, DebugTrace, ExternalSearchStep, FinalResponseStep,
    SearchStatus, StageTiming, WeatherStep,
};
use crate::utils::error::{AppError, Result};
use chrono::NaiveDate;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub total_budget: Duration,
    pub stage_timeout: Duration,
    pub min_generation_budget: Duration,
    pub mode: GenerationMode,
    pub include_debug: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            total_budget: Duration::from_millis(8000),
            stage_timeout: Duration::from_millis(10_000),
            min_generation_budget: Duration::from_millis(1000),
            mode: GenerationMode::Stream,
            include_debug: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Start,
    ClassifyingAndExtracting,
    Weather,
    Search,
    Generating,
    Normalizing,
    Done,
    Error,
}

impl RunStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStage::Start => "start",
            RunStage::ClassifyingAndExtracting => "classifying+extracting",
            RunStage::Weather => "weather",
            RunStage::Search => "search",
            RunStage::Generating => "generating",
            RunStage::Normalizing => "normalizing",
            RunStage::Done => "done",
            RunStage::Error => "error",
        }
    }
}

/// State owned by a single run; dropped once the result is returned.
struct OrchestrationRun {
    deadline: Deadline,
    stage: RunStage,
    timings: Vec<StageTiming>,
    classification: Option<ClassificationResult>,
    search_attempted: bool,
    steps: DebugSteps,
}

impl OrchestrationRun {
    fn new(total_budget: Duration) -> Self {
        Self {
            deadline: Deadline::start(total_budget),
            stage: RunStage::Start,
            timings: Vec::new(),
            classification: None,
            search_attempted: false,
            steps: DebugSteps::default(),
        }
    }

    fn enter(&mut self, stage: RunStage) {
        tracing::debug!(
            "➡️ {} -> {} at {}ms",
            self.stage.as_str(),
            stage.as_str(),
            self.deadline.elapsed().as_millis()
        );
        self.stage = stage;
    }

    fn record(&mut self, stage: RunStage) {
        self.timings.push(StageTiming {
            stage: stage.as_str().to_string(),
            elapsed_ms: self.deadline.elapsed().as_millis() as u64,
        });
    }
}

pub struct Orchestrator {
    settings: OrchestratorSettings,
    classifier: Classifier,
    weather: WeatherLookup,
    search: ExternalSearchClient,
    generator: ResponseGenerator,
}

impl Orchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        classifier: Classifier,
        weather: WeatherLookup,
        search: ExternalSearchClient,
        generator: ResponseGenerator,
    ) -> Self {
        Self {
            settings,
            classifier,
            weather,
            search,
            generator,
        }
    }

    /// Answers `query` with dates resolved against the local calendar day.
    pub async fn run(&self, query: &str) -> SearchResult {
        self.run_at(query, chrono::Local::now().date_naive()).await
    }

    pub async fn run_at(&self, query: &str, today: NaiveDate) -> SearchResult {
        let mut run = OrchestrationRun::new(self.settings.total_budget);
        tracing::info!("🚀 Handling query: {}", query);

        let outcome = AssertUnwindSafe(self.drive(query, today, &mut run))
            .catch_unwind()
            .await;

        let error = match outcome {
            Ok(Ok((answer, citations))) => {
                tracing::info!(
                    "✅ Answered as '{}' in {}ms",
                    answer.kind(),
                    run.deadline.elapsed().as_millis()
                );
                return self.assemble(answer, citations, run);
            }
            Ok(Err(e)) => e,
            Err(panic) => AppError::Internal {
                message: panic_message(panic.as_ref()),
            },
        };

        run.enter(RunStage::Error);
        run.record(RunStage::Error);
        tracing::error!(
            "❌ Query failed: {} (Category: {:?}, Severity: {:?})",
            error,
            error.category(),
            error.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", error.recovery_suggestion());

        let answer = GeneratedAnswer::Error(ErrorAnswer {
            content: error.user_friendly_message(),
            context: Some(ErrorContext {
                error_message: error.to_string(),
                error_code: error.code().to_string(),
                error_status: error.status(),
            }),
        });
        self.assemble(answer, Vec::new(), run)
    }

    async fn drive(
        &self,
        query: &str,
        today: NaiveDate,
        run: &mut OrchestrationRun,
    ) -> Result<(GeneratedAnswer, Vec<Citation>)> {
        // 分類與日期解析同時進行
        run.enter(RunStage::ClassifyingAndExtracting);
        let classify_timeout = run.deadline.stage_timeout(self.settings.stage_timeout);
        let (classification, dates) = tokio::join!(
            self.classifier.classify(query, classify_timeout),
            async { date_extractor::extract(query, today) },
        );
        run.record(RunStage::ClassifyingAndExtracting);

        let route = classification.result.route;
        run.classification = Some(classification.result);
        tracing::info!(
            "🧭 Route {:?} (confidence {:.2}), dates: {:?}",
            route,
            classification.result.confidence,
            dates
        );
        run.steps.classification = Some(ClassificationStep {
            model: self.classifier.model_name().to_string(),
            response: classification.result,
            raw_response: classification.raw_reply,
            fallback_reason: classification.fallback_reason,
        });

        // 天氣與外部搜尋互不相依，並行執行
        let needs_search = route.needs_external_search();
        run.search_attempted = needs_search;
        if dates.is_some() {
            run.enter(RunStage::Weather);
        }
        if needs_search {
            run.enter(RunStage::Search);
        }
        let side_timeout = run.deadline.stage_timeout(self.settings.stage_timeout);
        let weather_stage = async {
            match dates {
                Some(range) => Some((range, self.weather.fetch(&range, side_timeout).await)),
                None => None,
            }
        };
        let search_stage = async {
            if needs_search {
                Some(self.search.search(query, side_timeout).await)
            } else {
                None
            }
        };
        let (weather, search) = tokio::join!(weather_stage, search_stage);

        if let Some((range, forecast)) = &weather {
            run.record(RunStage::Weather);
            run.steps.weather = Some(WeatherStep {
                start_date: range.start_date,
                end_date: range.end_date,
                forecast: forecast.clone(),
            });
        }
        if let Some(outcome) = &search {
            run.record(RunStage::Search);
            run.steps.external_search = Some(self.search_step(query, outcome));
        }

        let weather_context = weather.map(|(_, forecast)| forecast);
        let search_context = search.as_ref().and_then(SearchOutcome::context);
        let citations = search_context
            .map(|context| context.citations.clone())
            .unwrap_or_default();

        let remaining = run.deadline.remaining();
        if remaining < self.settings.min_generation_budget {
            return Err(AppError::BudgetExceeded {
                remaining_ms: remaining.as_millis() as u64,
                threshold_ms: self.settings.min_generation_budget.as_millis() as u64,
            });
        }

        run.enter(RunStage::Generating);
        let generation = self
            .generator
            .generate(
                GenerationInput {
                    query,
                    weather: weather_context.as_deref(),
                    search: search_context,
                },
                remaining,
                self.settings.mode,
            )
            .await?;
        run.record(RunStage::Generating);
        run.steps.final_response = Some(FinalResponseStep {
            model: self.generator.settings().model.clone(),
            context: search_context
                .and_then(|context| context.prompt_text())
                .unwrap_or_default()
                .to_string(),
            weather_context: weather_context.clone(),
            temperature: generation.temperature,
            max_tokens: generation.max_tokens,
            mode: generation.mode,
            partial: generation.partial,
        });

        run.enter(RunStage::Normalizing);
        let answer = normalizer::normalize(&generation.text);
        if answer.content().trim().is_empty() {
            return Err(AppError::InvalidResponse {
                message: "generator returned no content".to_string(),
            });
        }

        run.enter(RunStage::Done);
        run.record(RunStage::Done);
        Ok((answer, citations))
    }

    fn search_step(&self, query: &str, outcome: &SearchOutcome) -> ExternalSearchStep {
        let provider = self.search.provider_name().to_string();
        match outcome {
            SearchOutcome::Found(context) => ExternalSearchStep {
                provider,
                query: query.to_string(),
                status: SearchStatus::Ok,
                answer: context.answer.clone(),
                result_count: context.citations.len(),
                error: None,
            },
            SearchOutcome::Unavailable { reason } => ExternalSearchStep {
                provider,
                query: query.to_string(),
                status: SearchStatus::Unavailable,
                answer: None,
                result_count: 0,
                error: Some(reason.clone()),
            },
        }
    }

    fn assemble(
        &self,
        answer: GeneratedAnswer,
        citations: Vec<Citation>,
        run: OrchestrationRun,
    ) -> SearchResult {
        let classification = run
            .classification
            .unwrap_or_else(ClassificationResult::fallback);

        let debug = self.settings.include_debug.then(|| DebugTrace {
            classification_model: self.classifier.model_name().to_string(),
            response_model: self.generator.settings().model.clone(),
            route: classification.route,
            confidence: classification.confidence,
            search_provider: run
                .search_attempted
                .then(|| self.search.provider_name().to_string()),
            stages: run.timings,
            steps: run.steps,
        });

        SearchResult {
            answer,
            is_external_search: classification.route.needs_external_search(),
            citations,
            debug,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "An unknown error occurred".to_string()
    }
}
