//! Final answer generation, batch or streaming, under the caller's budget.

use crate::domain::model::{ChatMessage, ChatRequest, GenerationMode, SearchContext};
use crate::domain::ports::ChatModel;
use crate::utils::error::{AppError, Result};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const RESPONSE_SHAPES: &str = r#"Analyze the query and respond in the most appropriate format. Pick exactly one format and reply with the JSON object only.

1. For factual information or how-to questions, use the INFORMATION format:
{
  "type": "information",
  "content": "Clear, concise answer",
  "steps": [
    {"title": "Step 1", "content": "Step content"},
    {"title": "Step 2", "content": "Step content"}
  ]
}

2. For time-sensitive updates or events, use the NEWS format:
{
  "type": "news",
  "title": "Headline",
  "summary": "Brief summary",
  "content": "Full content",
  "timestamp": "2024-03-20T12:00:00Z",
  "isLive": true/false
}

3. For suggestions or options, use the RECOMMENDATIONS format:
{
  "type": "recommendations",
  "content": "One-sentence overview",
  "items": [
    {
      "title": "Place name",
      "image": "image_url",
      "tags": ["tag1", "tag2"],
      "distance": "0.5 miles",
      "price": "$$"
    }
  ]
}

4. For quality assessments, use the REVIEWS format:
{
  "type": "reviews",
  "content": "One-sentence verdict",
  "rating": 4.5,
  "reviewCount": 100,
  "pros": ["pro1", "pro2"],
  "cons": ["con1", "con2"]
}

5. For navigation or routes, use the DIRECTIONS format:
{
  "type": "directions",
  "content": "One-sentence overview",
  "options": [
    {
      "type": "Fastest",
      "steps": [
        {
          "transport": "walk/subway/bus/ferry",
          "description": "Step description",
          "duration": "10 min",
          "distance": "0.5 miles"
        }
      ]
    }
  ]
}"#;

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub city: String,
    pub temperature: f32,
    pub batch_max_tokens: u32,
    pub stream_max_tokens: u32,
}

impl GenerationSettings {
    pub fn max_tokens(&self, mode: GenerationMode) -> u32 {
        match mode {
            GenerationMode::Batch => self.batch_max_tokens,
            GenerationMode::Stream => self.stream_max_tokens,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    pub query: &'a str,
    pub weather: Option<&'a str>,
    pub search: Option<&'a SearchContext>,
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    /// True when the stream was cut short and `text` is what arrived before that.
    pub partial: bool,
    pub mode: GenerationMode,
    pub max_tokens: u32,
    pub temperature: f32,
}

pub struct ResponseGenerator {
    model: Arc<dyn ChatModel>,
    settings: GenerationSettings,
}

impl ResponseGenerator {
    pub fn new(model: Arc<dyn ChatModel>, settings: GenerationSettings) -> Self {
        Self { model, settings }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn system_prompt(&self, input: &GenerationInput<'_>) -> String {
        let mut prompt = format!(
            "You are a knowledgeable {} guide. {}",
            self.settings.city, RESPONSE_SHAPES
        );
        if let Some(weather) = input.weather {
            prompt.push_str("\n\nWeather information:\n");
            prompt.push_str(weather);
        }
        if let Some(context) = input.search.and_then(SearchContext::prompt_text) {
            prompt.push_str("\n\nContext:\n");
            prompt.push_str(context);
        }
        prompt
    }

    pub async fn generate(
        &self,
        input: GenerationInput<'_>,
        budget: Duration,
        mode: GenerationMode,
    ) -> Result<Generation> {
        let max_tokens = self.settings.max_tokens(mode);
        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage::system(self.system_prompt(&input)),
                ChatMessage::user(input.query),
            ],
            temperature: self.settings.temperature,
            max_tokens,
        };

        tracing::debug!(
            "✍️ Generating ({:?}, max_tokens={}, budget={}ms)",
            mode,
            max_tokens,
            budget.as_millis()
        );

        let (text, partial) = match mode {
            GenerationMode::Batch => (self.generate_batch(request, budget).await?, false),
            GenerationMode::Stream => self.generate_stream(request, budget).await?,
        };

        Ok(Generation {
            text,
            partial,
            mode,
            max_tokens,
            temperature: self.settings.temperature,
        })
    }

    async fn generate_batch(&self, request: ChatRequest, budget: Duration) -> Result<String> {
        tokio::time::timeout(budget, self.model.complete(request))
            .await
            .map_err(|_| AppError::timeout("Final response generation", budget))?
    }

    async fn generate_stream(&self, request: ChatRequest, budget: Duration) -> Result<(String, bool)> {
        let deadline = Instant::now() + budget;

        let mut fragments = tokio::time::timeout_at(deadline, self.model.stream(request))
            .await
            .map_err(|_| AppError::timeout("Final response generation", budget))??;

        let mut text = String::new();
        loop {
            match tokio::time::timeout_at(deadline, fragments.next()).await {
                Ok(Some(Ok(fragment))) => text.push_str(&fragment),
                Ok(None) => return Ok((text, false)),
                Ok(Some(Err(e))) => {
                    if text.is_empty() {
                        return Err(e);
                    }
                    tracing::warn!("✍️ Stream failed after {} bytes, keeping partial output: {}", text.len(), e);
                    return Ok((text, true));
                }
                Err(_) => {
                    if text.is_empty() {
                        return Err(AppError::timeout("Final response generation", budget));
                    }
                    tracing::warn!("✍️ Stream hit the deadline, keeping {} bytes of partial output", text.len());
                    return Ok((text, true));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Citation;
    use crate::domain::ports::TextStream;
    use async_trait::async_trait;
    use futures::stream;
    use std::sync::Mutex;

    #[derive(Clone)]
    enum Script {
        Reply(&'static str),
        Fragments(Vec<&'static str>),
        /// 先送出片段，之後永遠不結束
        FragmentsThenHang(Vec<&'static str>),
        FragmentsThenError(Vec<&'static str>),
        Hang,
    }

    struct ScriptedModel {
        script: Script,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedModel {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    fn ok_items(fragments: Vec<&'static str>) -> Vec<Result<String>> {
        fragments.into_iter().map(|f| Ok(f.to_string())).collect()
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(&self, request: ChatRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request);
            match &self.script {
                Script::Reply(text) => Ok(text.to_string()),
                _ => futures::future::pending().await,
            }
        }

        async fn stream(&self, request: ChatRequest) -> Result<TextStream> {
            self.seen.lock().unwrap().push(request);
            match self.script.clone() {
                Script::Fragments(fragments) => Ok(stream::iter(ok_items(fragments)).boxed()),
                Script::FragmentsThenHang(fragments) => Ok(stream::iter(ok_items(fragments))
                    .chain(stream::pending())
                    .boxed()),
                Script::FragmentsThenError(fragments) => Ok(stream::iter(ok_items(fragments))
                    .chain(stream::once(async {
                        Err(AppError::malformed("openai", "connection reset"))
                    }))
                    .boxed()),
                Script::Hang => futures::future::pending().await,
                Script::Reply(_) => Err(AppError::Internal {
                    message: "batch only".to_string(),
                }),
            }
        }
    }

    fn settings() -> GenerationSettings {
        GenerationSettings {
            model: "gpt-4".to_string(),
            city: "NYC".to_string(),
            temperature: 0.7,
            batch_max_tokens: 500,
            stream_max_tokens: 1000,
        }
    }

    fn input<'a>(weather: Option<&'a str>, search: Option<&'a SearchContext>) -> GenerationInput<'a> {
        GenerationInput {
            query: "Best bagels near Union Square?",
            weather,
            search,
        }
    }

    #[tokio::test]
    async fn test_batch_uses_batch_token_ceiling() {
        let model = ScriptedModel::new(Script::Reply(r#"{"type":"information","content":"Go to Ess-a-Bagel."}"#));
        let generator = ResponseGenerator::new(model.clone(), settings());

        let generation = generator
            .generate(input(None, None), Duration::from_secs(5), GenerationMode::Batch)
            .await
            .unwrap();

        assert_eq!(generation.text, r#"{"type":"information","content":"Go to Ess-a-Bagel."}"#);
        assert!(!generation.partial);
        assert_eq!(generation.max_tokens, 500);

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].max_tokens, 500);
        assert_eq!(seen[0].temperature, 0.7);
        assert_eq!(seen[0].messages[0].role, "system");
        assert_eq!(seen[0].messages[1].content, "Best bagels near Union Square?");
    }

    #[tokio::test]
    async fn test_stream_concatenates_fragments_in_order() {
        let model = ScriptedModel::new(Script::Fragments(vec!["{\"type\":", "\"news\",", "\"content\":\"x\"}"]));
        let generator = ResponseGenerator::new(model.clone(), settings());

        let generation = generator
            .generate(input(None, None), Duration::from_secs(5), GenerationMode::Stream)
            .await
            .unwrap();

        assert_eq!(generation.text, "{\"type\":\"news\",\"content\":\"x\"}");
        assert!(!generation.partial);
        assert_eq!(generation.max_tokens, 1000);
        assert_eq!(model.seen.lock().unwrap()[0].max_tokens, 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_deadline_keeps_partial_output() {
        let model = ScriptedModel::new(Script::FragmentsThenHang(vec!["Take the ", "Q train"]));
        let generator = ResponseGenerator::new(model, settings());

        let generation = generator
            .generate(input(None, None), Duration::from_secs(2), GenerationMode::Stream)
            .await
            .unwrap();

        assert_eq!(generation.text, "Take the Q train");
        assert!(generation.partial);
    }

    #[tokio::test]
    async fn test_stream_error_keeps_partial_output() {
        let model = ScriptedModel::new(Script::FragmentsThenError(vec!["Half an "]));
        let generator = ResponseGenerator::new(model, settings());

        let generation = generator
            .generate(input(None, None), Duration::from_secs(2), GenerationMode::Stream)
            .await
            .unwrap();

        assert_eq!(generation.text, "Half an ");
        assert!(generation.partial);
    }

    #[tokio::test]
    async fn test_stream_error_without_output_propagates() {
        let model = ScriptedModel::new(Script::FragmentsThenError(vec![]));
        let generator = ResponseGenerator::new(model, settings());

        let result = generator
            .generate(input(None, None), Duration::from_secs(2), GenerationMode::Stream)
            .await;

        assert!(matches!(result, Err(AppError::Malformed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_that_never_opens_times_out() {
        let model = ScriptedModel::new(Script::Hang);
        let generator = ResponseGenerator::new(model, settings());

        let result = generator
            .generate(input(None, None), Duration::from_secs(2), GenerationMode::Stream)
            .await;

        assert!(matches!(result, Err(AppError::Timeout { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_timeout_is_an_error() {
        let model = ScriptedModel::new(Script::Hang);
        let generator = ResponseGenerator::new(model, settings());

        let result = generator
            .generate(input(None, None), Duration::from_secs(2), GenerationMode::Batch)
            .await;

        match result {
            Err(err) => assert_eq!(err.code(), "GENERATION_TIMEOUT"),
            Ok(generation) => panic!("unexpected generation: {:?}", generation),
        }
    }

    #[test]
    fn test_prompt_appends_weather_and_search_context() {
        let generator = ResponseGenerator::new(ScriptedModel::new(Script::Hang), settings());
        let search = SearchContext {
            answer: Some("The Union Square Greenmarket runs Mon, Wed, Fri, Sat.".to_string()),
            citations: vec![Citation {
                title: "GrowNYC".to_string(),
                url: "https://www.grownyc.org".to_string(),
                content: None,
            }],
        };

        let prompt = generator.system_prompt(&input(Some("Weather forecast for NYC:\n2024-03-23: Rain"), Some(&search)));

        assert!(prompt.starts_with("You are a knowledgeable NYC guide."));
        assert!(prompt.contains("REVIEWS format"));
        assert!(prompt.contains("DIRECTIONS format"));
        assert!(prompt.ends_with(
            "\n\nWeather information:\nWeather forecast for NYC:\n2024-03-23: Rain\
             \n\nContext:\nThe Union Square Greenmarket runs Mon, Wed, Fri, Sat."
        ));
    }

    #[test]
    fn test_prompt_without_context() {
        let generator = ResponseGenerator::new(ScriptedModel::new(Script::Hang), settings());
        let empty = SearchContext::default();

        let prompt = generator.system_prompt(&input(None, Some(&empty)));

        assert!(!prompt.contains("Weather information:"));
        assert!(!prompt.contains("Context:\n"));
    }
}
