use crate::domain::model::{ChatMessage, ChatRequest};
use crate::domain::ports::{ChatModel, TextStream};
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::future;
use futures::stream::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE: &str = "openai";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout: Duration,
}

/// Chat-completions client for any OpenAI-compatible endpoint.
pub struct OpenAiChatModel {
    config: OpenAiConfig,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionReply {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

impl OpenAiChatModel {
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key)).map_err(
            |e| AppError::ConfigError {
                message: format!("Invalid LLM api key header: {}", e),
            },
        )?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response> {
        let body = CompletionBody {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        };

        tracing::debug!(
            "🤖 POST {} (model={}, stream={})",
            self.endpoint(),
            request.model,
            stream
        );

        let mut builder = self
            .client
            .post(self.endpoint())
            .headers(self.headers()?)
            .json(&body);
        // 串流回應的總時間由呼叫端的 deadline 控制
        if !stream {
            builder = builder.timeout(self.config.request_timeout);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, request: ChatRequest) -> Result<String> {
        let reply: CompletionReply = self.send(&request, false).await?.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            // content 為 null 時視為空字串，交由上層判斷
            .map(|message| message.content.unwrap_or_default())
            .ok_or_else(|| AppError::malformed(SERVICE, "reply has no choices[0].message"))
    }

    async fn stream(&self, request: ChatRequest) -> Result<TextStream> {
        let response = self.send(&request, true).await?;
        Ok(delta_stream(response.bytes_stream()))
    }
}

enum Frame {
    Delta(String),
    Skip,
    Done,
    Failed(AppError),
}

/// Turns an SSE byte stream into content deltas. Stops at `data: [DONE]`, the first bad chunk, or end of body.
fn delta_stream<S, B>(bytes: S) -> TextStream
where
    S: Stream<Item = reqwest::Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    bytes
        .eventsource()
        .map(|event| match event {
            Ok(event) => decode_event(&event.data),
            Err(EventStreamError::Transport(e)) => Frame::Failed(AppError::Http(e)),
            Err(e) => Frame::Failed(AppError::malformed(SERVICE, format!("bad event stream: {}", e))),
        })
        .scan(false, |failed, frame| {
            let item = if *failed {
                None
            } else {
                match frame {
                    Frame::Done => None,
                    Frame::Skip => Some(None),
                    Frame::Delta(text) => Some(Some(Ok(text))),
                    Frame::Failed(e) => {
                        *failed = true;
                        Some(Some(Err(e)))
                    }
                }
            };
            future::ready(item)
        })
        .filter_map(future::ready)
        .boxed()
}

fn decode_event(data: &str) -> Frame {
    let data = data.trim();
    if data.is_empty() {
        return Frame::Skip;
    }
    if data == "[DONE]" {
        return Frame::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            let delta = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content)
                .unwrap_or_default();
            if delta.is_empty() {
                Frame::Skip
            } else {
                Frame::Delta(delta)
            }
        }
        Err(e) => Frame::Failed(AppError::malformed(SERVICE, format!("bad stream chunk: {}", e))),
    }
}
