// 外部服務的具體實作：LLM、網路搜尋、天氣
pub mod openai;
pub mod tavily;
pub mod visual_crossing;

pub use openai::{OpenAiChatModel, OpenAiConfig};
pub use tavily::{TavilyConfig, TavilySearch};
pub use visual_crossing::{VisualCrossingConfig, VisualCrossingWeather};
