pub mod budget;
pub mod classifier;
pub mod date_extractor;
pub mod generator;
pub mod normalizer;
pub mod orchestrator;
pub mod search;
pub mod weather;

pub use crate::domain::ports::{ChatModel, ForecastProvider, WebSearch};
pub use crate::utils::error::Result;
pub use orchestrator::{Orchestrator, OrchestratorSettings};
