pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::{Cli, Command};

pub use app::{build_orchestrator, server::AppState, Providers};
pub use config::AppConfig;
pub use crate::core::{Orchestrator, OrchestratorSettings};
pub use domain::answer::{GeneratedAnswer, SearchResult};
pub use utils::error::{AppError, Result};
