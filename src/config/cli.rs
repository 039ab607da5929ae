use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "nyc-answers")]
#[command(about = "City guide answering service backed by an LLM, web search and weather data")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, default_value = "answers.toml", env = "NYC_ANSWERS_CONFIG")]
    pub config: PathBuf,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Omit debug traces from results")]
    pub production: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP service
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Answer a single query and print the JSON result
    Ask { query: String },
}

impl Cli {
    /// 命令列參數優先於設定檔
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if self.production {
            config.service.production = true;
        }
        if let Command::Serve { bind: Some(bind) } = &self.command {
            config.service.bind = bind.clone();
        }
    }
}
