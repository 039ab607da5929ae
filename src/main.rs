use anyhow::Context;
use clap::Parser;
use nyc_answers::utils::error::ErrorSeverity;
use nyc_answers::utils::{logger, validation::Validate};
use nyc_answers::{build_orchestrator, AppConfig, AppState, Cli, Command, Providers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting nyc-answers v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    cli.apply_overrides(&mut config);
    if cli.verbose {
        tracing::debug!("Config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!(
            "❌ Configuration validation failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);

        let exit_code = match e.severity() {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        };
        std::process::exit(exit_code);
    }

    let providers = Providers::from_config(&config).context("Failed to build provider clients")?;
    let orchestrator = build_orchestrator(&config, &providers);

    match cli.command {
        Command::Serve { .. } => {
            let state = AppState::new(orchestrator, providers.forecast.clone(), config.weather_refresh());
            nyc_answers::app::server::run(state, &config.service.bind).await?;
        }
        Command::Ask { query } => {
            let result = orchestrator.run(&query).await;
            if result.is_error() {
                tracing::warn!("⚠️ Query finished with an error answer");
            } else {
                tracing::info!("✅ Answered as '{}'", result.answer.kind());
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
