use anyhow::Result;
use corona_reporter::bot;
use corona_reporter::config::{load_config, Config};
use corona_reporter::jobs::{run_daily, DailyJob};
use corona_reporter::state::AppState;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, config_warnings) = load_config();
    init_tracing(&config);
    for warning in &config_warnings {
        warn!("{warning}");
    }
    config.validate()?;

    let crawl_time = config.crawler_start_time()?;
    let send_time = config.reporter_start_time()?;
    let state = Arc::new(AppState::new(config)?);

    info!("starting the bot");
    tokio::spawn(run_daily(state.clone(), crawl_time, DailyJob::Crawl));
    tokio::spawn(run_daily(state.clone(), send_time, DailyJob::Send));

    tokio::select! {
        result = bot::run(state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    let default_level = config.observability.log_level.trim();
    let default_level = if default_level.is_empty() {
        "info".to_string()
    } else {
        default_level.to_lowercase()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
