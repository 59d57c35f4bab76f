mod aggregator;
mod api;
mod bot;
mod config;
mod errors;
mod exchanges;
mod format;
mod models;
mod ranking;
mod settings;
mod worker;

use aggregator::FundingAggregator;
use api::ApiServer;
use bot::AppState;
use config::{Config, LogFormat, AVAILABLE_EXCHANGES};
use exchanges::ExchangeRegistry;
use format::ReportFormatter;
use settings::{SettingsRepository, SettingsStore};
use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;
use tracing_subscriber::EnvFilter;
use worker::ScanWorker;

const SCHEDULER_TICK: Duration = Duration::from_secs(60);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    tracing::info!(
        "Funding bot starting, default exchanges: {:?}",
        config.defaults.exchanges
    );

    // ── 1. Exchange clients and the scan worker ────────────────────
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let registry = ExchangeRegistry::from_table(AVAILABLE_EXCHANGES, &http);
    let aggregator = FundingAggregator::new(registry, config.exchange_timeout);
    let scans = ScanWorker::spawn(aggregator, config.job_timeout);

    // ── 2. Per-chat settings ───────────────────────────────────────
    let store = match &config.settings_file {
        Some(path) => SettingsStore::open(path, config.defaults.clone()),
        None => {
            tracing::info!("SETTINGS_FILE is empty, keeping settings in memory");
            SettingsStore::in_memory(config.defaults.clone())
        }
    };
    let settings: Arc<dyn SettingsRepository> = Arc::new(store);

    let app = Arc::new(AppState {
        settings: Arc::clone(&settings),
        scans,
        formatter: ReportFormatter::new(config.top_n, config.display_utc_offset_hours),
    });

    // ── 3. Ops API ─────────────────────────────────────────────────
    if let Some(port) = config.api_port {
        let server = ApiServer::new(Arc::clone(&settings));
        tokio::spawn(async move {
            if let Err(e) = server.run(port).await {
                tracing::error!("API server stopped: {e}");
            }
        });
    }

    // ── 4. Scheduled pushes and the chat dispatcher ────────────────
    let bot = Bot::new(&config.telegram_token);
    tokio::spawn(bot::scheduler::run(bot.clone(), Arc::clone(&app), SCHEDULER_TICK));

    bot::run(bot, app).await;
    tracing::info!("Shutting down...");
    Ok(())
}
