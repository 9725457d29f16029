use deinemudda::bot::BotContext;
use deinemudda::config::Settings;
use deinemudda::logging::{init_logging, RedactionPatterns};
use deinemudda::persistence::{Persistence, SqlPersistence};
use deinemudda::runner::run_bot;
use deinemudda::stats::Metrics;
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Redaction patterns are needed before the first log line
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting deinemudda {}...", env!("CARGO_PKG_VERSION"));

    let settings = init_settings();
    let metrics = init_metrics(settings.stats_port);
    let persistence = init_persistence(&settings).await;

    let context = Arc::new(BotContext::new(settings, persistence, metrics));
    run_bot(context).await;

    info!("Bot stopped.");
    Ok(())
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_metrics(port: u16) -> Metrics {
    match Metrics::install() {
        Ok(metrics) => {
            let server = metrics.clone();
            tokio::spawn(async move {
                if let Err(e) = server.serve(port).await {
                    error!("Metrics endpoint failed: {}", e);
                }
            });
            metrics
        }
        Err(e) => {
            error!("Failed to install metrics recorder: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_persistence(settings: &Settings) -> Arc<dyn Persistence> {
    match SqlPersistence::connect(&settings.database_url).await {
        Ok(p) => {
            info!("Database ready.");
            let persistence: Arc<dyn Persistence> = Arc::new(p);
            match persistence.entity_counts().await {
                Ok(counts) => deinemudda::stats::record_entity_counts(&counts),
                Err(e) => error!("Failed to count entities: {}", e),
            }
            persistence
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    }
}
