use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use cardwatch::alerts::LogAlertSink;
use cardwatch::config::AppConfig;
use cardwatch::extractor::{Extractor, HttpFetcher};
use cardwatch::monitor::InventoryMonitor;
use cardwatch::platforms::{PlatformRegistry, classify};
use cardwatch::scheduler::MonitorScheduler;
use cardwatch::storage::Store;

#[derive(Parser)]
#[command(name = "cardwatch", about = "Trading-card marketplace monitor", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a product URL, extract it and register it for monitoring
    Extract {
        /// Product page URL on any supported marketplace
        url: String,
    },
    /// Run monitoring batches over due inventory records
    Monitor {
        /// Cap on records per batch (defaults to the configured batch_limit)
        #[arg(long)]
        limit: Option<usize>,
        /// Run one batch and exit instead of starting the scheduler
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cardwatch=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let store = Arc::new(Store::connect(&config.database.url, config.database.max_connections).await?);
    store.init().await?;

    let registry = Arc::new(PlatformRegistry::builtin());
    let extractor = Arc::new(Extractor::new(Arc::clone(&store), Arc::new(HttpFetcher::new()?)));

    match cli.command {
        Command::Extract { url } => {
            let Some(classification) = classify(&registry, &url) else {
                anyhow::bail!("no supported platform recognizes this URL: {url}");
            };
            info!(
                platform = %classification.platform,
                confidence = classification.confidence,
                "platform classified"
            );

            let result = extractor
                .extract(classification.profile, &classification.normalized_url)
                .await?;
            if !result.degraded_fields.is_empty() {
                warn!(fields = ?result.degraded_fields, "extraction degraded, defaults stored");
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Monitor { limit, once } => {
            let monitor = Arc::new(
                InventoryMonitor::new(
                    Arc::clone(&store),
                    Arc::clone(&registry),
                    Arc::clone(&extractor),
                    Arc::new(LogAlertSink),
                )
                .with_item_delay(Duration::from_millis(config.monitor.item_delay_ms)),
            );
            let batch_limit = limit.unwrap_or(config.monitor.batch_limit);

            if once {
                let deadline = (config.monitor.batch_deadline_secs > 0).then(|| {
                    Instant::now() + Duration::from_secs(config.monitor.batch_deadline_secs)
                });
                let result = monitor.check_batch(batch_limit, deadline).await?;
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                let mut monitor_config = config.monitor.clone();
                monitor_config.batch_limit = batch_limit;
                let mut scheduler =
                    MonitorScheduler::new(monitor, &config.scheduler, &monitor_config).await?;
                scheduler.start().await?;
                info!(cron = %config.scheduler.cron, "cardwatch monitoring, press Ctrl-C to stop");
                tokio::signal::ctrl_c().await?;
                info!("Shutting down...");
                scheduler.shutdown().await?;
            }
        }
    }

    Ok(())
}
