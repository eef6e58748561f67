mod config;
mod dispatcher;
mod http;
mod notifier;

use clap::Parser;
use config::MonitorConfig;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Debounced uptime monitor with a durable incident journal")]
struct Cli {
    /// Path to the monitor configuration file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config problems are fatal before anything else starts
    let config = MonitorConfig::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        resources = config.resources.len(),
        webhooks = config.webhooks.len(),
        "starting vigil"
    );
    dispatcher::run(config).await
}
