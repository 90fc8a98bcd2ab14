//! Lookout CLI
//!
//! Runs one configured monitor until interrupted.

use std::path::PathBuf;

use clap::Parser;
use lookout::config::{LogConfig, NotifierConfig};
use lookout::{load_config, LookoutBuilder};
use tracing::Level;

#[derive(Parser)]
#[command(name = "lookout")]
#[command(about = "Polling monitors for status pages, mailing-list archives and hosts")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Dry run: log alerts instead of sending them, with debug logging
    #[arg(long)]
    testing: bool,

    /// Poll interval in seconds (overrides config file)
    #[arg(long)]
    interval: Option<u64>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.testing {
        Level::DEBUG
    } else {
        args.log_level
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, testing={}, interval={:?}, log_level={:?}",
        args.config,
        args.testing,
        args.interval,
        level
    );

    tracing::debug!("Loading configuration from {:?}", args.config);
    let mut config = load_config(&args.config)?;
    config.monitor = config.monitor.with_delay_override(args.interval);
    if args.testing {
        let prefix = config.notifier.prefix().to_string();
        config.notifier = NotifierConfig::Log(LogConfig { prefix });
    }
    config.resolve_secrets()?;

    tracing::info!(
        "Starting lookout monitor '{}' every {:?}, alerts via {}",
        config.monitor.name(),
        config.monitor.delay(),
        config.notifier.type_name()
    );

    LookoutBuilder::new(config)
        .build()
        .await?
        .start()
        .await?;

    tracing::info!("Lookout monitor has stopped");
    Ok(())
}
