use bridge_config::BridgeConfig;
use bridge_config::DEFAULT_CONFIG_PATH;
use clap::Parser;
use std::path::PathBuf;
use thingspeak_bridge::BridgeService;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "thingspeak-bridge",
    version = clap::crate_version!(),
    about = clap::crate_description!()
)]
pub struct BridgeOpt {
    /// Turn-on the debug log level.
    ///
    /// If off only reports the events of the configured log level (INFO by default)
    /// If on also reports DEBUG and TRACE
    #[arg(long)]
    pub debug: bool,

    /// Path to the configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = BridgeOpt::parse();
    let config = BridgeConfig::load(&opt.config)?;

    let log_level = if opt.debug {
        tracing::Level::TRACE
    } else {
        config.log_level
    };
    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_max_level(log_level)
        .init();

    info!("thingspeak-bridge starting with {}", opt.config.display());
    info!("{:?}", config.thingspeak);

    BridgeService::new(config).run().await?;
    Ok(())
}
