//! reveal-proxy binary

use clap::Parser;
use reveal_logging::{LogConfig, RevealSubscriberBuilder};
use reveal_proxy::{ProxyArgs, ProxyConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ProxyArgs::parse();

    let mut log_config = LogConfig::default();
    if args.pretty_logs {
        log_config.console.pretty = true;
        log_config.console.ansi = true;
    }
    let _guard = RevealSubscriberBuilder::new()
        .with_config(log_config)
        .with_level(args.log_level.clone())
        .init();

    let config = ProxyConfig::resolve(&args)?;
    info!(
        listen = %config.listen_addr,
        api_base = %config.api_base,
        origins = ?config.allowed_origins,
        "Starting reveal proxy"
    );

    reveal_proxy::run(config).await?;
    Ok(())
}
