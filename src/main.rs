use anyhow::Context;
use clap::Parser;

use unidb_lib::config::{CliArgs, ServerConfig};
use unidb_lib::logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = ServerConfig::load(&args).context("failed to load configuration")?;

    init_logging(&config.log_level, config.log_format())?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        "starting unidb"
    );

    unidb_lib::run(config).await
}
