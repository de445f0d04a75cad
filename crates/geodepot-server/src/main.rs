use geodepot_common::logging::{init_logging, LogConfig};
use geodepot_server::{api, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_config = LogConfig::from_env()?;
    init_logging(&log_config)?;

    let config = Config::load()?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        catalog = %config.catalog.base_url,
        "starting geodepot server"
    );

    api::serve(config).await
}
