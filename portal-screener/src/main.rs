//! Portal Screener - criteria-driven stock screening service.

use anyhow::Result;
use portal_common::config::Config;
use portal_common::logging::init_logging;
use portal_screener::ScreenerService;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_with_env()?;

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Portal Screener v{}", env!("CARGO_PKG_VERSION"));

    let service = ScreenerService::new(config)?;
    service.start().await
}
