//! Kady admin panel entry point.

mod app;
mod config;
mod indicator;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting Kady panel");

    let config = config::PanelConfig::load()?;
    tracing::info!(host = %config.host, id = %config.identifier, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    tracing::info!("panel shut down cleanly");
    Ok(())
}
