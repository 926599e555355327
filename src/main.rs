//! Runs the plugin against the in-process host.
//!
//! Entries are served from the configured entries file and `schedule.*`
//! states come from `host.schedules`; new entries are created through
//! `solar_savings::flow::ConfigFlow` by an embedding host.

use anyhow::Result;
use solar_savings::logging::init_logging;
use solar_savings::{Config, Host, Integration, LocalHost};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    info!(
        "Solar Savings {} starting up",
        env!("CARGO_PKG_VERSION")
    );

    let host: Arc<dyn Host> = Arc::new(LocalHost::from_config(&config)?);
    let mut integration = Integration::new(host, config.scheduler.check_time()?);

    let shutdown = integration.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                shutdown.send(()).ok();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    match integration.run().await {
        Ok(()) => {
            info!("Shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Integration failed with error: {}", e);
            Err(anyhow::anyhow!("Integration error: {}", e))
        }
    }
}
