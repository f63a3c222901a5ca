use anyhow::{Error, Result};
use print_gateway::{api, config::Config, scheduler};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load()?;

    info!("Configuration validated. Print gateway starting");

    tokio::select! {
        _ = scheduler::run_print_worker(config.clone()) => {},
        _ = scheduler::run_recovery_worker(config.clone()) => {},
        result = api::run_api_server(config) => result?,
    }

    Ok(())
}
