//! blockd - block lookup entry point.
//!
//! Usage: `blockd [config.toml] [username|-] [candidate-list]`
//!
//! Loads the block store, then resolves the given identity once and
//! reports the outcome. `-` for the username means an anonymous request.

use anyhow::Context;
use blockd::{BlockService, Config};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "blockd.toml".to_string());
    let username = args.next().filter(|u| u.as_str() != "-");
    let candidate_list = args.next().unwrap_or_default();

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    let service = BlockService::open(&config)
        .await
        .context("opening block store")?;
    info!(blocks = service.cache().len(), "Block cache warmed");

    let anon = username.is_none();
    match service.resolve(username.as_deref(), &candidate_list, anon) {
        Some(block) => {
            info!(
                id = block.id,
                target = %block.target,
                hardblock = block.hardblock,
                sitewide = block.sitewide,
                reason = block.reason.as_deref().unwrap_or(""),
                "Block applies"
            );
        }
        None => info!("No block applies"),
    }

    Ok(())
}
