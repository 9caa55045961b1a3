use tradefy_common::config::MarketConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = MarketConfig::from_env()?;
    let git_sha = std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("TRADEFY_GIT_SHA").ok());
    let boot_id = std::env::var("TRADEFY_BOOT_ID")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| format!("tradefy-{}", std::process::id()));

    tradefy_server::serve(config, boot_id, git_sha).await?;
    Ok(())
}
