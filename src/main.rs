use accounts::{config::AppConfig, AppState};
use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "accounts=debug,sqlx=warn".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env().context("load configuration")?;
    let environment = config.environment;
    let state = AppState::init(config).await.context("initialize account store")?;

    tracing::info!(
        ?environment,
        token_ttl_secs = state.tokens.ttl().as_secs(),
        hasher = ?state.hasher,
        "account store ready"
    );

    Ok(())
}
