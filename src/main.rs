use ai_llm_service::telemetry;
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // `.env` is optional; real environment variables win.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to read .env");
        }
    }

    tracing_subscriber::registry()
        .with(telemetry::env_filter("info"))
        .with(telemetry::layer())
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting gita guide backend");

    api::start().await.context("api server failed")?;

    Ok(())
}
