//! Telegram signal receiver
//!
//! Connects to the broker once at startup, then processes trade signals
//! from allow-listed Telegram chats until stopped.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use quotex_runner::{Config, QuotexClient, SignalReceiver, TradeExecutor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Config::from_env()?;
    let token = config
        .telegram_token
        .clone()
        .ok_or_else(|| anyhow::anyhow!("TELEGRAM_TOKEN environment variable required"))?;

    info!(
        "Broker: {} ({} account), {} allowed chat(s)",
        config.base_url,
        config.account.as_api_str(),
        config.allowed_chats.len()
    );

    let client = QuotexClient::new(&config)?;
    let executor = Arc::new(
        TradeExecutor::new(client)
            .with_result_grace(Duration::from_secs(config.result_grace_secs)),
    );

    // The receiver cannot answer an emailed two-factor prompt; run the
    // interactive executor once to seed the session cache in that case.
    executor
        .connect()
        .await
        .context("failed to connect to broker")?;
    info!("Connected to broker");

    let receiver = Arc::new(SignalReceiver::new(executor, config.allowed_chats.clone()));
    receiver.run(&token).await;

    info!("Signal receiver stopped");
    Ok(())
}
