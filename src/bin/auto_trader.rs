//! Automated trading strategies
//!
//! Console menu over the strategy runner: SMA crossover, RSI, or
//! Martingale, with the parameters the strategies expect.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use owo_colors::OwoColorize;

use quotex_runner::{
    AutoTrader, BrokerError, Config, Direction, QuotexClient, TradeError, TradeExecutor,
};
use rust_decimal::Decimal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Config::from_env()?;
    let client = QuotexClient::new(&config)?;
    let executor = Arc::new(
        TradeExecutor::new(client)
            .with_result_grace(Duration::from_secs(config.result_grace_secs)),
    );

    connect(&executor).await?;
    println!("{} Connected to broker", "[INFO]:".blue());

    println!("{}", "=== Quotex Automated Trading Bot ===".cyan());
    let strategy = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Choose a strategy")
        .items(&[
            "Simple Moving Average (SMA) crossover",
            "Relative Strength Index (RSI)",
            "Martingale",
            "Exit",
        ])
        .default(0)
        .interact()?;

    let theme = ColorfulTheme::default();
    match strategy {
        0 => {
            let (asset, amount, duration) = common_params(&theme)?;
            let short_period: usize = prompt_parsed(&theme, "Short MA period", "5")?;
            let long_period: usize = prompt_parsed(&theme, "Long MA period", "20")?;
            let max_trades: u32 = prompt_parsed(&theme, "Max trades", "5")?;

            let trader = AutoTrader::new(executor, asset, amount, duration);
            trader.run_sma(short_period, long_period, max_trades).await?;
        }
        1 => {
            let (asset, amount, duration) = common_params(&theme)?;
            let period: usize = prompt_parsed(&theme, "RSI period", "14")?;
            let oversold: f64 = prompt_parsed(&theme, "Oversold threshold", "30")?;
            let overbought: f64 = prompt_parsed(&theme, "Overbought threshold", "70")?;
            let max_trades: u32 = prompt_parsed(&theme, "Max trades", "5")?;

            let trader = AutoTrader::new(executor, asset, amount, duration);
            trader
                .run_rsi(period, oversold, overbought, max_trades)
                .await?;
        }
        2 => {
            let (asset, amount, duration) = common_params(&theme)?;
            let max_step: u32 = prompt_parsed(&theme, "Max step", "4")?;
            let max_trades: u32 = prompt_parsed(&theme, "Max trades", "10")?;
            let directions = ["CALL", "PUT"];
            let initial = Select::with_theme(&theme)
                .with_prompt("Initial direction")
                .items(&directions)
                .default(0)
                .interact()?;
            let initial_direction = if initial == 0 {
                Direction::Call
            } else {
                Direction::Put
            };

            let trader = AutoTrader::new(executor, asset, amount, duration);
            trader
                .run_martingale(max_step, max_trades, initial_direction)
                .await?;
        }
        _ => println!("{} Exiting...", "[INFO]:".blue()),
    }

    Ok(())
}

/// Connect, prompting for the emailed two-factor pin when the broker asks.
async fn connect(executor: &TradeExecutor<QuotexClient>) -> anyhow::Result<()> {
    match executor.connect().await {
        Ok(()) => Ok(()),
        Err(TradeError::Connection(BrokerError::PinRequired)) => {
            let pin: String = Input::with_theme(&ColorfulTheme::default())
                .with_prompt("Enter the code sent to your email")
                .interact_text()?;
            executor
                .broker()
                .submit_pin(pin.trim())
                .await
                .context("two-factor login failed")?;
            Ok(())
        }
        Err(err) => Err(err).context("failed to connect to broker"),
    }
}

fn common_params(theme: &ColorfulTheme) -> anyhow::Result<(String, Decimal, u32)> {
    let asset: String = Input::with_theme(theme)
        .with_prompt("Asset")
        .default("EURUSD".to_string())
        .interact_text()?;
    let amount: Decimal = prompt_parsed(theme, "Trade amount ($)", "1")?;
    let duration: u32 = prompt_parsed(theme, "Duration (seconds)", "60")?;
    Ok((asset.to_ascii_uppercase(), amount, duration))
}

/// Prompt until the input parses into the expected type.
fn prompt_parsed<T>(theme: &ColorfulTheme, prompt: &str, default: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
{
    loop {
        let raw: String = Input::with_theme(theme)
            .with_prompt(prompt)
            .default(default.to_string())
            .interact_text()?;
        match raw.trim().parse::<T>() {
            Ok(value) => return Ok(value),
            Err(_) => println!("{} Invalid value `{}`", "[ERROR]:".red(), raw.trim()),
        }
    }
}
