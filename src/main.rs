//! Interactive trade executor
//!
//! Console menu over the trade capability: execute a single trade, list
//! the currently open assets, or check the account balance.

use std::time::Duration;

use anyhow::Context;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use owo_colors::OwoColorize;
use tracing::info;

use quotex_runner::{
    BrokerError, Config, QuotexClient, SessionStats, TradeError, TradeExecutor, TradeOutcome,
    TradeResult, TradeSignal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = Config::from_env()?;
    info!(
        "Broker: {} ({} account)",
        config.base_url,
        config.account.as_api_str()
    );

    let client = QuotexClient::new(&config)?;
    let executor = TradeExecutor::new(client)
        .with_result_grace(Duration::from_secs(config.result_grace_secs));

    connect(&executor).await?;
    println!("{} Connected to broker", "[INFO]:".blue());

    match executor.balance().await {
        Ok(balance) => println!("{} Current balance: ${balance}", "[INFO]:".blue()),
        Err(err) => println!("{} Could not fetch balance: {err}", "[ERROR]:".red()),
    }

    println!("{}", "=== Quotex Trade Executor ===".cyan());
    loop {
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Choose an action")
            .items(&[
                "Execute a single trade",
                "List available assets",
                "Check account balance",
                "Exit",
            ])
            .default(0)
            .interact()?;

        match choice {
            0 => {
                if let Err(err) = execute_trade(&executor).await {
                    println!("{} {err}", "[ERROR]:".red());
                }
            }
            1 => list_assets(&executor).await,
            2 => match executor.balance().await {
                Ok(balance) => println!("{} Current balance: ${balance}", "[INFO]:".blue()),
                Err(err) => println!("{} Could not fetch balance: {err}", "[ERROR]:".red()),
            },
            _ => {
                println!("{} Exiting...", "[INFO]:".blue());
                break;
            }
        }
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

/// Prompt for trade parameters and run one trade end-to-end.
async fn execute_trade(executor: &TradeExecutor<QuotexClient>) -> anyhow::Result<()> {
    let theme = ColorfulTheme::default();

    let asset: String = Input::with_theme(&theme)
        .with_prompt("Asset")
        .default("EURUSD".to_string())
        .interact_text()?;
    let directions = ["CALL", "PUT"];
    let direction = Select::with_theme(&theme)
        .with_prompt("Direction")
        .items(&directions)
        .default(0)
        .interact()?;
    let amount: String = Input::with_theme(&theme)
        .with_prompt("Amount ($)")
        .default("1".to_string())
        .interact_text()?;
    let duration: String = Input::with_theme(&theme)
        .with_prompt("Duration (seconds)")
        .default("60".to_string())
        .interact_text()?;

    // Route the collected input through the same parser the chat receiver
    // uses, so validation rules apply identically in both flows.
    let line = format!("{asset} {} {amount} {duration}", directions[direction]);
    let signal: TradeSignal = match line.parse::<TradeSignal>() {
        Ok(signal) => signal,
        Err(err) => {
            println!("{} {err}", "[ERROR]:".red());
            return Ok(());
        }
    };

    println!(
        "{} Executing {} on {} for ${} with duration {}s",
        "[INFO]:".blue(),
        signal.direction,
        signal.asset,
        signal.amount,
        signal.duration_secs
    );

    match executor.execute(signal).await {
        Ok(result) => print_result(&result, &executor.stats()),
        Err(err) => println!("{} {err}", "[ERROR]:".red()),
    }
    Ok(())
}

async fn list_assets(executor: &TradeExecutor<QuotexClient>) {
    match executor.list_open_assets().await {
        Ok(instruments) => {
            for instrument in &instruments {
                println!("{} {}", "[ASSET]:".green(), instrument.symbol);
            }
            println!(
                "{} Total available assets: {}",
                "[INFO]:".blue(),
                instruments.len()
            );
        }
        Err(err) => println!("{} {err}", "[ERROR]:".red()),
    }
}

fn print_result(result: &TradeResult, stats: &SessionStats) {
    match result.outcome {
        TradeOutcome::Win => {
            println!("{} Win! Profit: ${}", "[RESULT]:".green(), result.profit);
        }
        TradeOutcome::Loss => {
            println!("{} Loss! Amount: ${}", "[RESULT]:".red(), result.profit.abs());
        }
        TradeOutcome::Draw => {
            println!("{} Draw. Stake returned.", "[RESULT]:".yellow());
        }
        TradeOutcome::Error => {
            println!(
                "{} Closed with unrecognized outcome: {}",
                "[RESULT]:".yellow(),
                result.raw
            );
        }
    }
    println!(
        "{} Wins: {}, Losses: {}, Win rate: {:.2}%, Total profit: ${}",
        "[STATS]:".cyan(),
        stats.wins,
        stats.losses,
        stats.win_rate_pct(),
        stats.total_profit
    );
}
