//! Telegram signal receiver
//!
//! Listens for free-text trade signals from allow-listed chats and runs them
//! through the executor, replying with the outcome. Also answers a small set
//! of slash commands. Each message is processed once, independently; trade
//! execution is serialized so at most one order is in flight at a time.

use std::sync::Arc;

use teloxide::prelude::*;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::broker::{Broker, Instrument};
use crate::config::AllowList;
use crate::executor::{SessionStats, TradeError, TradeExecutor, TradeResult};
use crate::signal::{SignalError, TradeSignal};

pub const UNAUTHORIZED_REPLY: &str = "You are not authorized to use this bot.";

/// Slash commands the receiver understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Balance,
    Assets,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    NotACommand,
    Unknown(String),
}

/// Parse a message as a slash command. `/command@botname` is accepted.
pub fn parse_command(text: &str) -> Result<Command, CommandParseError> {
    let Some(first) = text.split_whitespace().next() else {
        return Err(CommandParseError::NotACommand);
    };
    if !first.starts_with('/') {
        return Err(CommandParseError::NotACommand);
    }

    let command = first.split_once('@').map_or(first, |(head, _)| head);
    match command {
        "/start" => Ok(Command::Start),
        "/help" => Ok(Command::Help),
        "/balance" => Ok(Command::Balance),
        "/assets" => Ok(Command::Assets),
        other => Err(CommandParseError::Unknown(other.to_string())),
    }
}

/// Receives inbound Telegram messages and drives the executor
pub struct SignalReceiver<B: Broker> {
    executor: Arc<TradeExecutor<B>>,
    allow_list: AllowList,
    /// One order in flight at a time; the broker session is a single
    /// shared handle and concurrent orders are not worth the risk.
    trade_gate: Mutex<()>,
}

impl<B: Broker> SignalReceiver<B> {
    pub fn new(executor: Arc<TradeExecutor<B>>, allow_list: AllowList) -> Self {
        if allow_list.is_empty() {
            warn!("ALLOWED_CHAT_IDS is empty; nobody will be able to use the bot");
        }
        Self {
            executor,
            allow_list,
            trade_gate: Mutex::new(()),
        }
    }

    pub fn is_authorized(&self, chat_id: i64) -> bool {
        self.allow_list.contains(chat_id)
    }

    /// Reply text for a slash command.
    pub async fn command_reply(&self, command: Command) -> String {
        match command {
            Command::Start => welcome_reply(),
            Command::Help => help_reply(),
            Command::Balance => match self.executor.balance().await {
                Ok(balance) => format!("💰 Current balance: ${balance}"),
                Err(err) => format!("❌ Could not fetch balance: {err}"),
            },
            Command::Assets => match self.executor.list_open_assets().await {
                Ok(instruments) => assets_reply(&instruments),
                Err(err) => format!("❌ Could not list assets: {err}"),
            },
        }
    }

    /// Run one parsed signal and format the outcome for the sender.
    pub async fn execute_signal(&self, signal: TradeSignal) -> String {
        let _gate = self.trade_gate.lock().await;
        match self.executor.execute(signal).await {
            Ok(result) => result_reply(&result, &self.executor.stats()),
            Err(err) => trade_error_reply(&err),
        }
    }

    /// Process one inbound message, emitting replies through `reply`.
    ///
    /// The acknowledgement for a valid signal is emitted before the trade
    /// runs, so the sender sees it while the contract is still open.
    pub async fn process<F, Fut>(&self, chat_id: i64, text: &str, reply: F)
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        if !self.is_authorized(chat_id) {
            warn!("Unauthorized access attempt from chat {chat_id}");
            reply(UNAUTHORIZED_REPLY.to_string()).await;
            return;
        }

        match parse_command(text) {
            Ok(command) => reply(self.command_reply(command).await).await,
            Err(CommandParseError::Unknown(cmd)) => {
                reply(format!("Unknown command {cmd}. Send /help for usage.")).await;
            }
            Err(CommandParseError::NotACommand) => match text.parse::<TradeSignal>() {
                Err(err) => reply(rejection_reply(&err)).await,
                Ok(signal) => {
                    info!("Signal from chat {chat_id}: {signal}");
                    reply(signal_ack(&signal)).await;
                    reply(self.execute_signal(signal).await).await;
                }
            },
        }
    }
}

impl<B: Broker + 'static> SignalReceiver<B> {
    /// Poll Telegram and process messages until the process is stopped.
    pub async fn run(self: Arc<Self>, token: &str) {
        let bot = Bot::new(token);
        info!("Signal receiver started");

        teloxide::repl(bot, move |bot: Bot, msg: Message| {
            let receiver = Arc::clone(&self);
            async move {
                receiver.handle_update(&bot, &msg).await;
                respond(())
            }
        })
        .await;
    }

    async fn handle_update(&self, bot: &Bot, msg: &Message) {
        let Some(text) = msg.text() else {
            return;
        };
        let chat_id = msg.chat.id;

        self.process(chat_id.0, text, |text| {
            let bot = bot.clone();
            async move { send(&bot, chat_id, text).await }
        })
        .await;
    }
}

async fn send(bot: &Bot, chat_id: ChatId, text: String) {
    if let Err(e) = bot.send_message(chat_id, text).await {
        error!("Failed to send Telegram message: {e}");
    }
}

// Reply formatting

pub fn welcome_reply() -> String {
    "Welcome to the Quotex trade executor bot!\n\n\
     I execute trades based on signals you send.\n\n\
     Format your signals like this:\n\
     EURUSD CALL 1 60\n\
     (asset direction amount duration)"
        .to_string()
}

pub fn help_reply() -> String {
    "How to use this bot:\n\n\
     1. Send trade signals in this format:\n\
        EURUSD CALL 1 60\n\
        (asset direction amount duration)\n\n\
     2. Available commands:\n\
        /start - Start the bot\n\
        /help - Show this help message\n\
        /balance - Check current balance\n\
        /assets - List available assets\n\n\
     3. Signal format details:\n\
        - Asset: trading pair (e.g. EURUSD, GBPJPY)\n\
        - Direction: CALL/PUT (or BUY/SELL)\n\
        - Amount: trade amount in dollars\n\
        - Duration: trade duration in seconds"
        .to_string()
}

pub fn signal_ack(signal: &TradeSignal) -> String {
    format!(
        "📊 Signal detected!\n\
         Asset: {}\n\
         Action: {}\n\
         Amount: ${}\n\
         Duration: {}s\n\n\
         Executing trade...",
        signal.asset, signal.direction, signal.amount, signal.duration_secs
    )
}

pub fn result_reply(result: &TradeResult, stats: &SessionStats) -> String {
    let headline = match result.outcome {
        crate::broker::TradeOutcome::Win => {
            format!("✅ Trade won!\nProfit: ${}", result.profit)
        }
        crate::broker::TradeOutcome::Loss => {
            format!("❌ Trade lost.\nLoss: ${}", result.profit.abs())
        }
        crate::broker::TradeOutcome::Draw => {
            "➖ Trade closed at entry. No profit, no loss.".to_string()
        }
        crate::broker::TradeOutcome::Error => {
            format!("⚠️ Trade closed with an unrecognized outcome: {}", result.raw)
        }
    };
    format!(
        "{headline}\nSession: W:{} L:{} | Total profit: ${}",
        stats.wins, stats.losses, stats.total_profit
    )
}

pub fn trade_error_reply(err: &TradeError) -> String {
    match err {
        TradeError::ResultTimeout { .. } => format!(
            "⚠️ {err}. The outcome is unknown; check your account before resubmitting."
        ),
        _ => format!("❌ Trade failed: {err}"),
    }
}

pub fn rejection_reply(err: &SignalError) -> String {
    format!(
        "⚠️ Signal not recognized: {err}\n\
         Format: ASSET DIRECTION AMOUNT DURATION\n\
         Example: EURUSD CALL 1 60"
    )
}

fn assets_reply(instruments: &[Instrument]) -> String {
    if instruments.is_empty() {
        return "No assets are currently open for trading.".to_string();
    }
    let mut lines = vec![format!("📈 {} assets open for trading:", instruments.len())];
    for instrument in instruments {
        match instrument.payout_pct {
            Some(payout) => lines.push(format!("{} ({payout:.0}%)", instrument.symbol)),
            None => lines.push(instrument.symbol.clone()),
        }
    }
    lines.join("\n")
}
