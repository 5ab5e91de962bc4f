//! Quotex Runner Library
//!
//! Orchestration layer over the broker's unofficial API: parse trade
//! signals, execute them, and report outcomes to the console or Telegram.

pub mod broker;
pub mod client;
pub mod config;
pub mod executor;
pub mod receiver;
pub mod signal;
pub mod strategy;

// Re-export main types for convenience
pub use broker::{
    Broker, BrokerError, Candle, Instrument, OrderClose, OrderRequest, OrderStatus, OrderTicket,
    TradeOutcome,
};
pub use client::QuotexClient;
pub use config::{AccountType, AllowList, Config};
pub use executor::{SessionStats, TradeError, TradeExecutor, TradeResult};
pub use receiver::SignalReceiver;
pub use signal::{Direction, SignalError, TradeSignal};
pub use strategy::{AutoTrader, Martingale, StrategySignal};
