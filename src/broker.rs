//! Broker seam
//!
//! The [`Broker`] trait abstracts the external binary-options API so the
//! executor can run against the live client or a scripted mock in tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::signal::{Direction, TradeSignal};

/// Errors raised by the broker client itself
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("broker api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("two-factor pin required (check your email)")]
    PinRequired,

    #[error("not connected to broker")]
    NotConnected,

    #[error("order rejected: {0}")]
    Rejected(String),
}

/// One tradable instrument as reported by the broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    /// Whether the market is currently open for this instrument
    pub open: bool,
    /// Payout percentage for a winning contract, when reported
    #[serde(default)]
    pub payout_pct: Option<f64>,
}

/// OHLC candle, oldest-first in any returned sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Order submission payload
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    /// Client-side id for tracing one trade attempt through the logs
    pub request_id: Uuid,
    pub asset: String,
    pub direction: Direction,
    pub amount: Decimal,
    pub duration_secs: u32,
}

impl OrderRequest {
    /// Build a request from a validated signal and the asset actually traded
    /// (which may be the `_otc` variant of the signal's asset).
    pub fn from_signal(signal: &TradeSignal, asset: String) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            asset,
            direction: signal.direction,
            amount: signal.amount,
            duration_secs: signal.duration_secs,
        }
    }
}

/// Handle for a placed order, used to poll for the close
#[derive(Debug, Clone)]
pub struct OrderTicket {
    /// Broker-assigned order id
    pub order_id: String,
    pub request_id: Uuid,
    pub asset: String,
    pub placed_at: DateTime<Utc>,
    pub duration_secs: u32,
}

impl OrderTicket {
    /// Moment the contract expires and a close record becomes available.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.placed_at + ChronoDuration::seconds(i64::from(self.duration_secs))
    }
}

/// Broker-confirmed outcome of a closed order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Win,
    Loss,
    Draw,
    /// Close record present but the outcome field was unrecognized
    Error,
}

impl std::fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TradeOutcome::Win => "WIN",
            TradeOutcome::Loss => "LOSS",
            TradeOutcome::Draw => "DRAW",
            TradeOutcome::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// Close record for a settled order
#[derive(Debug, Clone)]
pub struct OrderClose {
    pub outcome: TradeOutcome,
    /// Signed profit: positive on win, negative on loss, zero on draw
    pub profit: Decimal,
    /// Opaque broker response, kept for reporting
    pub raw: serde_json::Value,
}

/// Current state of a placed order
#[derive(Debug, Clone)]
pub enum OrderStatus {
    Open,
    Closed(OrderClose),
}

/// Operations the executor needs from the external broker.
///
/// Mirrors the surface of the unofficial API wrapper: connect once, then
/// place orders, poll results, and read account/market data.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Establish or reuse a session. Safe to call before every trade.
    async fn connect(&self) -> Result<(), BrokerError>;

    /// Current account balance.
    async fn balance(&self) -> Result<Decimal, BrokerError>;

    /// All instruments the broker currently lists, open or not.
    async fn instruments(&self) -> Result<Vec<Instrument>, BrokerError>;

    /// Submit an order. Rejections are broker-signaled, not validated here.
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderTicket, BrokerError>;

    /// Poll the state of a previously placed order.
    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, BrokerError>;

    /// Most recent candles for an asset, oldest-first.
    async fn candles(
        &self,
        asset: &str,
        period_secs: u32,
        count: usize,
    ) -> Result<Vec<Candle>, BrokerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::TradeSignal;

    #[test]
    fn ticket_expiry_is_placement_plus_duration() {
        let placed = Utc::now();
        let ticket = OrderTicket {
            order_id: "42".to_string(),
            request_id: Uuid::new_v4(),
            asset: "EURUSD".to_string(),
            placed_at: placed,
            duration_secs: 60,
        };
        assert_eq!(ticket.expires_at() - placed, ChronoDuration::seconds(60));
    }

    #[test]
    fn order_request_carries_resolved_asset() {
        let signal: TradeSignal = "EURUSD CALL 5 60".parse().unwrap();
        let order = OrderRequest::from_signal(&signal, "EURUSD_OTC".to_string());
        assert_eq!(order.asset, "EURUSD_OTC");
        assert_eq!(order.direction, signal.direction);
        assert_eq!(order.amount, signal.amount);
        assert_eq!(order.duration_secs, 60);
    }
}
