//! Trade executor
//!
//! Sequences one trade end-to-end against the broker: resolve the asset
//! (falling back to the OTC variant when the primary market is closed),
//! place the order, then wait for the broker to report the close. Keeps
//! running win/loss statistics for the process lifetime.
//!
//! State machine per trade: Idle → Placed → AwaitingResult →
//! {Resolved | TimedOut | Rejected}. No automatic retries anywhere:
//! resubmitting a financial order automatically is unsafe, so rejected and
//! timed-out trades are reported to the caller as-is.

use std::sync::Mutex;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::broker::{
    Broker, BrokerError, Candle, Instrument, OrderClose, OrderRequest, OrderStatus, OrderTicket,
    TradeOutcome,
};
use crate::signal::TradeSignal;

/// Default grace period past contract expiry before giving up on a close
/// record. The upstream wrapper's own margin is undocumented; this one is
/// deliberately a few seconds and configurable.
pub const DEFAULT_RESULT_GRACE: Duration = Duration::from_secs(5);

/// Default pause between result polls once the contract has expired
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Errors from the trade sequencing itself
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("connection error: {0}")]
    Connection(#[source] BrokerError),

    #[error("order rejected: {0}")]
    OrderRejected(String),

    /// The broker never reported a close within the timeout. The order's
    /// outcome is unknown; this is not a confirmed loss.
    #[error("no result for order {order_id} within {waited_secs}s of placement")]
    ResultTimeout { order_id: String, waited_secs: u64 },
}

impl From<BrokerError> for TradeError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::Rejected(reason) => TradeError::OrderRejected(reason),
            other => TradeError::Connection(other),
        }
    }
}

/// Outcome of one settled trade, reported to the caller and discarded
#[derive(Debug, Clone)]
pub struct TradeResult {
    /// The signal this trade was placed for
    pub signal: TradeSignal,
    /// Asset actually traded; may be the `_otc` variant of the signal's asset
    pub asset_traded: String,
    pub outcome: TradeOutcome,
    /// Signed profit as reported by the broker
    pub profit: Decimal,
    /// Opaque broker close record
    pub raw: serde_json::Value,
}

/// Running per-process statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStats {
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub total_profit: Decimal,
}

impl SessionStats {
    fn record(&mut self, result: &TradeResult) {
        self.trades += 1;
        match result.outcome {
            TradeOutcome::Win => self.wins += 1,
            TradeOutcome::Loss => self.losses += 1,
            TradeOutcome::Draw | TradeOutcome::Error => {}
        }
        self.total_profit += result.profit;
    }

    pub fn win_rate_pct(&self) -> f64 {
        if self.trades == 0 {
            return 0.0;
        }
        f64::from(self.wins) / f64::from(self.trades) * 100.0
    }
}

/// Wraps a [`Broker`] and sequences trades against it
pub struct TradeExecutor<B: Broker> {
    broker: B,
    result_grace: Duration,
    poll_interval: Duration,
    stats: Mutex<SessionStats>,
}

impl<B: Broker> TradeExecutor<B> {
    pub fn new(broker: B) -> Self {
        Self {
            broker,
            result_grace: DEFAULT_RESULT_GRACE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            stats: Mutex::new(SessionStats::default()),
        }
    }

    /// Override the post-expiry grace period.
    pub fn with_result_grace(mut self, grace: Duration) -> Self {
        self.result_grace = grace;
        self
    }

    /// Override the result poll cadence (tests use a short one).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Access the wrapped broker (e.g. for client-specific login steps).
    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Establish or reuse the broker session.
    pub async fn connect(&self) -> Result<(), TradeError> {
        self.broker.connect().await.map_err(TradeError::from)
    }

    /// Current account balance.
    pub async fn balance(&self) -> Result<Decimal, TradeError> {
        self.broker.balance().await.map_err(TradeError::from)
    }

    /// Instruments currently open for trading. May be empty.
    pub async fn list_open_assets(&self) -> Result<Vec<Instrument>, TradeError> {
        let mut instruments = self.broker.instruments().await.map_err(TradeError::from)?;
        instruments.retain(|i| i.open);
        Ok(instruments)
    }

    /// Recent candles for an asset, oldest-first.
    pub async fn candles(
        &self,
        asset: &str,
        period_secs: u32,
        count: usize,
    ) -> Result<Vec<Candle>, TradeError> {
        self.broker
            .candles(asset, period_secs, count)
            .await
            .map_err(TradeError::from)
    }

    /// Snapshot of the running statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.lock().expect("stats lock poisoned").clone()
    }

    /// Run one signal end-to-end: connect if needed, resolve the asset,
    /// place the order, await the broker-confirmed close.
    pub async fn execute(&self, signal: TradeSignal) -> Result<TradeResult, TradeError> {
        self.connect().await?;

        let asset = self.resolve_asset(&signal.asset).await?;
        let order = OrderRequest::from_signal(&signal, asset.clone());

        info!(
            "Executing {} on {} for {} with duration {}s (request {})",
            signal.direction, asset, signal.amount, signal.duration_secs, order.request_id
        );

        let ticket = self
            .broker
            .place_order(&order)
            .await
            .map_err(TradeError::from)?;
        info!("Order placed. ID: {}", ticket.order_id);

        let close = self.await_close(&ticket).await?;

        let result = TradeResult {
            signal,
            asset_traded: asset,
            outcome: close.outcome,
            profit: close.profit,
            raw: close.raw,
        };

        let stats = {
            let mut stats = self.stats.lock().expect("stats lock poisoned");
            stats.record(&result);
            stats.clone()
        };
        info!(
            "Order {} closed: {} (profit {}) | W:{} L:{} win rate {:.1}% total {}",
            ticket.order_id,
            result.outcome,
            result.profit,
            stats.wins,
            stats.losses,
            stats.win_rate_pct(),
            stats.total_profit
        );

        Ok(result)
    }

    /// Find a tradable symbol for the requested asset. When the primary
    /// market is closed (or unknown), the `{ASSET}_OTC` variant is tried
    /// before rejecting.
    async fn resolve_asset(&self, asset: &str) -> Result<String, TradeError> {
        let instruments = self.broker.instruments().await.map_err(TradeError::from)?;

        let find = |symbol: &str| {
            instruments
                .iter()
                .find(|i| i.symbol.eq_ignore_ascii_case(symbol))
        };

        if let Some(instrument) = find(asset) {
            if instrument.open {
                return Ok(instrument.symbol.clone());
            }
            warn!("Asset {asset} is closed");
        }

        let otc = format!("{asset}_OTC");
        if let Some(instrument) = find(&otc) {
            if instrument.open {
                warn!("Trying OTC asset -> {}", instrument.symbol);
                return Ok(instrument.symbol.clone());
            }
        }

        Err(TradeError::OrderRejected(format!(
            "no available version of {asset} found"
        )))
    }

    /// Wait out the contract, then poll for the close record until the
    /// grace period runs out.
    async fn await_close(&self, ticket: &OrderTicket) -> Result<OrderClose, TradeError> {
        let until_expiry = (ticket.expires_at() - chrono::Utc::now())
            .to_std()
            .unwrap_or_default();
        let deadline = tokio::time::Instant::now() + until_expiry + self.result_grace;

        if !until_expiry.is_zero() {
            debug!(
                "Waiting {}s for order {} to expire",
                until_expiry.as_secs(),
                ticket.order_id
            );
            tokio::time::sleep(until_expiry).await;
        }

        loop {
            match self
                .broker
                .order_status(&ticket.order_id)
                .await
                .map_err(TradeError::from)?
            {
                OrderStatus::Closed(close) => return Ok(close),
                OrderStatus::Open => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(TradeError::ResultTimeout {
                            order_id: ticket.order_id.clone(),
                            waited_secs: u64::from(ticket.duration_secs)
                                + self.result_grace.as_secs(),
                        });
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::TradeOutcome;

    fn result_with(outcome: TradeOutcome, profit: i64) -> TradeResult {
        TradeResult {
            signal: "EURUSD CALL 5 60".parse().unwrap(),
            asset_traded: "EURUSD".to_string(),
            outcome,
            profit: Decimal::from(profit),
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn stats_accumulate_wins_and_losses() {
        let mut stats = SessionStats::default();
        stats.record(&result_with(TradeOutcome::Win, 4));
        stats.record(&result_with(TradeOutcome::Loss, -5));
        stats.record(&result_with(TradeOutcome::Win, 4));

        assert_eq!(stats.trades, 3);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.total_profit, Decimal::from(3));
        assert!((stats.win_rate_pct() - 66.666).abs() < 0.1);
    }

    #[test]
    fn draws_count_neither_win_nor_loss() {
        let mut stats = SessionStats::default();
        stats.record(&result_with(TradeOutcome::Draw, 0));
        assert_eq!(stats.trades, 1);
        assert_eq!(stats.wins, 0);
        assert_eq!(stats.losses, 0);
    }

    #[test]
    fn empty_stats_have_zero_win_rate() {
        assert_eq!(SessionStats::default().win_rate_pct(), 0.0);
    }

    #[test]
    fn broker_rejection_maps_to_order_rejected() {
        let err = TradeError::from(BrokerError::Rejected("market closed".to_string()));
        assert!(matches!(err, TradeError::OrderRejected(_)));
    }

    #[test]
    fn other_broker_errors_map_to_connection() {
        let err = TradeError::from(BrokerError::NotConnected);
        assert!(matches!(err, TradeError::Connection(_)));
    }
}
