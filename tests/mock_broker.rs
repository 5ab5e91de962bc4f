//! Mocked Broker for testing without the live API

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use quotex_runner::{
    Broker, BrokerError, Candle, Instrument, OrderClose, OrderRequest, OrderStatus, OrderTicket,
    TradeOutcome,
};

pub fn instrument(symbol: &str, open: bool) -> Instrument {
    Instrument {
        symbol: symbol.to_string(),
        name: symbol.to_string(),
        open,
        payout_pct: Some(85.0),
    }
}

/// Scripted broker: every behavior is set up front, every interaction is
/// recorded for assertions.
pub struct MockBroker {
    instruments: Vec<Instrument>,
    balance: Decimal,
    candles: Vec<Candle>,
    /// Outcome and profit once an order closes; `None` never closes
    close: Option<(TradeOutcome, Decimal)>,
    /// Status polls answered `Open` before the close record appears
    polls_before_close: u32,
    rejection: Option<String>,
    fail_connect: bool,
    placed: Mutex<Vec<OrderRequest>>,
    polls: Mutex<u32>,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self {
            instruments: vec![instrument("EURUSD", true), instrument("GBPJPY", true)],
            balance: Decimal::from(1000),
            candles: Vec::new(),
            close: Some((TradeOutcome::Win, Decimal::from_str_exact("4.25").unwrap())),
            polls_before_close: 0,
            rejection: None,
            fail_connect: false,
            placed: Mutex::new(Vec::new()),
            polls: Mutex::new(0),
        }
    }
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instruments(mut self, instruments: Vec<Instrument>) -> Self {
        self.instruments = instruments;
        self
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_candles(mut self, candles: Vec<Candle>) -> Self {
        self.candles = candles;
        self
    }

    pub fn with_close(mut self, outcome: TradeOutcome, profit: Decimal) -> Self {
        self.close = Some((outcome, profit));
        self
    }

    pub fn with_polls_before_close(mut self, polls: u32) -> Self {
        self.polls_before_close = polls;
        self
    }

    /// Orders never close; `await_result` has to time out.
    pub fn never_closing(mut self) -> Self {
        self.close = None;
        self
    }

    pub fn with_order_rejection(mut self, reason: &str) -> Self {
        self.rejection = Some(reason.to_string());
        self
    }

    pub fn with_connect_failure(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> u32 {
        *self.polls.lock().unwrap()
    }
}

#[async_trait]
impl Broker for MockBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        if self.fail_connect {
            return Err(BrokerError::Auth("invalid credentials".to_string()));
        }
        Ok(())
    }

    async fn balance(&self) -> Result<Decimal, BrokerError> {
        Ok(self.balance)
    }

    async fn instruments(&self) -> Result<Vec<Instrument>, BrokerError> {
        Ok(self.instruments.clone())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderTicket, BrokerError> {
        if let Some(reason) = &self.rejection {
            return Err(BrokerError::Rejected(reason.clone()));
        }

        let mut placed = self.placed.lock().unwrap();
        placed.push(order.clone());

        // Backdate placement so the contract is already expired and the
        // executor polls immediately instead of sleeping out the duration.
        Ok(OrderTicket {
            order_id: format!("ORD-{}", placed.len()),
            request_id: order.request_id,
            asset: order.asset.clone(),
            placed_at: Utc::now() - ChronoDuration::seconds(i64::from(order.duration_secs)),
            duration_secs: order.duration_secs,
        })
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, BrokerError> {
        let mut polls = self.polls.lock().unwrap();
        *polls += 1;

        let Some((outcome, profit)) = self.close else {
            return Ok(OrderStatus::Open);
        };
        if *polls <= self.polls_before_close {
            return Ok(OrderStatus::Open);
        }

        Ok(OrderStatus::Closed(OrderClose {
            outcome,
            profit,
            raw: json!({"id": order_id, "status": "closed"}),
        }))
    }

    async fn candles(
        &self,
        _asset: &str,
        _period_secs: u32,
        _count: usize,
    ) -> Result<Vec<Candle>, BrokerError> {
        Ok(self.candles.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn order(asset: &str) -> OrderRequest {
        OrderRequest {
            request_id: Uuid::new_v4(),
            asset: asset.to_string(),
            direction: quotex_runner::Direction::Call,
            amount: Decimal::from(5),
            duration_secs: 60,
        }
    }

    #[tokio::test]
    async fn records_placed_orders() {
        let broker = MockBroker::new();
        broker.place_order(&order("EURUSD")).await.unwrap();
        broker.place_order(&order("GBPJPY")).await.unwrap();

        let placed = broker.placed_orders();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].asset, "EURUSD");
        assert_eq!(placed[1].asset, "GBPJPY");
    }

    #[tokio::test]
    async fn tickets_are_backdated_to_expiry() {
        let broker = MockBroker::new();
        let ticket = broker.place_order(&order("EURUSD")).await.unwrap();
        assert!(ticket.expires_at() <= Utc::now());
    }

    #[tokio::test]
    async fn close_appears_after_configured_polls() {
        let broker = MockBroker::new().with_polls_before_close(2);
        let ticket = broker.place_order(&order("EURUSD")).await.unwrap();

        assert!(matches!(
            broker.order_status(&ticket.order_id).await.unwrap(),
            OrderStatus::Open
        ));
        assert!(matches!(
            broker.order_status(&ticket.order_id).await.unwrap(),
            OrderStatus::Open
        ));
        assert!(matches!(
            broker.order_status(&ticket.order_id).await.unwrap(),
            OrderStatus::Closed(_)
        ));
    }

    #[tokio::test]
    async fn rejection_never_records_an_order() {
        let broker = MockBroker::new().with_order_rejection("market closed");
        let err = broker.place_order(&order("EURUSD")).await.unwrap_err();
        assert!(matches!(err, BrokerError::Rejected(_)));
        assert!(broker.placed_orders().is_empty());
    }
}
