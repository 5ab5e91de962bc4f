//! Automated trading strategies
//!
//! Pure signal functions over candle closes plus the [`AutoTrader`] loop
//! that drives them through the executor. Three strategies: SMA crossover,
//! RSI extremes, and a Martingale stake ladder.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use ta::indicators::{RelativeStrengthIndex, SimpleMovingAverage};
use ta::Next;
use tracing::{error, info, warn};

use crate::broker::{Broker, TradeOutcome};
use crate::executor::{TradeError, TradeExecutor};
use crate::signal::{Direction, TradeSignal};

/// Pause between strategy evaluations (the original bot's cadence)
pub const DEFAULT_ANALYSIS_INTERVAL: Duration = Duration::from_secs(70);

/// Pause before retrying after a failed candle fetch
const FETCH_RETRY_PAUSE: Duration = Duration::from_secs(5);

/// Candle feed parameters for indicator-based strategies
const CANDLE_PERIOD_SECS: u32 = 60;
const CANDLE_COUNT: usize = 60;

/// What a strategy evaluation concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategySignal {
    Call,
    Put,
    Neutral,
}

impl StrategySignal {
    pub fn direction(self) -> Option<Direction> {
        match self {
            StrategySignal::Call => Some(Direction::Call),
            StrategySignal::Put => Some(Direction::Put),
            StrategySignal::Neutral => None,
        }
    }
}

/// SMA crossover: short MA above long MA means momentum up (Call),
/// below means momentum down (Put).
pub fn sma_crossover_signal(
    closes: &[f64],
    short_period: usize,
    long_period: usize,
) -> StrategySignal {
    if short_period == 0 || long_period <= short_period || closes.len() < long_period {
        return StrategySignal::Neutral;
    }
    let (Ok(mut short), Ok(mut long)) = (
        SimpleMovingAverage::new(short_period),
        SimpleMovingAverage::new(long_period),
    ) else {
        return StrategySignal::Neutral;
    };

    let mut short_ma = 0.0;
    let mut long_ma = 0.0;
    for &close in closes {
        short_ma = short.next(close);
        long_ma = long.next(close);
    }

    if short_ma > long_ma {
        StrategySignal::Call
    } else if short_ma < long_ma {
        StrategySignal::Put
    } else {
        StrategySignal::Neutral
    }
}

/// RSI extremes: oversold means a reversal up (Call), overbought a
/// reversal down (Put).
pub fn rsi_signal(
    closes: &[f64],
    period: usize,
    oversold: f64,
    overbought: f64,
) -> StrategySignal {
    if period == 0 || closes.len() < period + 1 {
        return StrategySignal::Neutral;
    }
    let Ok(mut rsi) = RelativeStrengthIndex::new(period) else {
        return StrategySignal::Neutral;
    };

    let mut value = 50.0;
    for &close in closes {
        value = rsi.next(close);
    }

    if value <= oversold {
        StrategySignal::Call
    } else if value >= overbought {
        StrategySignal::Put
    } else {
        StrategySignal::Neutral
    }
}

/// Martingale stake ladder: double the stake after each loss, reset on a
/// win or when the ladder reaches its cap.
#[derive(Debug, Clone)]
pub struct Martingale {
    base_amount: Decimal,
    max_step: u32,
    step: u32,
}

impl Martingale {
    pub fn new(base_amount: Decimal, max_step: u32) -> Self {
        Self {
            base_amount,
            max_step: max_step.max(1),
            step: 0,
        }
    }

    pub fn current_amount(&self) -> Decimal {
        self.base_amount * Decimal::from(2u64.pow(self.step))
    }

    pub fn record_win(&mut self) {
        self.step = 0;
    }

    pub fn record_loss(&mut self) {
        self.step += 1;
        if self.step >= self.max_step {
            self.step = 0;
        }
    }
}

/// Drives one strategy against the executor for a bounded number of trades
pub struct AutoTrader<B: Broker> {
    executor: Arc<TradeExecutor<B>>,
    asset: String,
    amount: Decimal,
    duration_secs: u32,
    interval: Duration,
}

impl<B: Broker> AutoTrader<B> {
    pub fn new(
        executor: Arc<TradeExecutor<B>>,
        asset: String,
        amount: Decimal,
        duration_secs: u32,
    ) -> Self {
        Self {
            executor,
            asset,
            amount,
            duration_secs,
            interval: DEFAULT_ANALYSIS_INTERVAL,
        }
    }

    /// Override the pause between evaluations (tests use a short one).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the SMA crossover strategy until `max_trades` trades were placed.
    pub async fn run_sma(
        &self,
        short_period: usize,
        long_period: usize,
        max_trades: u32,
    ) -> Result<(), TradeError> {
        self.executor.connect().await?;
        info!(
            "Starting SMA strategy on {} (short {}, long {})",
            self.asset, short_period, long_period
        );

        let mut executed = 0;
        while executed < max_trades {
            match self.evaluate_candles(|closes| {
                sma_crossover_signal(closes, short_period, long_period)
            })
            .await
            {
                Some(direction) => {
                    info!("{direction} signal detected");
                    self.place(direction).await;
                    executed += 1;
                }
                None => info!("No clear signal"),
            }
            tokio::time::sleep(self.interval).await;
        }

        self.log_summary();
        Ok(())
    }

    /// Run the RSI strategy until `max_trades` trades were placed.
    pub async fn run_rsi(
        &self,
        period: usize,
        oversold: f64,
        overbought: f64,
        max_trades: u32,
    ) -> Result<(), TradeError> {
        self.executor.connect().await?;
        info!(
            "Starting RSI strategy on {} (period {}, oversold {}, overbought {})",
            self.asset, period, oversold, overbought
        );

        let mut executed = 0;
        while executed < max_trades {
            match self
                .evaluate_candles(|closes| rsi_signal(closes, period, oversold, overbought))
                .await
            {
                Some(direction) => {
                    info!("{direction} signal detected");
                    self.place(direction).await;
                    executed += 1;
                }
                None => info!("No signal (RSI in neutral zone)"),
            }
            tokio::time::sleep(self.interval).await;
        }

        self.log_summary();
        Ok(())
    }

    /// Run the Martingale ladder for `max_trades` trades, flipping
    /// direction after each win.
    pub async fn run_martingale(
        &self,
        max_step: u32,
        max_trades: u32,
        initial_direction: Direction,
    ) -> Result<(), TradeError> {
        self.executor.connect().await?;
        info!(
            "Starting Martingale strategy on {} (base ${}, max step {})",
            self.asset, self.amount, max_step
        );

        let mut ladder = Martingale::new(self.amount, max_step);
        let mut direction = initial_direction;

        for trade_no in 1..=max_trades {
            let amount = ladder.current_amount();
            info!("Trade {trade_no}/{max_trades}, stake ${amount}");

            let signal = TradeSignal {
                asset: self.asset.clone(),
                direction,
                amount,
                duration_secs: self.duration_secs,
            };
            match self.executor.execute(signal).await {
                Ok(result) => match result.outcome {
                    TradeOutcome::Win => {
                        ladder.record_win();
                        direction = direction.opposite();
                        info!("Win! Resetting to base stake ${}", self.amount);
                    }
                    TradeOutcome::Loss => {
                        ladder.record_loss();
                        info!("Loss! Next stake ${}", ladder.current_amount());
                    }
                    other => info!("Trade closed {other}, keeping stake"),
                },
                Err(err) => warn!("Trade failed: {err}"),
            }

            tokio::time::sleep(self.interval).await;
        }

        self.log_summary();
        Ok(())
    }

    /// Fetch candles and evaluate a signal function over the closes.
    async fn evaluate_candles<F>(&self, evaluate: F) -> Option<Direction>
    where
        F: Fn(&[f64]) -> StrategySignal,
    {
        let candles = match self
            .executor
            .candles(&self.asset, CANDLE_PERIOD_SECS, CANDLE_COUNT)
            .await
        {
            Ok(candles) if !candles.is_empty() => candles,
            Ok(_) => {
                warn!("Empty candle response for {}", self.asset);
                tokio::time::sleep(FETCH_RETRY_PAUSE).await;
                return None;
            }
            Err(err) => {
                error!("Failed to fetch candles: {err}");
                tokio::time::sleep(FETCH_RETRY_PAUSE).await;
                return None;
            }
        };

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        evaluate(&closes).direction()
    }

    /// Place one trade in the configured direction; failures are logged and
    /// do not stop the strategy loop.
    async fn place(&self, direction: Direction) {
        let signal = TradeSignal {
            asset: self.asset.clone(),
            direction,
            amount: self.amount,
            duration_secs: self.duration_secs,
        };
        if let Err(err) = self.executor.execute(signal).await {
            warn!("Trade failed: {err}");
        }
    }

    fn log_summary(&self) {
        let stats = self.executor.stats();
        info!("Strategy completed");
        info!(
            "Total trades: {} | Wins: {} Losses: {} | Win rate {:.1}% | Total profit ${}",
            stats.trades,
            stats.wins,
            stats.losses,
            stats.win_rate_pct(),
            stats.total_profit
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 1.0 + i as f64 * 0.01).collect()
    }

    fn falling(n: usize) -> Vec<f64> {
        (0..n).map(|i| 2.0 - i as f64 * 0.01).collect()
    }

    #[test]
    fn sma_rising_market_signals_call() {
        assert_eq!(sma_crossover_signal(&rising(40), 5, 20), StrategySignal::Call);
    }

    #[test]
    fn sma_falling_market_signals_put() {
        assert_eq!(sma_crossover_signal(&falling(40), 5, 20), StrategySignal::Put);
    }

    #[test]
    fn sma_needs_enough_candles() {
        assert_eq!(sma_crossover_signal(&rising(10), 5, 20), StrategySignal::Neutral);
    }

    #[test]
    fn sma_rejects_degenerate_periods() {
        assert_eq!(sma_crossover_signal(&rising(40), 20, 5), StrategySignal::Neutral);
        assert_eq!(sma_crossover_signal(&rising(40), 0, 20), StrategySignal::Neutral);
    }

    #[test]
    fn rsi_falling_market_is_oversold_call() {
        assert_eq!(rsi_signal(&falling(40), 14, 30.0, 70.0), StrategySignal::Call);
    }

    #[test]
    fn rsi_rising_market_is_overbought_put() {
        assert_eq!(rsi_signal(&rising(40), 14, 30.0, 70.0), StrategySignal::Put);
    }

    #[test]
    fn rsi_needs_enough_candles() {
        assert_eq!(rsi_signal(&rising(5), 14, 30.0, 70.0), StrategySignal::Neutral);
    }

    #[test]
    fn rsi_flat_market_is_neutral() {
        let flat = vec![1.5; 40];
        assert_eq!(rsi_signal(&flat, 14, 30.0, 70.0), StrategySignal::Neutral);
    }

    #[test]
    fn martingale_doubles_after_losses() {
        let mut ladder = Martingale::new(Decimal::from(1), 4);
        assert_eq!(ladder.current_amount(), Decimal::from(1));

        ladder.record_loss();
        assert_eq!(ladder.current_amount(), Decimal::from(2));
        ladder.record_loss();
        assert_eq!(ladder.current_amount(), Decimal::from(4));
        ladder.record_loss();
        assert_eq!(ladder.current_amount(), Decimal::from(8));
    }

    #[test]
    fn martingale_resets_at_max_step() {
        let mut ladder = Martingale::new(Decimal::from(1), 2);
        ladder.record_loss();
        assert_eq!(ladder.current_amount(), Decimal::from(2));
        // Hitting the cap resets the ladder rather than doubling again.
        ladder.record_loss();
        assert_eq!(ladder.current_amount(), Decimal::from(1));
    }

    #[test]
    fn martingale_resets_on_win() {
        let mut ladder = Martingale::new(Decimal::from(1), 4);
        ladder.record_loss();
        ladder.record_loss();
        assert_eq!(ladder.current_amount(), Decimal::from(4));
        ladder.record_win();
        assert_eq!(ladder.current_amount(), Decimal::from(1));
    }

    #[test]
    fn strategy_signal_direction_mapping() {
        assert_eq!(StrategySignal::Call.direction(), Some(Direction::Call));
        assert_eq!(StrategySignal::Put.direction(), Some(Direction::Put));
        assert_eq!(StrategySignal::Neutral.direction(), None);
    }
}
