//! Trade signal parsing
//!
//! One line of text, whitespace-delimited: `ASSET DIRECTION AMOUNT DURATION`,
//! e.g. `EURUSD CALL 5 60`. BUY/SELL are accepted as aliases for CALL/PUT.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Direction of a binary-option order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Call,
    Put,
}

impl Direction {
    /// Parse a direction keyword, case-insensitively.
    ///
    /// BUY normalizes to Call, SELL to Put.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "CALL" | "BUY" => Some(Direction::Call),
            "PUT" | "SELL" => Some(Direction::Put),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Call => "CALL",
            Direction::Put => "PUT",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Call => Direction::Put,
            Direction::Put => Direction::Call,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a line of text was not accepted as a trade signal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("expected 4 fields `ASSET DIRECTION AMOUNT DURATION`, got {found}")]
    Malformed { found: usize },

    #[error("unknown direction `{0}` (use CALL, PUT, BUY or SELL)")]
    InvalidDirection(String),

    #[error("amount `{0}` is not a positive number")]
    InvalidAmount(String),

    #[error("duration `{0}` is not a positive number of seconds")]
    InvalidDuration(String),
}

/// One validated trade instruction.
///
/// Immutable once constructed; consumed exactly once by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    /// Instrument symbol, uppercased (e.g. "EURUSD")
    pub asset: String,
    pub direction: Direction,
    /// Stake in account currency, strictly positive
    pub amount: Decimal,
    /// Contract expiry window in seconds from placement, strictly positive
    pub duration_secs: u32,
}

impl FromStr for TradeSignal {
    type Err = SignalError;

    /// Validation order: field count, direction, amount, duration.
    /// First failure wins.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(SignalError::Malformed {
                found: fields.len(),
            });
        }

        let direction = Direction::parse(fields[1])
            .ok_or_else(|| SignalError::InvalidDirection(fields[1].to_string()))?;

        let amount: Decimal = fields[2]
            .parse()
            .map_err(|_| SignalError::InvalidAmount(fields[2].to_string()))?;
        if amount <= Decimal::ZERO {
            return Err(SignalError::InvalidAmount(fields[2].to_string()));
        }

        let duration_secs: u32 = fields[3]
            .parse()
            .map_err(|_| SignalError::InvalidDuration(fields[3].to_string()))?;
        if duration_secs == 0 {
            return Err(SignalError::InvalidDuration(fields[3].to_string()));
        }

        Ok(TradeSignal {
            asset: fields[0].to_ascii_uppercase(),
            direction,
            amount,
            duration_secs,
        })
    }
}

impl fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}s",
            self.asset, self.direction, self.amount, self.duration_secs
        )
    }
}
