// In crates/core-types/src/types.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A ticker symbol, e.g. "AAPL".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol(s.to_string())
    }
}

/// The direction of a proposed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("buy"),
            Side::Sell => f.write_str("sell"),
        }
    }
}

impl FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(Error::UnknownSide(other.to_string())),
        }
    }
}

/// Broker-reported account state, read fresh for every check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Total account value (equity).
    pub total_value: Decimal,
    /// Cash and margin available to fund new purchases.
    pub buying_power: Decimal,
    pub cash: Decimal,
}

/// A single holding at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    /// Share count; negative for a short position.
    pub quantity: i64,
    /// Current market value; may be negative for shorts.
    pub market_value: Decimal,
}

impl Position {
    pub fn is_short(&self) -> bool {
        self.quantity < 0
    }
}

/// A trade the decision logic wants to place. Built once per decision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeProposal {
    pub symbol: Symbol,
    pub side: Side,
    pub shares: u64,
    pub price: Decimal,
}

impl TradeProposal {
    pub fn new(symbol: impl Into<Symbol>, side: Side, shares: u64, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            shares,
            price,
        }
    }

    /// Dollar value of the trade (`shares * price`), or `None` if it does
    /// not fit in a `Decimal`.
    pub fn notional(&self) -> Option<Decimal> {
        Decimal::from(self.shares).checked_mul(self.price)
    }

    /// The same proposal resized to `shares`.
    pub fn with_shares(&self, shares: u64) -> Self {
        Self {
            shares,
            ..self.clone()
        }
    }
}
