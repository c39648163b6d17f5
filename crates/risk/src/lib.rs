// In crates/risk/src/lib.rs

use core_types::{Position, TradeProposal};
use rust_decimal::Decimal;

pub mod clock;
pub mod daily;
pub mod error;
pub mod limit_manager;
pub mod types;

// Re-export public types
pub use clock::{Clock, SystemClock};
pub use daily::{DailyLedger, DailyRecord, RETENTION_DAYS};
pub use error::{Error, Result};
pub use limit_manager::LimitRiskManager;
pub use types::{DailyStats, RiskCheckResult, RiskLimits};

/// The universal interface for a pre-trade risk gate.
///
/// A `RiskManager` sits between the decision logic (rule-based or model-based)
/// and order submission. Every proposed order goes through `validate_trade`;
/// only orders that come back approved may be submitted, and each submitted
/// order is then reported through `record_trade`.
pub trait RiskManager: Send + Sync {
    /// The name of the risk management strategy.
    fn name(&self) -> &'static str;

    /// Runs every configured check against a proposed trade.
    ///
    /// # Arguments
    ///
    /// * `proposal`: The symbol, side, share count and price of the trade.
    /// * `account_value`: The total value of the account.
    /// * `current_pnl`: The P&L observed so far today.
    /// * `positions`: The current portfolio.
    /// * `buying_power`: Broker-reported buying power. When present, buys that
    ///   cannot be funded are rejected before any other check runs.
    ///
    /// # Returns
    ///
    /// * `Ok(result)` with `result.approved == true` when every check passed.
    /// * `Ok(result)` with `result.approved == false` for the first failing check.
    /// * `Err(Error::InvalidInput)` if a price, share count or account value is not positive.
    fn validate_trade(
        &self,
        proposal: &TradeProposal,
        account_value: Decimal,
        current_pnl: Decimal,
        positions: &[Position],
        buying_power: Option<Decimal>,
    ) -> Result<RiskCheckResult>;

    /// Counts a submitted trade against today's frequency limit.
    /// Returns the number of trades recorded today.
    fn record_trade(&self, proposal: &TradeProposal) -> u32;

    /// Zeroes today's trade count and prunes counters older than the retention window.
    /// Returns the number of pruned days.
    fn reset_daily_counters(&self) -> usize;

    fn daily_stats(&self) -> DailyStats;
}
