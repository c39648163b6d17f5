// In crates/app-config/src/types.rs

use core_types::{AccountSnapshot, Position, TradeProposal};
use num_traits::FromPrimitive;
use risk::RiskLimits;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{Error, Result};

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Hard risk limits applied to every proposed trade.
    #[serde(default)]
    pub risk: RiskSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

/// Risk limits as written in the config files (plain floats).
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RiskSettings {
    #[serde(default = "default_max_position_size")]
    pub max_position_size: f64,
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: f64,
    /// Leverage ceiling, not a full-investment cap.
    #[serde(default = "default_max_portfolio_exposure")]
    pub max_portfolio_exposure: f64,
    #[serde(default = "default_max_trades_per_day")]
    pub max_trades_per_day: u32,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_position_size: default_max_position_size(),
            max_daily_loss: default_max_daily_loss(),
            max_portfolio_exposure: default_max_portfolio_exposure(),
            max_trades_per_day: default_max_trades_per_day(),
        }
    }
}

impl RiskSettings {
    /// Converts to validated decimal limits.
    pub fn to_limits(&self) -> Result<RiskLimits> {
        let limits = RiskLimits::new(
            to_decimal("max_position_size", self.max_position_size)?,
            to_decimal("max_daily_loss", self.max_daily_loss)?,
            to_decimal("max_portfolio_exposure", self.max_portfolio_exposure)?,
            self.max_trades_per_day,
        )?;
        Ok(limits)
    }
}

fn to_decimal(name: &'static str, value: f64) -> Result<Decimal> {
    Decimal::from_f64(value).ok_or(Error::InvalidNumber { name, value })
}

/// Helper functions for serde defaults
fn default_max_position_size() -> f64 { 0.10 }
fn default_max_daily_loss() -> f64 { 0.02 }
fn default_max_portfolio_exposure() -> f64 { 1.5 }
fn default_max_trades_per_day() -> u32 { 10 }

// --- Structs for portfolio and session files ---

/// Account state and holdings at one point in time, as fed to the risk checks.
#[derive(Deserialize, Debug, Clone)]
pub struct PortfolioSnapshot {
    pub account: AccountSnapshot,
    /// P&L observed so far today.
    #[serde(default)]
    pub current_pnl: Decimal,
    /// Trades already placed today, replayed into the daily counters on load.
    #[serde(default)]
    pub trades_today: u32,
    #[serde(default)]
    pub positions: Vec<Position>,
}

/// A snapshot plus the sequence of trades the decision logic proposed.
#[derive(Deserialize, Debug, Clone)]
pub struct SessionFile {
    #[serde(flatten)]
    pub snapshot: PortfolioSnapshot,
    #[serde(default)]
    pub proposals: Vec<TradeProposal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_not_a_limit() {
        let settings = RiskSettings {
            max_position_size: f64::NAN,
            ..RiskSettings::default()
        };
        assert!(matches!(
            settings.to_limits(),
            Err(Error::InvalidNumber { name: "max_position_size", .. })
        ));
    }

    #[test]
    fn defaults_match_the_builtin_limits() {
        assert_eq!(RiskSettings::default().to_limits().unwrap(), RiskLimits::default());
    }
}
