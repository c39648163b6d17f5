// In crates/risk/src/types.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::{Error, Result};

/// Hard risk limits, loaded once at startup and read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskLimits {
    /// Largest single position as a fraction of account value (e.g. 0.10 for 10%).
    pub max_position_size: Decimal,
    /// Largest tolerated daily loss as a fraction of account value.
    pub max_daily_loss: Decimal,
    /// Leverage ceiling: total absolute exposure divided by account value.
    pub max_portfolio_exposure: Decimal,
    pub max_trades_per_day: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size: dec!(0.10),
            max_daily_loss: dec!(0.02),
            max_portfolio_exposure: dec!(1.5),
            max_trades_per_day: 10,
        }
    }
}

impl RiskLimits {
    /// Builds a validated set of limits.
    pub fn new(
        max_position_size: Decimal,
        max_daily_loss: Decimal,
        max_portfolio_exposure: Decimal,
        max_trades_per_day: u32,
    ) -> Result<Self> {
        let limits = Self {
            max_position_size,
            max_daily_loss,
            max_portfolio_exposure,
            max_trades_per_day,
        };
        limits.validate()?;
        Ok(limits)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_position_size <= Decimal::ZERO || self.max_position_size > Decimal::ONE {
            return Err(Error::InvalidLimits(format!(
                "max_position_size must be in (0, 1], got {}",
                self.max_position_size
            )));
        }
        if self.max_daily_loss <= Decimal::ZERO || self.max_daily_loss > Decimal::ONE {
            return Err(Error::InvalidLimits(format!(
                "max_daily_loss must be in (0, 1], got {}",
                self.max_daily_loss
            )));
        }
        if self.max_portfolio_exposure <= Decimal::ZERO {
            return Err(Error::InvalidLimits(format!(
                "max_portfolio_exposure must be positive, got {}",
                self.max_portfolio_exposure
            )));
        }
        if self.max_trades_per_day == 0 {
            return Err(Error::InvalidLimits(
                "max_trades_per_day must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// The outcome of a risk check.
///
/// A rejection is a normal value, not an error: callers branch on `approved`
/// and may retry with `max_shares` when it is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskCheckResult {
    pub approved: bool,
    pub reason: String,
    /// Largest share count that would pass the failing check, when one exists.
    pub max_shares: Option<u64>,
    /// Non-fatal advisories.
    pub warnings: Vec<String>,
}

impl RiskCheckResult {
    pub fn approve(reason: impl Into<String>) -> Self {
        Self {
            approved: true,
            reason: reason.into(),
            max_shares: None,
            warnings: Vec::new(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
            max_shares: None,
            warnings: Vec::new(),
        }
    }

    pub fn with_max_shares(mut self, max_shares: u64) -> Self {
        self.max_shares = Some(max_shares);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn is_rejected(&self) -> bool {
        !self.approved
    }
}

/// Read-only snapshot of today's counters for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub trades_today: u32,
    pub daily_pnl: Decimal,
    pub limits: RiskLimits,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_are_valid() {
        assert_eq!(RiskLimits::default().validate(), Ok(()));
    }

    #[test]
    fn out_of_range_fractions_are_refused() {
        assert!(matches!(
            RiskLimits::new(dec!(0), dec!(0.02), dec!(1.5), 10),
            Err(Error::InvalidLimits(_))
        ));
        assert!(matches!(
            RiskLimits::new(dec!(0.1), dec!(1.2), dec!(1.5), 10),
            Err(Error::InvalidLimits(_))
        ));
        assert!(matches!(
            RiskLimits::new(dec!(0.1), dec!(0.02), dec!(-1), 10),
            Err(Error::InvalidLimits(_))
        ));
        assert!(matches!(
            RiskLimits::new(dec!(0.1), dec!(0.02), dec!(1.5), 0),
            Err(Error::InvalidLimits(_))
        ));
    }

    #[test]
    fn builders_compose() {
        let result = RiskCheckResult::reject("too big")
            .with_max_shares(66)
            .with_warning("near limit");
        assert!(result.is_rejected());
        assert_eq!(result.max_shares, Some(66));
        assert_eq!(result.warnings, vec!["near limit".to_string()]);
    }
}
