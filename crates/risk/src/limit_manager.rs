// In crates/risk/src/limit_manager.rs

use crate::clock::{Clock, SystemClock};
use crate::daily::DailyLedger;
use crate::types::{DailyStats, RiskCheckResult, RiskLimits};
use crate::{Error, Result, RiskManager};
use core_types::{Position, Side, Symbol, TradeProposal};
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fraction of the position limit above which a warning is attached.
const POSITION_WARN_RATIO: Decimal = dec!(0.80);
/// Fraction of the daily loss limit above which a warning is attached.
const DAILY_LOSS_WARN_RATIO: Decimal = dec!(0.75);
/// Fraction of the daily trade cap above which a warning is attached.
const FREQUENCY_WARN_RATIO: Decimal = dec!(0.80);
/// Exposure above this ratio means margin is in use.
const MARGIN_WARN_EXPOSURE: Decimal = dec!(1.10);
/// Exposure below this ratio means capital is sitting idle.
const UNDERDEPLOYED_EXPOSURE: Decimal = dec!(0.70);

/// A risk manager that enforces fixed position, loss, exposure and frequency limits.
///
/// The checks are pure threshold comparisons. The only mutable state is the
/// per-day ledger of trade counts and observed P&L, which sits behind a mutex
/// so a single instance can be shared between tasks.
#[derive(Debug)]
pub struct LimitRiskManager<C: Clock = SystemClock> {
    limits: RiskLimits,
    ledger: Mutex<DailyLedger>,
    clock: C,
}

impl LimitRiskManager<SystemClock> {
    /// Creates a manager keyed on the host's local date.
    pub fn new(limits: RiskLimits) -> Self {
        Self::with_clock(limits, SystemClock)
    }
}

impl<C: Clock> LimitRiskManager<C> {
    pub fn with_clock(limits: RiskLimits, clock: C) -> Self {
        Self {
            limits,
            ledger: Mutex::new(DailyLedger::new()),
            clock,
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Restores today's trade count from an external record (broker fills,
    /// a previous process) so the frequency cap survives a restart.
    pub fn restore_trade_count(&self, trades_today: u32) {
        let today = self.clock.today();
        self.ledger().set_trades(today, trades_today);
        tracing::info!(%today, trades_today, "Restored today's trade count.");
    }

    /// Restores today's P&L from an external record without running the
    /// daily loss check.
    pub fn restore_pnl(&self, current_pnl: Decimal) {
        let today = self.clock.today();
        self.ledger().record_pnl(today, current_pnl);
        tracing::info!(%today, %current_pnl, "Restored today's P&L.");
    }

    // The ledger holds plain counters, so a poisoned lock is still usable.
    fn ledger(&self) -> MutexGuard<'_, DailyLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rejects a position whose value exceeds `max_position_size` of the account.
    ///
    /// On rejection `max_shares` holds the largest share count that fits.
    pub fn check_position_size(
        &self,
        symbol: &Symbol,
        shares: u64,
        price: Decimal,
        account_value: Decimal,
    ) -> Result<RiskCheckResult> {
        ensure_shares(shares)?;
        ensure_positive("price", price)?;
        ensure_positive("account_value", account_value)?;

        let position_value = checked_mul("position value", Decimal::from(shares), price)?;
        let max_value = checked_mul(
            "position limit",
            account_value,
            self.limits.max_position_size,
        )?;
        let position_pct = percent(checked_div("position size", position_value, account_value)?)?;
        let limit_pct = percent(self.limits.max_position_size)?;

        if position_value > max_value {
            let max_shares = floor_shares(max_value, price)?;
            tracing::debug!(%symbol, shares, %price, max_shares, "Position size over limit.");
            return Ok(RiskCheckResult::reject(format!(
                "Position size ${} ({}% of account) exceeds limit of {}%",
                position_value.round_dp(2),
                position_pct,
                limit_pct
            ))
            .with_max_shares(max_shares));
        }

        let mut result = RiskCheckResult::approve(format!(
            "Position size OK ({}% of account)",
            position_pct
        ));
        if position_value > checked_mul("position warning", max_value, POSITION_WARN_RATIO)? {
            result = result.with_warning(format!(
                "{} position is {}% of account, close to the {}% limit",
                symbol, position_pct, limit_pct
            ));
        }
        Ok(result)
    }

    /// Records `current_pnl` as today's P&L, then rejects if the loss exceeds
    /// `max_daily_loss` of the account. Gains never reject.
    pub fn check_daily_loss_limit(
        &self,
        current_pnl: Decimal,
        account_value: Decimal,
    ) -> Result<RiskCheckResult> {
        ensure_positive("account_value", account_value)?;

        let today = self.clock.today();
        self.ledger().record_pnl(today, current_pnl);

        if current_pnl >= Decimal::ZERO {
            return Ok(RiskCheckResult::approve(format!(
                "Daily P&L is ${}, no loss to limit",
                current_pnl.round_dp(2)
            )));
        }

        let loss_ratio = checked_div("daily loss", current_pnl.abs(), account_value)?;
        let limit = self.limits.max_daily_loss;
        let loss_pct = percent(loss_ratio)?;
        let limit_pct = percent(limit)?;

        if loss_ratio > limit {
            return Ok(RiskCheckResult::reject(format!(
                "Daily loss limit exceeded: {loss_pct}% loss against a {limit_pct}% limit"
            )));
        }

        let mut result = RiskCheckResult::approve(format!(
            "Daily loss {loss_pct}% is within the {limit_pct}% limit"
        ));
        if loss_ratio > checked_mul("daily loss warning", limit, DAILY_LOSS_WARN_RATIO)? {
            result = result.with_warning(format!(
                "Daily loss at {loss_pct}% is approaching the {limit_pct}% limit"
            ));
        }
        Ok(result)
    }

    /// Rejects when total absolute exposure divided by account value is above
    /// the leverage ceiling. Being fully invested (1.0x) is normal.
    pub fn check_portfolio_exposure(
        &self,
        positions: &[Position],
        account_value: Decimal,
    ) -> Result<RiskCheckResult> {
        ensure_positive("account_value", account_value)?;

        let exposure = positions.iter().try_fold(Decimal::ZERO, |total, p| {
            total
                .checked_add(p.market_value.abs())
                .ok_or_else(|| overflow("portfolio exposure"))
        })?;
        let ratio = checked_div("exposure ratio", exposure, account_value)?;
        let ceiling = self.limits.max_portfolio_exposure;

        if ratio > ceiling {
            return Ok(RiskCheckResult::reject(format!(
                "Portfolio exposure {}x exceeds the {}x leverage limit",
                ratio.round_dp(2),
                ceiling.round_dp(2)
            )));
        }

        let mut result = RiskCheckResult::approve(format!(
            "Portfolio exposure {}x is within the {}x leverage limit",
            ratio.round_dp(2),
            ceiling.round_dp(2)
        ));
        if ratio > MARGIN_WARN_EXPOSURE {
            result = result.with_warning(format!(
                "Using margin: exposure is {}x account value",
                ratio.round_dp(2)
            ));
        } else if ratio < UNDERDEPLOYED_EXPOSURE {
            result = result.with_warning(format!(
                "Capital underdeployed: only {}% of account invested",
                percent(ratio)?
            ));
        }
        Ok(result)
    }

    /// Rejects once today's trade count reaches `max_trades_per_day`.
    pub fn check_trade_frequency(&self, symbol: &Symbol, side: Side) -> RiskCheckResult {
        let today = self.clock.today();
        let trades_today = self.ledger().get(today).trades;
        let cap = self.limits.max_trades_per_day;

        if trades_today >= cap {
            tracing::debug!(%symbol, %side, trades_today, cap, "Trade frequency cap hit.");
            return RiskCheckResult::reject(format!(
                "Daily trade limit reached ({trades_today}/{cap})"
            ));
        }

        let mut result = RiskCheckResult::approve(format!(
            "Trade frequency OK ({trades_today}/{cap} today)"
        ));
        if Decimal::from(trades_today) >= Decimal::from(cap) * FREQUENCY_WARN_RATIO {
            result = result.with_warning(format!(
                "Approaching daily trade limit ({trades_today}/{cap})"
            ));
        }
        result
    }

    /// Rejects a buy that the account cannot fund. `max_shares` is the number
    /// of shares `buying_power` does cover, or zero.
    fn check_buying_power(
        &self,
        proposal: &TradeProposal,
        buying_power: Decimal,
    ) -> Result<Option<RiskCheckResult>> {
        let cost = proposal.notional().ok_or_else(|| overflow("trade cost"))?;
        if cost <= buying_power {
            return Ok(None);
        }

        let affordable = if buying_power > Decimal::ZERO {
            floor_shares(buying_power, proposal.price)?
        } else {
            0
        };
        let reason = if affordable == 0 {
            format!(
                "Insufficient buying power: ${} cannot fund a single share of {} at ${}",
                buying_power.round_dp(2),
                proposal.symbol,
                proposal.price
            )
        } else {
            format!(
                "Insufficient buying power: trade costs ${} but only ${} is available",
                cost.round_dp(2),
                buying_power.round_dp(2)
            )
        };
        Ok(Some(RiskCheckResult::reject(reason).with_max_shares(affordable)))
    }

    /// Convenience wrapper taking the account state as a snapshot.
    pub fn validate_proposal(
        &self,
        proposal: &TradeProposal,
        account: &core_types::AccountSnapshot,
        current_pnl: Decimal,
        positions: &[Position],
    ) -> Result<RiskCheckResult> {
        self.validate_trade(
            proposal,
            account.total_value,
            current_pnl,
            positions,
            Some(account.buying_power),
        )
    }

    fn run_checks(
        &self,
        proposal: &TradeProposal,
        account_value: Decimal,
        current_pnl: Decimal,
        positions: &[Position],
        buying_power: Option<Decimal>,
    ) -> Result<RiskCheckResult> {
        ensure_shares(proposal.shares)?;
        ensure_positive("price", proposal.price)?;
        ensure_positive("account_value", account_value)?;

        // --- Affordability (buys only) ---
        if proposal.side == Side::Buy {
            if let Some(buying_power) = buying_power {
                if let Some(rejection) = self.check_buying_power(proposal, buying_power)? {
                    return Ok(rejection);
                }
            }
        }

        let mut warnings = Vec::new();

        // --- Position size ---
        let position = self.check_position_size(
            &proposal.symbol,
            proposal.shares,
            proposal.price,
            account_value,
        )?;
        if position.is_rejected() {
            return Ok(position);
        }
        warnings.extend(position.warnings);

        // --- Daily loss ---
        let daily_loss = self.check_daily_loss_limit(current_pnl, account_value)?;
        if daily_loss.is_rejected() {
            return Ok(daily_loss);
        }
        warnings.extend(daily_loss.warnings);

        // --- Exposure (advisory for sells, which only reduce it) ---
        let exposure = self.check_portfolio_exposure(positions, account_value)?;
        match (exposure.approved, proposal.side) {
            (false, Side::Buy) => return Ok(exposure),
            (false, Side::Sell) => {
                warnings.push(exposure.reason);
                warnings.extend(exposure.warnings);
            }
            (true, _) => warnings.extend(exposure.warnings),
        }

        // --- Frequency ---
        let frequency = self.check_trade_frequency(&proposal.symbol, proposal.side);
        if frequency.is_rejected() {
            return Ok(frequency);
        }
        warnings.extend(frequency.warnings);

        Ok(RiskCheckResult::approve("All risk checks passed").with_warnings(warnings))
    }
}

impl<C: Clock> RiskManager for LimitRiskManager<C> {
    fn name(&self) -> &'static str {
        "LimitRiskManager"
    }

    fn validate_trade(
        &self,
        proposal: &TradeProposal,
        account_value: Decimal,
        current_pnl: Decimal,
        positions: &[Position],
        buying_power: Option<Decimal>,
    ) -> Result<RiskCheckResult> {
        let result =
            self.run_checks(proposal, account_value, current_pnl, positions, buying_power)?;

        if result.approved {
            tracing::info!(
                symbol = %proposal.symbol,
                side = %proposal.side,
                shares = proposal.shares,
                price = %proposal.price,
                warnings = result.warnings.len(),
                "Trade approved by risk manager."
            );
            for warning in &result.warnings {
                tracing::info!(symbol = %proposal.symbol, %warning, "Risk warning.");
            }
        } else {
            tracing::warn!(
                symbol = %proposal.symbol,
                side = %proposal.side,
                shares = proposal.shares,
                price = %proposal.price,
                reason = %result.reason,
                max_shares = ?result.max_shares,
                "Trade rejected by risk manager."
            );
        }
        Ok(result)
    }

    fn record_trade(&self, proposal: &TradeProposal) -> u32 {
        let today = self.clock.today();
        let trades_today = self.ledger().record_trade(today);
        tracing::info!(
            symbol = %proposal.symbol,
            side = %proposal.side,
            shares = proposal.shares,
            price = %proposal.price,
            trades_today,
            "Trade recorded."
        );
        trades_today
    }

    fn reset_daily_counters(&self) -> usize {
        let today = self.clock.today();
        let mut ledger = self.ledger();
        ledger.reset_trades(today);
        let pruned = ledger.prune(today);
        tracing::info!(
            %today,
            pruned,
            retained = ledger.len(),
            oldest = ?ledger.oldest(),
            "Daily risk counters reset."
        );
        pruned
    }

    fn daily_stats(&self) -> DailyStats {
        let today = self.clock.today();
        let record = self.ledger().get(today);
        DailyStats {
            date: today,
            trades_today: record.trades,
            daily_pnl: record.pnl,
            limits: self.limits,
        }
    }
}

fn ensure_positive(name: &str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(Error::InvalidInput(format!(
            "{name} must be positive, got {value}"
        )));
    }
    Ok(())
}

fn ensure_shares(shares: u64) -> Result<()> {
    if shares == 0 {
        return Err(Error::InvalidInput("shares must be positive, got 0".to_string()));
    }
    Ok(())
}

fn overflow(what: &str) -> Error {
    Error::InvalidInput(format!("{what} overflows the decimal range"))
}

fn checked_mul(what: &str, lhs: Decimal, rhs: Decimal) -> Result<Decimal> {
    lhs.checked_mul(rhs).ok_or_else(|| overflow(what))
}

fn checked_div(what: &str, lhs: Decimal, rhs: Decimal) -> Result<Decimal> {
    lhs.checked_div(rhs).ok_or_else(|| overflow(what))
}

/// Whole shares of `price` that fit in `budget`, saturating at `u64::MAX`.
fn floor_shares(budget: Decimal, price: Decimal) -> Result<u64> {
    let shares = checked_div("share count", budget, price)?.floor();
    Ok(shares.to_u64().unwrap_or(u64::MAX))
}

fn percent(ratio: Decimal) -> Result<Decimal> {
    Ok(checked_mul("percentage", ratio, dec!(100))?
        .round_dp(1)
        .normalize())
}
