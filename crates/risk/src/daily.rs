// In crates/risk/src/daily.rs

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of past days kept in the ledger after a prune.
pub const RETENTION_DAYS: u64 = 30;

/// Counters observed during a single trading day.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyRecord {
    pub trades: u32,
    /// The most recent P&L reported for the day.
    pub pnl: Decimal,
}

/// Per-date trade and P&L counters.
///
/// Entries are created on first use. Nothing is evicted until [`DailyLedger::prune`]
/// is called, which keeps only the last [`RETENTION_DAYS`] days.
#[derive(Debug, Default, Clone)]
pub struct DailyLedger {
    days: BTreeMap<NaiveDate, DailyRecord>,
}

impl DailyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// The counters for `date`, or zeroes if nothing was recorded.
    pub fn get(&self, date: NaiveDate) -> DailyRecord {
        self.days.get(&date).copied().unwrap_or_default()
    }

    /// Increments the trade count for `date` and returns the new count.
    pub fn record_trade(&mut self, date: NaiveDate) -> u32 {
        let record = self.days.entry(date).or_default();
        record.trades = record.trades.saturating_add(1);
        record.trades
    }

    /// Stores `pnl` as the latest observed P&L for `date`.
    pub fn record_pnl(&mut self, date: NaiveDate, pnl: Decimal) {
        self.days.entry(date).or_default().pnl = pnl;
    }

    /// Overwrites the trade count for `date`, e.g. when resuming mid-day.
    pub fn set_trades(&mut self, date: NaiveDate, trades: u32) {
        self.days.entry(date).or_default().trades = trades;
    }

    pub fn reset_trades(&mut self, date: NaiveDate) {
        if let Some(record) = self.days.get_mut(&date) {
            record.trades = 0;
        }
    }

    /// Drops every entry older than [`RETENTION_DAYS`] before `today`.
    /// Returns the number of entries removed.
    pub fn prune(&mut self, today: NaiveDate) -> usize {
        let Some(cutoff) = today.checked_sub_days(Days::new(RETENTION_DAYS)) else {
            return 0;
        };
        let before = self.days.len();
        self.days = self.days.split_off(&cutoff);
        before - self.days.len()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn oldest(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn unknown_day_reads_as_zero() {
        let ledger = DailyLedger::new();
        assert_eq!(ledger.get(day(1)), DailyRecord::default());
        assert!(ledger.is_empty());
    }

    #[test]
    fn trades_count_per_day() {
        let mut ledger = DailyLedger::new();
        assert_eq!(ledger.record_trade(day(1)), 1);
        assert_eq!(ledger.record_trade(day(1)), 2);
        assert_eq!(ledger.record_trade(day(2)), 1);
        assert_eq!(ledger.get(day(1)).trades, 2);
    }

    #[test]
    fn pnl_is_overwritten_not_accumulated() {
        let mut ledger = DailyLedger::new();
        ledger.record_pnl(day(3), dec!(-100));
        ledger.record_pnl(day(3), dec!(-250));
        assert_eq!(ledger.get(day(3)).pnl, dec!(-250));
    }

    #[test]
    fn reset_keeps_pnl() {
        let mut ledger = DailyLedger::new();
        ledger.record_trade(day(4));
        ledger.record_pnl(day(4), dec!(42));
        ledger.reset_trades(day(4));
        assert_eq!(ledger.get(day(4)), DailyRecord { trades: 0, pnl: dec!(42) });
    }

    #[test]
    fn prune_keeps_exactly_the_retention_window() {
        let mut ledger = DailyLedger::new();
        let today = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        for back in 0..40u64 {
            ledger.record_trade(today - Days::new(back));
        }

        let removed = ledger.prune(today);

        assert_eq!(removed, 9);
        assert_eq!(ledger.len(), 31);
        assert_eq!(ledger.oldest(), Some(today - Days::new(RETENTION_DAYS)));
    }
}
