// In crates/risk/src/clock.rs

use chrono::NaiveDate;

/// Source of the current trading date used to key the daily counters.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Uses the local calendar date of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

impl<F> Clock for F
where
    F: Fn() -> NaiveDate + Send + Sync,
{
    fn today(&self) -> NaiveDate {
        self()
    }
}
