// SPDX-FileCopyrightText: 2026 Costwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wall-clock source used for period resets and spend projection.

use std::sync::Mutex;

use chrono::{Days, NaiveDate, Utc};

/// Supplies the current calendar date.
pub trait Clock: Send + Sync + 'static {
    fn today(&self) -> NaiveDate;
}

/// UTC system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock pinned to a settable date, for dry runs (`--as-of`) and tests.
#[derive(Debug)]
pub struct FixedClock {
    date: Mutex<NaiveDate>,
}

impl FixedClock {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: Mutex::new(date),
        }
    }

    pub fn set(&self, date: NaiveDate) {
        *self.date.lock().unwrap_or_else(|p| p.into_inner()) = date;
    }

    /// Move the clock forward by `days`.
    pub fn advance_days(&self, days: u64) {
        let mut guard = self.date.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(next) = guard.checked_add_days(Days::new(days)) {
            *guard = next;
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        *self.date.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::new(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap());
        clock.advance_days(1);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
        clock.set(NaiveDate::from_ymd_opt(2026, 7, 4).unwrap());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 7, 4).unwrap());
    }
}
