//! Accounting windows and their calendar arithmetic.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Recurring accounting period over which spend is capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Daily,
    Weekly,
    Monthly,
}

impl WindowKind {
    /// All kinds in check order. Locks are always taken in this order.
    pub const ALL: [WindowKind; 3] = [WindowKind::Daily, WindowKind::Weekly, WindowKind::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Daily => "daily",
            WindowKind::Weekly => "weekly",
            WindowKind::Monthly => "monthly",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            WindowKind::Daily => 0,
            WindowKind::Weekly => 1,
            WindowKind::Monthly => 2,
        }
    }

    /// Floor of `now` to this window's granularity: midnight UTC of the day,
    /// of the ISO week's Monday, or of the first of the month.
    pub fn period_start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let date = now.date_naive();
        let start = match self {
            WindowKind::Daily => date,
            WindowKind::Weekly => {
                let back = u64::from(date.weekday().num_days_from_monday());
                date.checked_sub_days(Days::new(back)).unwrap_or(date)
            }
            WindowKind::Monthly => {
                NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
            }
        };
        start.and_time(NaiveTime::MIN).and_utc()
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown budget window '{0}' (expected daily, weekly or monthly)")]
pub struct UnknownWindowKind(pub String);

impl FromStr for WindowKind {
    type Err = UnknownWindowKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(WindowKind::Daily),
            "weekly" | "week" => Ok(WindowKind::Weekly),
            "monthly" | "month" => Ok(WindowKind::Monthly),
            _ => Err(UnknownWindowKind(s.to_string())),
        }
    }
}

/// A spending cap for one window kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLimit {
    pub kind: WindowKind,
    pub amount: Decimal,
}

impl BudgetLimit {
    pub fn new(kind: WindowKind, amount: Decimal) -> Self {
        Self { kind, amount }
    }

    pub fn daily(amount: Decimal) -> Self {
        Self::new(WindowKind::Daily, amount)
    }

    pub fn weekly(amount: Decimal) -> Self {
        Self::new(WindowKind::Weekly, amount)
    }

    pub fn monthly(amount: Decimal) -> Self {
        Self::new(WindowKind::Monthly, amount)
    }
}

/// Accumulated spend of one service within one calendar period.
///
/// Invariant: `accumulated >= 0`. A window whose `period_start` no longer
/// matches the floor of the current time is stale and gets replaced, never
/// rewound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetWindow {
    pub service: String,
    pub kind: WindowKind,
    pub period_start: DateTime<Utc>,
    pub accumulated: Decimal,
}

impl BudgetWindow {
    pub fn open(service: impl Into<String>, kind: WindowKind, now: DateTime<Utc>) -> Self {
        Self {
            service: service.into(),
            kind,
            period_start: kind.period_start(now),
            accumulated: Decimal::ZERO,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.kind.period_start(now) != self.period_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    #[test]
    fn test_period_start_daily() {
        let start = WindowKind::Daily.period_start(at(2024, 3, 14, 17));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_period_start_weekly_is_monday() {
        // 2024-03-14 is a Thursday
        let start = WindowKind::Weekly.period_start(at(2024, 3, 14, 17));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());

        // Sunday still belongs to the week that started the previous Monday
        let start = WindowKind::Weekly.period_start(at(2024, 3, 17, 23));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());

        // Week spanning a year boundary
        let start = WindowKind::Weekly.period_start(at(2025, 1, 2, 8));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 12, 30, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_period_start_monthly() {
        let start = WindowKind::Monthly.period_start(at(2024, 2, 29, 12));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_window_staleness() {
        let window = BudgetWindow::open("openai", WindowKind::Daily, at(2024, 3, 14, 9));
        assert!(!window.is_stale(at(2024, 3, 14, 23)));
        assert!(window.is_stale(at(2024, 3, 15, 0)));

        let monthly = BudgetWindow::open("openai", WindowKind::Monthly, at(2024, 3, 14, 9));
        assert!(!monthly.is_stale(at(2024, 3, 31, 23)));
        assert!(monthly.is_stale(at(2024, 4, 1, 0)));
    }

    #[test]
    fn test_window_kind_parse() {
        assert_eq!("Daily".parse::<WindowKind>(), Ok(WindowKind::Daily));
        assert_eq!("week".parse::<WindowKind>(), Ok(WindowKind::Weekly));
        assert_eq!(" monthly ".parse::<WindowKind>(), Ok(WindowKind::Monthly));
        assert!("yearly".parse::<WindowKind>().is_err());
    }
}
