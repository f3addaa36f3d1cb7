use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::core::models::tokens::TokenTotals;

/// Identifies the day whose per-file aggregation state is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl CacheKey {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }
}

/// Merged totals for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTokenUsage {
    /// "YYYY-MM-DD"
    pub id: String,
    pub date: NaiveDate,
    pub totals: TokenTotals,
}

impl DailyTokenUsage {
    pub fn new(date: NaiveDate, totals: TokenTotals) -> Self {
        Self {
            id: day_key(date),
            date,
            totals,
        }
    }
}

/// Inputs for a day label. Turning these into text is the renderer's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayLabel {
    pub is_yesterday: bool,
    pub ordinal_day: u32,
    pub month_name: String,
    pub year: i32,
}

impl DayLabel {
    pub fn new(date: NaiveDate, is_yesterday: bool) -> Self {
        Self {
            is_yesterday,
            ordinal_day: date.day(),
            month_name: date.format("%B").to_string(),
            year: date.year(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthLabel {
    pub month_name: String,
    pub year: i32,
}

impl MonthLabel {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            month_name: date.format("%B").to_string(),
            year: date.year(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalSummary {
    /// "YYYY-MM-DD"
    pub key: String,
    pub label: DayLabel,
    pub date: NaiveDate,
    pub totals: TokenTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// "YYYY-MM"
    pub key: String,
    pub label: MonthLabel,
    pub date: NaiveDate,
    pub totals: TokenTotals,
}

pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 5).unwrap();
        assert_eq!(day_key(date), "2025-06-05");
        assert_eq!(month_key(date), "2025-06");
        assert_eq!(DailyTokenUsage::new(date, TokenTotals::zero()).id, "2025-06-05");
    }

    #[test]
    fn day_label_carries_month_name() {
        let date = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let label = DayLabel::new(date, false);
        assert_eq!(label.ordinal_day, 15);
        assert_eq!(label.month_name, "June");
        assert_eq!(label.year, 2025);
        assert!(!label.is_yesterday);
    }

    #[test]
    fn cache_key_differs_across_days() {
        let a = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let b = a.succ_opt().unwrap();
        assert_ne!(CacheKey::for_date(a), CacheKey::for_date(b));
        assert_eq!(CacheKey::for_date(a), CacheKey::for_date(a));
    }
}
