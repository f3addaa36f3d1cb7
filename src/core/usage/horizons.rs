use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

use crate::core::models::tokens::TokenTotals;
use crate::core::models::usage::{
    day_key, month_key, DayLabel, HistoricalSummary, MonthLabel, MonthlySummary,
};
use crate::core::usage::error::UsageError;

/// Number of days before today kept in the history.
pub const HISTORY_DAYS: i64 = 6;

/// Work the cache needs done before it can answer for a given day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshPlan {
    /// History days not resolved yet, nearest first.
    pub missing_days: Vec<NaiveDate>,
    /// Set when the current month has no total yet.
    pub month_scan: Option<NaiveDate>,
}

impl RefreshPlan {
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.missing_days.is_empty() && self.month_scan.is_none()
    }
}

/// Outcome of executing a [`RefreshPlan`].
#[derive(Debug, Default)]
pub struct PlanResults {
    pub days: Vec<(NaiveDate, Result<TokenTotals, UsageError>)>,
    pub month: Option<Result<TokenTotals, UsageError>>,
}

#[derive(Debug, Clone)]
struct TodayBaseline {
    day_key: String,
    totals: TokenTotals,
}

/// History and month totals layered on top of the daily aggregation.
///
/// Resolved history days are never fetched again. The month total is scanned
/// once per month and afterwards moved forward by how much today grew.
#[derive(Debug, Default)]
pub struct HorizonCache {
    history: HashMap<String, HistoricalSummary>,
    months: HashMap<String, MonthlySummary>,
    /// Per month key: the today totals already folded into the month total.
    baselines: HashMap<String, TodayBaseline>,
}

/// The `HISTORY_DAYS` days before `today` with their offsets, nearest first.
pub fn prior_days(today: NaiveDate) -> Vec<(i64, NaiveDate)> {
    (1..=HISTORY_DAYS)
        .filter_map(|offset| {
            today
                .checked_sub_signed(Duration::days(offset))
                .map(|date| (offset, date))
        })
        .collect()
}

impl HorizonCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(&self, today: NaiveDate) -> RefreshPlan {
        let missing_days = prior_days(today)
            .into_iter()
            .map(|(_, date)| date)
            .filter(|date| !self.history.contains_key(&day_key(*date)))
            .collect();
        let month_scan = (!self.months.contains_key(&month_key(today))).then_some(today);
        RefreshPlan {
            missing_days,
            month_scan,
        }
    }

    /// Fold fetched results and today's latest totals into the cache.
    pub fn apply(
        &mut self,
        today: NaiveDate,
        today_totals: Option<TokenTotals>,
        results: PlanResults,
    ) {
        for (date, result) in results.days {
            match result {
                Ok(totals) => {
                    let key = day_key(date);
                    self.history.insert(
                        key.clone(),
                        HistoricalSummary {
                            key,
                            label: DayLabel::new(date, false),
                            date,
                            totals,
                        },
                    );
                }
                Err(err) => {
                    tracing::debug!(day = %date, error = %err, "history day not resolved");
                }
            }
        }

        let month = month_key(today);
        let today_key = day_key(today);
        match results.month {
            Some(Ok(totals)) => {
                tracing::info!(month = %month, total = totals.total_tokens, "month total rescanned");
                self.months.insert(
                    month.clone(),
                    MonthlySummary {
                        key: month.clone(),
                        label: MonthLabel::new(today),
                        date: today,
                        totals,
                    },
                );
                self.baselines.insert(
                    month,
                    TodayBaseline {
                        day_key: today_key,
                        totals: today_totals.unwrap_or_default(),
                    },
                );
            }
            Some(Err(err)) => {
                tracing::debug!(month = %month, error = %err, "month scan failed");
            }
            None => {
                let Some(summary) = self.months.get_mut(&month) else {
                    return;
                };
                let baseline = self
                    .baselines
                    .entry(month)
                    .or_insert_with(|| TodayBaseline {
                        day_key: today_key.clone(),
                        totals: TokenTotals::zero(),
                    });
                // Yesterday is already inside the month total.
                if baseline.day_key != today_key {
                    baseline.day_key = today_key;
                    baseline.totals = TokenTotals::zero();
                }
                if let Some(today_totals) = today_totals {
                    if today_totals != baseline.totals {
                        summary.totals += today_totals.delta_since(baseline.totals);
                        baseline.totals = today_totals;
                    }
                }
            }
        }
    }

    /// Resolved history days before `today`, nearest first. Labels follow
    /// `today`, not the day the entry was fetched on.
    pub fn history(&self, today: NaiveDate) -> Vec<HistoricalSummary> {
        prior_days(today)
            .into_iter()
            .filter_map(|(offset, date)| {
                let mut summary = self.history.get(&day_key(date))?.clone();
                summary.label = DayLabel::new(date, offset == 1);
                Some(summary)
            })
            .collect()
    }

    pub fn month(&self, today: NaiveDate) -> Option<MonthlySummary> {
        self.months.get(&month_key(today)).cloned()
    }
}
