use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::config::DayBoundary;
use crate::core::models::usage::{DailyTokenUsage, HistoricalSummary, MonthlySummary};
use crate::core::usage::aggregator::{scan_month_totals, UsageAggregator};
use crate::core::usage::error::UsageError;
use crate::core::usage::horizons::{HorizonCache, PlanResults, RefreshPlan};

/// Everything one refresh cycle publishes.
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub day: NaiveDate,
    pub today: Result<DailyTokenUsage, UsageError>,
    pub history: Vec<HistoricalSummary>,
    pub month: Option<MonthlySummary>,
    pub refreshed_at: DateTime<Utc>,
}

/// File I/O for one cycle, run away from the coordinating task.
struct RefreshJob {
    aggregator: UsageAggregator,
    plan: RefreshPlan,
    day: NaiveDate,
}

struct JobOutput {
    aggregator: UsageAggregator,
    today: Result<DailyTokenUsage, UsageError>,
    results: PlanResults,
}

impl RefreshJob {
    fn run(mut self) -> JobOutput {
        let today = self.aggregator.fetch_daily_usage(self.day);

        let root = self.aggregator.root().to_path_buf();
        let boundary = self.aggregator.boundary();
        // Past days get their own aggregator so today's cursors survive.
        // A day that never resolves is asked for again next cycle, and
        // without a day folder that means a month or whole-tree scan.
        let days = self
            .plan
            .missing_days
            .iter()
            .map(|date| {
                let mut scratch = UsageAggregator::new(root.clone(), boundary);
                (*date, scratch.fetch_daily_usage(*date).map(|usage| usage.totals))
            })
            .collect();
        let month = self
            .plan
            .month_scan
            .map(|date| scan_month_totals(&root, date));

        JobOutput {
            aggregator: self.aggregator,
            today,
            results: PlanResults { days, month },
        }
    }
}

/// Owns all aggregation state. Only the coordinating side mutates it, after
/// the blocking work of a cycle has returned.
#[derive(Debug)]
pub struct Tracker {
    root: PathBuf,
    boundary: DayBoundary,
    aggregator: Option<UsageAggregator>,
    horizons: HorizonCache,
}

impl Tracker {
    pub fn new(root: PathBuf, boundary: DayBoundary) -> Self {
        Self {
            aggregator: Some(UsageAggregator::new(root.clone(), boundary)),
            root,
            boundary,
            horizons: HorizonCache::new(),
        }
    }

    pub fn boundary(&self) -> DayBoundary {
        self.boundary
    }

    pub async fn refresh(&mut self, day: NaiveDate) -> Result<RefreshReport> {
        let plan = self.horizons.plan(day);
        let aggregator = self
            .aggregator
            .take()
            .unwrap_or_else(|| UsageAggregator::new(self.root.clone(), self.boundary));
        let job = RefreshJob {
            aggregator,
            plan,
            day,
        };

        let output = tokio::task::spawn_blocking(move || job.run())
            .await
            .context("Refresh worker failed")?;

        self.aggregator = Some(output.aggregator);
        let today_totals = output.today.as_ref().ok().map(|usage| usage.totals);
        self.horizons.apply(day, today_totals, output.results);

        let (history, month) = match &output.today {
            Err(UsageError::MissingRoot(_)) => (Vec::new(), None),
            _ => (self.horizons.history(day), self.horizons.month(day)),
        };
        Ok(RefreshReport {
            day,
            today: output.today,
            history,
            month,
            refreshed_at: Utc::now(),
        })
    }
}

/// Requests explicit refreshes from a running refresher.
#[derive(Debug, Clone)]
pub struct RefreshHandle {
    trigger: mpsc::Sender<()>,
    in_flight: Arc<AtomicBool>,
}

impl RefreshHandle {
    /// Ask for a refresh now. Returns false, doing nothing, while another
    /// refresh is queued or running.
    pub fn request(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("refresh already in flight, ignoring request");
            return false;
        }
        if self.trigger.try_send(()).is_err() {
            self.in_flight.store(false, Ordering::Release);
            return false;
        }
        true
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Run `tracker` on a timer plus explicit requests, one refresh at a time.
///
/// Reports arrive on the returned receiver. The loop ends once every handle or
/// the receiver is dropped.
pub fn spawn_refresher(
    mut tracker: Tracker,
    interval: Duration,
) -> (RefreshHandle, mpsc::Receiver<RefreshReport>, JoinHandle<()>) {
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(1);
    let (report_tx, report_rx) = mpsc::channel::<RefreshReport>(1);
    let in_flight = Arc::new(AtomicBool::new(false));

    let flag = in_flight.clone();
    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                request = trigger_rx.recv() => {
                    if request.is_none() {
                        break;
                    }
                }
            }

            flag.store(true, Ordering::Release);
            let day = tracker.boundary().today();
            let result = tracker.refresh(day).await;

            // Requests that slipped in while running are covered by this cycle.
            let mut closed = false;
            loop {
                match trigger_rx.try_recv() {
                    Ok(()) => continue,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }
            flag.store(false, Ordering::Release);

            match result {
                Ok(report) => {
                    if report_tx.send(report).await.is_err() {
                        break;
                    }
                }
                Err(err) => tracing::error!(error = %format!("{:#}", err), "refresh failed"),
            }
            if closed {
                break;
            }
        }
    });

    (
        RefreshHandle {
            trigger: trigger_tx,
            in_flight,
        },
        report_rx,
        join,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use std::path::Path;

    fn june(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn write_event(root: &Path, rel: &str, timestamp: &str, input: u64) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();
        let line = json!({
            "type": "event_msg",
            "timestamp": timestamp,
            "payload": {
                "type": "token_count",
                "info": { "last_token_usage": { "input_tokens": input, "output_tokens": 0 } }
            }
        });
        writeln!(file, "{}", line).unwrap();
    }

    #[tokio::test]
    async fn refresh_fills_today_history_and_month() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_event(root, "2025/06/15/a.jsonl", "2025-06-15T09:00:00Z", 100);
        write_event(root, "2025/06/14/b.jsonl", "2025-06-14T09:00:00Z", 40);
        write_event(root, "2025/06/10/c.jsonl", "2025-06-10T09:00:00Z", 7);

        let mut tracker = Tracker::new(root.to_path_buf(), DayBoundary::Utc);
        let report = tracker.refresh(june(15)).await.unwrap();

        assert_eq!(report.today.as_ref().unwrap().totals.input_tokens, 100);
        let keys: Vec<&str> = report.history.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["2025-06-14", "2025-06-10"]);
        assert_eq!(report.month.as_ref().unwrap().totals.input_tokens, 147);

        write_event(root, "2025/06/15/a.jsonl", "2025-06-15T10:00:00Z", 60);
        let report = tracker.refresh(june(15)).await.unwrap();
        assert_eq!(report.today.as_ref().unwrap().totals.input_tokens, 160);
        assert_eq!(report.month.as_ref().unwrap().totals.input_tokens, 207);
    }

    #[tokio::test]
    async fn history_fetches_keep_todays_cursors() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_event(root, "2025/06/15/a.jsonl", "2025-06-15T09:00:00Z", 100);
        write_event(root, "2025/06/14/b.jsonl", "2025-06-14T09:00:00Z", 40);

        let mut tracker = Tracker::new(root.to_path_buf(), DayBoundary::Utc);
        tracker.refresh(june(15)).await.unwrap();

        let today_file = root.join("2025/06/15/a.jsonl");
        let offset = tracker
            .aggregator
            .as_ref()
            .and_then(|agg| agg.file_state(&today_file))
            .map(|state| state.offset);
        assert_eq!(offset, Some(std::fs::metadata(&today_file).unwrap().len()));
    }

    #[tokio::test]
    async fn missing_root_publishes_nothing_partial() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("sessions");
        let mut tracker = Tracker::new(root.clone(), DayBoundary::Utc);
        let report = tracker.refresh(june(15)).await.unwrap();
        assert_eq!(report.today, Err(UsageError::MissingRoot(root)));
        assert!(report.history.is_empty());
        assert!(report.month.is_none());
    }

    #[tokio::test]
    async fn refresher_publishes_on_start_and_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::new(dir.path().to_path_buf(), DayBoundary::Utc);
        let (handle, mut reports, join) = spawn_refresher(tracker, Duration::from_secs(3600));

        let first = reports.recv().await.unwrap();
        assert!(first.today.is_err());

        // The first report is sent after the in-flight flag clears.
        assert!(handle.request());
        let second = reports.recv().await.unwrap();
        assert!(second.refreshed_at >= first.refreshed_at);

        drop(handle);
        join.await.unwrap();
    }

    #[tokio::test]
    async fn overlapping_requests_are_ignored() {
        let (trigger, _rx) = mpsc::channel(1);
        let handle = RefreshHandle {
            trigger,
            in_flight: Arc::new(AtomicBool::new(false)),
        };
        assert!(handle.request());
        assert!(handle.is_in_flight());
        assert!(!handle.request());
    }
}
