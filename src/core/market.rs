//! Acquisition and reconciliation of the indicator series.
//!
//! Every requested series is fetched, joined on date, forward-filled and cut
//! to the lookback window. The Selic/IPCA pair is aligned on the dates both
//! series share; the indicator overview joins on the union of dates. A successful result is written to a CSV snapshot
//! which is served back, flagged as offline, when the API cannot be reached.

use crate::core::config::{AppConfig, SeriesConfig};
use crate::core::frame::{Frame, JoinKind};
use crate::core::rates::real_rate;
use crate::core::series::{Indicator, Series, SeriesProvider};
use anyhow::{Result, anyhow};
use chrono::{Duration as ChronoDuration, NaiveDate};
use futures::future::join_all;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Snapshot holding the Selic and IPCA pair shown on the dashboard.
pub const DASHBOARD_SNAPSHOT: &str = "market_data_cache.csv";

/// Snapshot holding every indicator.
pub const INDICATORS_SNAPSHOT: &str = "indicators_cache.csv";

pub const REAL_RATE_COLUMN: &str = "Real Rate";

/// Default start of a requested period, counted back from the most recent
/// observation.
pub const DEFAULT_RANGE_DAYS: i64 = 730;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Fetched from the API during this run
    Live,
    /// Read back from the local snapshot
    Offline { as_of: NaiveDate },
    /// Neither the API nor a snapshot produced data
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct MarketData {
    pub frame: Frame,
    pub source: DataSource,
}

impl MarketData {
    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    pub fn latest(&self, indicator: Indicator) -> Option<f64> {
        self.frame.last().and_then(|row| row.get(indicator.column()))
    }
}

pub struct MarketDataService<'a> {
    provider: &'a dyn SeriesProvider,
    series: SeriesConfig,
    data_dir: PathBuf,
    attempts: usize,
    retry_delay: Duration,
    lookback_years: u32,
}

impl<'a> MarketDataService<'a> {
    pub fn new(provider: &'a dyn SeriesProvider, config: &AppConfig, data_dir: PathBuf) -> Self {
        Self {
            provider,
            series: config.series.clone(),
            data_dir,
            attempts: config.fetch.attempts.max(1),
            retry_delay: Duration::from_millis(config.fetch.retry_delay_ms),
            lookback_years: config.lookback_years,
        }
    }

    /// First date kept in the reconciled frame.
    pub fn lookback_start(&self, today: NaiveDate) -> NaiveDate {
        today - ChronoDuration::days(365 * i64::from(self.lookback_years))
    }

    /// Loads `indicators` from the API, falling back to the named snapshot.
    /// `on_fetched` is called once per series request that completes.
    pub async fn load(
        &self,
        indicators: &[Indicator],
        join: JoinKind,
        snapshot: &str,
        today: NaiveDate,
        on_fetched: &(dyn Fn()),
    ) -> MarketData {
        let start = self.lookback_start(today);
        let snapshot_path = self.data_dir.join(snapshot);

        for attempt in 1..=self.attempts {
            match self
                .fetch_round(indicators, join, start, today, on_fetched)
                .await
            {
                Ok(frame) if !frame.is_empty() => {
                    if let Err(e) = frame.write_csv(&snapshot_path) {
                        warn!(error = %e, "Failed to write snapshot");
                    }
                    info!(rows = frame.len(), "Loaded market data from the API");
                    return MarketData {
                        frame,
                        source: DataSource::Live,
                    };
                }
                Ok(_) => {
                    debug!("Attempt {}/{} produced no rows", attempt, self.attempts);
                }
                Err(e) => {
                    debug!("Attempt {}/{} failed: {}", attempt, self.attempts, e);
                }
            }
            if attempt < self.attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        warn!("API unavailable, trying local snapshot");
        self.load_snapshot(indicators, &snapshot_path)
    }

    async fn fetch_round(
        &self,
        indicators: &[Indicator],
        join: JoinKind,
        start: NaiveDate,
        today: NaiveDate,
        on_fetched: &(dyn Fn()),
    ) -> Result<Frame> {
        let futures = indicators.iter().map(|indicator| async move {
            let code = indicator.code(&self.series);
            let result = self.provider.fetch_series(code, start, today).await;
            on_fetched();
            result.map(|series| (*indicator, indicator.normalize(series)))
        });

        let fetched = join_all(futures)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        if let Some((indicator, _)) = fetched.iter().find(|(_, s)| s.is_empty()) {
            return Err(anyhow!("Series {} returned no observations", indicator));
        }

        Ok(reconcile(&fetched, join, start))
    }

    fn load_snapshot(&self, indicators: &[Indicator], path: &std::path::Path) -> MarketData {
        if path.exists() {
            match Frame::read_csv(path) {
                Ok(frame) if has_columns(&frame, indicators) && !frame.is_empty() => {
                    if let Some(as_of) = frame.last_date() {
                        info!(%as_of, "Serving market data from snapshot");
                        return MarketData {
                            frame,
                            source: DataSource::Offline { as_of },
                        };
                    }
                }
                Ok(_) => warn!(path = %path.display(), "Snapshot is empty or incomplete"),
                Err(e) => warn!(error = %e, "Failed to read snapshot"),
            }
        }

        MarketData {
            frame: Frame::new(),
            source: DataSource::Unavailable,
        }
    }
}

fn has_columns(frame: &Frame, indicators: &[Indicator]) -> bool {
    indicators
        .iter()
        .all(|i| frame.columns().iter().any(|c| c == i.column()))
}

/// Aligns the series on their dates, carrying values forward over gaps and
/// dropping rows that are still incomplete. Rows before `start` are cut.
pub fn reconcile(series: &[(Indicator, Series)], join: JoinKind, start: NaiveDate) -> Frame {
    series
        .iter()
        .fold(Frame::new(), |frame, (indicator, s)| {
            frame.join(indicator.column(), s, join)
        })
        .forward_fill()
        .drop_incomplete()
        .since(start)
}

/// Adds the Fisher real rate computed from the Selic and IPCA columns.
pub fn with_real_rate(frame: Frame) -> Frame {
    frame.derive(REAL_RATE_COLUMN, |row| {
        Some(real_rate(
            row.get(Indicator::Selic.column())?,
            row.get(Indicator::Ipca.column())?,
        ))
    })
}

/// Resolves the displayed period. Without bounds the whole frame is shown.
/// Once a bound is given, a missing start defaults to `DEFAULT_RANGE_DAYS`
/// before the last date and a missing end to the last date. Bounds are
/// clamped to the frame; an inverted range stays inverted and selects nothing.
pub fn resolve_range(
    frame: &Frame,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Option<(NaiveDate, NaiveDate)> {
    let (min, max) = (frame.first_date()?, frame.last_date()?);
    if start.is_none() && end.is_none() {
        return Some((min, max));
    }
    let end = end.unwrap_or(max).clamp(min, max);
    let start = start
        .unwrap_or_else(|| max - ChronoDuration::days(DEFAULT_RANGE_DAYS))
        .clamp(min, max);
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    struct MockSeriesProvider {
        series: HashMap<u32, Series>,
        failures_left: Mutex<usize>,
        call_count: AtomicUsize,
    }

    impl MockSeriesProvider {
        fn new(failures: usize) -> Self {
            let selic: Series = [
                (d(2024, 5, 1), 10.5),
                (d(2024, 5, 9), 10.5),
                (d(2024, 6, 1), 10.5),
                (d(2024, 6, 10), 10.25),
            ]
            .into_iter()
            .collect();
            let ipca: Series = [(d(2024, 5, 1), 3.93), (d(2024, 6, 1), 4.23)]
                .into_iter()
                .collect();
            Self {
                series: HashMap::from([(432, selic), (13522, ipca)]),
                failures_left: Mutex::new(failures),
                call_count: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SeriesProvider for MockSeriesProvider {
        async fn fetch_series(&self, code: u32, _start: NaiveDate, _end: NaiveDate) -> Result<Series> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            {
                let mut failures = self.failures_left.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(anyhow!("Connection refused"));
                }
            }
            self.series
                .get(&code)
                .cloned()
                .ok_or_else(|| anyhow!("Unknown series {code}"))
        }
    }

    fn config(attempts: usize) -> AppConfig {
        let mut config = AppConfig::default();
        config.fetch.attempts = attempts;
        config.fetch.retry_delay_ms = 1;
        config
    }

    const PAIR: [Indicator; 2] = [Indicator::Selic, Indicator::Ipca];

    #[tokio::test]
    async fn test_load_live_writes_snapshot() {
        let dir = tempdir().unwrap();
        let provider = MockSeriesProvider::new(0);
        let fetched = AtomicUsize::new(0);
        let service = MarketDataService::new(&provider, &config(2), dir.path().to_path_buf());

        let data = service
            .load(&PAIR, JoinKind::Inner, DASHBOARD_SNAPSHOT, d(2024, 6, 10), &|| {
                fetched.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(data.source, DataSource::Live);
        // Only the dates both series share survive
        assert_eq!(data.frame.len(), 2);
        assert_eq!(data.frame.last_date(), Some(d(2024, 6, 1)));
        assert_eq!(data.latest(Indicator::Selic), Some(10.5));
        assert_eq!(data.latest(Indicator::Ipca), Some(4.23));
        assert_eq!(fetched.load(Ordering::SeqCst), 2);
        assert!(dir.path().join(DASHBOARD_SNAPSHOT).exists());
    }

    #[tokio::test]
    async fn test_load_outer_join_keeps_every_date() {
        let dir = tempdir().unwrap();
        let provider = MockSeriesProvider::new(0);
        let service = MarketDataService::new(&provider, &config(1), dir.path().to_path_buf());

        let data = service
            .load(&PAIR, JoinKind::Outer, INDICATORS_SNAPSHOT, d(2024, 6, 10), &|| ())
            .await;

        assert_eq!(data.frame.len(), 4);
        assert_eq!(data.frame.last_date(), Some(d(2024, 6, 10)));
        assert_eq!(data.latest(Indicator::Selic), Some(10.25));
        // IPCA carried forward from June 1st
        assert_eq!(data.latest(Indicator::Ipca), Some(4.23));
    }

    #[tokio::test]
    async fn test_load_retries_after_failure() {
        let dir = tempdir().unwrap();
        let provider = MockSeriesProvider::new(1);
        let service = MarketDataService::new(&provider, &config(2), dir.path().to_path_buf());

        let data = service
            .load(&PAIR, JoinKind::Inner, DASHBOARD_SNAPSHOT, d(2024, 6, 10), &|| ())
            .await;

        assert_eq!(data.source, DataSource::Live);
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_load_falls_back_to_snapshot() {
        let dir = tempdir().unwrap();
        let snapshot = Frame::from_series(
            "Selic",
            &[(d(2024, 1, 1), 11.75)].into_iter().collect(),
        )
        .join("IPCA", &[(d(2024, 1, 1), 4.51)].into_iter().collect(), JoinKind::Inner);
        snapshot
            .write_csv(dir.path().join(DASHBOARD_SNAPSHOT))
            .unwrap();

        let provider = MockSeriesProvider::new(usize::MAX);
        let service = MarketDataService::new(&provider, &config(2), dir.path().to_path_buf());
        let data = service
            .load(&PAIR, JoinKind::Inner, DASHBOARD_SNAPSHOT, d(2024, 6, 10), &|| ())
            .await;

        assert_eq!(
            data.source,
            DataSource::Offline {
                as_of: d(2024, 1, 1)
            }
        );
        assert_eq!(data.latest(Indicator::Selic), Some(11.75));
    }

    #[tokio::test]
    async fn test_load_unavailable_without_snapshot() {
        let dir = tempdir().unwrap();
        let provider = MockSeriesProvider::new(usize::MAX);
        let service = MarketDataService::new(&provider, &config(3), dir.path().to_path_buf());
        let data = service
            .load(&PAIR, JoinKind::Inner, DASHBOARD_SNAPSHOT, d(2024, 6, 10), &|| ())
            .await;

        assert_eq!(data.source, DataSource::Unavailable);
        assert!(data.is_empty());
        // One call per series per attempt
        assert_eq!(provider.call_count.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_snapshot_missing_columns_is_ignored() {
        let dir = tempdir().unwrap();
        Frame::from_series("Selic", &[(d(2024, 1, 1), 11.75)].into_iter().collect())
            .write_csv(dir.path().join(DASHBOARD_SNAPSHOT))
            .unwrap();

        let provider = MockSeriesProvider::new(usize::MAX);
        let service = MarketDataService::new(&provider, &config(1), dir.path().to_path_buf());
        let data = service
            .load(&PAIR, JoinKind::Inner, DASHBOARD_SNAPSHOT, d(2024, 6, 10), &|| ())
            .await;
        assert_eq!(data.source, DataSource::Unavailable);
    }

    #[test]
    fn test_reconcile_truncates_to_lookback() {
        let selic: Series = [(d(2010, 1, 1), 8.75), (d(2024, 1, 1), 11.75)]
            .into_iter()
            .collect();
        let ipca: Series = [(d(2010, 1, 1), 4.59), (d(2023, 12, 1), 4.62)]
            .into_iter()
            .collect();

        let frame = reconcile(
            &[(Indicator::Selic, selic), (Indicator::Ipca, ipca)],
            JoinKind::Outer,
            d(2014, 6, 1),
        );
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.first_date(), Some(d(2023, 12, 1)));
        // Selic carried forward from 2010 into December 2023
        assert_eq!(frame.first().unwrap().get("Selic"), Some(8.75));
        assert_eq!(frame.last().unwrap().get("IPCA"), Some(4.62));
    }

    #[test]
    fn test_reconcile_inner_join_uses_shared_dates() {
        let selic: Series = [
            (d(2024, 5, 1), 10.5),
            (d(2024, 5, 9), 10.5),
            (d(2024, 6, 1), 10.5),
            (d(2024, 6, 10), 10.25),
        ]
        .into_iter()
        .collect();
        let ipca: Series = [(d(2024, 5, 1), 3.93), (d(2024, 6, 1), 4.23)]
            .into_iter()
            .collect();

        let frame = reconcile(
            &[(Indicator::Selic, selic), (Indicator::Ipca, ipca)],
            JoinKind::Inner,
            d(2014, 6, 1),
        );
        assert_eq!(frame.len(), 2);
        let last = frame.last().unwrap();
        assert_eq!(last.date, d(2024, 6, 1));
        assert_eq!(last.get("Selic"), Some(10.5));
        assert_eq!(last.get("IPCA"), Some(4.23));
    }

    #[test]
    fn test_reconcile_lookback_start_is_inclusive() {
        let provider = MockSeriesProvider::new(0);
        let service = MarketDataService::new(&provider, &config(1), PathBuf::from("/tmp"));
        let start = service.lookback_start(d(2024, 6, 10));
        assert_eq!(start, d(2014, 6, 13));

        let dates = [start.pred_opt().unwrap(), start, d(2024, 6, 1)];
        let selic: Series = dates.iter().map(|date| (*date, 10.0)).collect();
        let ipca: Series = dates.iter().map(|date| (*date, 4.0)).collect();

        let frame = reconcile(
            &[(Indicator::Selic, selic), (Indicator::Ipca, ipca)],
            JoinKind::Inner,
            start,
        );
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.first_date(), Some(start));
    }

    #[test]
    fn test_with_real_rate() {
        let frame = with_real_rate(
            Frame::from_series("Selic", &[(d(2024, 6, 1), 10.75)].into_iter().collect())
                .join("IPCA", &[(d(2024, 6, 1), 4.5)].into_iter().collect(), JoinKind::Inner),
        );
        let rate = frame.last().unwrap().get(REAL_RATE_COLUMN).unwrap();
        assert!((rate - 5.9809).abs() < 0.001);
    }

    #[test]
    fn test_resolve_range_defaults_and_clamps() {
        let series: Series = [(d(2023, 1, 1), 1.0), (d(2024, 6, 1), 2.0)]
            .into_iter()
            .collect();
        let frame = Frame::from_series("Selic", &series);

        assert_eq!(
            resolve_range(&frame, None, None),
            Some((d(2023, 1, 1), d(2024, 6, 1)))
        );
        assert_eq!(
            resolve_range(&frame, Some(d(2023, 6, 1)), Some(d(2030, 1, 1))),
            Some((d(2023, 6, 1), d(2024, 6, 1)))
        );
        assert_eq!(resolve_range(&Frame::new(), None, None), None);
    }

    #[test]
    fn test_resolve_range_whole_frame_without_bounds() {
        let series: Series = [(d(2018, 1, 1), 1.0), (d(2024, 6, 1), 2.0)]
            .into_iter()
            .collect();
        let frame = Frame::from_series("Selic", &series);

        assert_eq!(
            resolve_range(&frame, None, None),
            Some((d(2018, 1, 1), d(2024, 6, 1)))
        );
        // A given end switches the start to the default window
        assert_eq!(
            resolve_range(&frame, None, Some(d(2024, 6, 1))),
            Some((d(2022, 6, 2), d(2024, 6, 1)))
        );
    }

    #[test]
    fn test_inverted_range_selects_nothing() {
        let series: Series = [(d(2023, 1, 1), 1.0), (d(2024, 6, 1), 2.0)]
            .into_iter()
            .collect();
        let frame = Frame::from_series("Selic", &series);

        let (start, end) =
            resolve_range(&frame, Some(d(2024, 5, 1)), Some(d(2023, 6, 1))).unwrap();
        assert!(start > end);
        assert!(frame.between(start, end).is_empty());
    }

    #[test]
    fn test_lookback_start() {
        let provider = MockSeriesProvider::new(0);
        let service = MarketDataService::new(&provider, &config(1), PathBuf::from("/tmp"));
        assert_eq!(
            service.lookback_start(d(2024, 6, 10)),
            d(2024, 6, 10) - ChronoDuration::days(3650)
        );
    }
}
