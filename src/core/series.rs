//! Time series abstractions and core types

use crate::core::config::SeriesConfig;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Indicators published as SGS series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Indicator {
    Selic,
    Ipca,
    Igpm,
    Ptax,
}

impl Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.column())
    }
}

impl Indicator {
    /// Column name used in frames and snapshots.
    pub fn column(&self) -> &'static str {
        match self {
            Indicator::Selic => "Selic",
            Indicator::Ipca => "IPCA",
            Indicator::Igpm => "IGP-M",
            Indicator::Ptax => "PTAX",
        }
    }

    pub fn code(&self, series: &SeriesConfig) -> u32 {
        match self {
            Indicator::Selic => series.selic,
            Indicator::Ipca => series.ipca,
            Indicator::Igpm => series.igpm,
            Indicator::Ptax => series.ptax,
        }
    }

    /// Brings the raw series to the unit shown to the user. IGP-M is
    /// published as a monthly change and displayed accumulated over 12 months.
    pub fn normalize(&self, series: Series) -> Series {
        match self {
            Indicator::Igpm => series.accumulate(12),
            _ => series,
        }
    }
}

/// Observations of a single series, ordered by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: BTreeMap<NaiveDate, f64>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, date: &NaiveDate) -> Option<f64> {
        self.points.get(date).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (NaiveDate, f64)> + '_ {
        self.points.iter().map(|(d, v)| (*d, *v))
    }

    pub fn to_points(&self) -> Vec<(NaiveDate, f64)> {
        self.iter().collect()
    }

    /// Compounds rolling windows of percentage changes, e.g. twelve monthly
    /// inflation prints into an accumulated 12-month figure. Dates with fewer
    /// than `window` observations behind them are dropped.
    pub fn accumulate(&self, window: usize) -> Series {
        let values: Vec<(NaiveDate, f64)> = self.to_points();
        if window == 0 || values.len() < window {
            return Series::new();
        }

        values
            .windows(window)
            .map(|w| {
                let factor = w.iter().fold(1.0, |acc, (_, v)| acc * (1.0 + v / 100.0));
                (w[window - 1].0, (factor - 1.0) * 100.0)
            })
            .collect()
    }
}

impl FromIterator<(NaiveDate, f64)> for Series {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        Series {
            points: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
pub trait SeriesProvider: Send + Sync {
    /// Fetches observations of series `code` between `start` and `end`, inclusive.
    async fn fetch_series(&self, code: u32, start: NaiveDate, end: NaiveDate) -> Result<Series>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_indicator_codes_follow_config() {
        let series = SeriesConfig::default();
        assert_eq!(Indicator::Selic.code(&series), 432);
        assert_eq!(Indicator::Ipca.code(&series), 13522);
        assert_eq!(Indicator::Igpm.code(&series), 189);
        assert_eq!(Indicator::Ptax.code(&series), 1);
    }

    #[test]
    fn test_accumulate_compounds_window() {
        let series: Series = (0..13)
            .map(|m| (d(2024, 1, 1) + chrono::Months::new(m), 1.0))
            .collect();
        let accumulated = series.accumulate(12);

        // 13 monthly points give two full 12-month windows
        assert_eq!(accumulated.len(), 2);
        let (date, value) = accumulated.iter().next_back().unwrap();
        assert_eq!(date, d(2025, 1, 1));
        assert!((value - 12.6825).abs() < 0.001);
    }

    #[test]
    fn test_accumulate_with_short_history_is_empty() {
        let series: Series = [(d(2024, 1, 1), 0.5), (d(2024, 2, 1), 0.4)]
            .into_iter()
            .collect();
        assert!(series.accumulate(12).is_empty());
    }

    #[test]
    fn test_normalize_only_touches_igpm() {
        let series: Series = [(d(2024, 1, 1), 0.5)].into_iter().collect();
        assert_eq!(Indicator::Selic.normalize(series.clone()), series);
        assert!(Indicator::Igpm.normalize(series).is_empty());
    }
}
