//! Terminal front end: one module per command.

pub mod dashboard;
pub mod glossary;
pub mod history;
pub mod indicators;
pub mod setup;
pub mod simulate;
pub mod ui;

use crate::core::frame::{Frame, JoinKind};
use crate::core::market::{DataSource, MarketData, MarketDataService, resolve_range};
use crate::core::series::Indicator;
use chrono::NaiveDate;

/// Series shown on the dashboard, history and simulator.
pub const RATE_PAIR: [Indicator; 2] = [Indicator::Selic, Indicator::Ipca];

pub(crate) const NO_DATA_FOR_PERIOD: &str = "No data for the selected period.";

/// Loads market data while showing a progress bar.
pub(crate) async fn load_market_data(
    service: &MarketDataService<'_>,
    indicators: &[Indicator],
    join: JoinKind,
    snapshot: &str,
    today: NaiveDate,
) -> MarketData {
    let pb = ui::new_progress_bar(indicators.len() as u64, true);
    pb.set_message("Fetching series from Banco Central...");
    let data = service
        .load(indicators, join, snapshot, today, &|| pb.inc(1))
        .await;
    pb.finish_and_clear();
    data
}

/// Notice shown when the data did not come from the API in this run.
pub(crate) fn source_notice(data: &MarketData) -> Option<String> {
    match data.source {
        DataSource::Offline { as_of } => Some(format!(
            "Offline mode: data as of {}.",
            ui::format_date(as_of)
        )),
        DataSource::Live | DataSource::Unavailable => None,
    }
}

pub(crate) fn print_source_notice(data: &MarketData) {
    if let Some(notice) = source_notice(data) {
        println!("{}\n", ui::style_text(&notice, ui::StyleType::Warning));
    }
}

/// Rows of `frame` inside the requested period, or `None` when it holds none.
pub(crate) fn select_period(
    frame: &Frame,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Option<(NaiveDate, NaiveDate, Frame)> {
    let (start, end) = resolve_range(frame, start, end)?;
    let filtered = frame.between(start, end);
    (!filtered.is_empty()).then_some((start, end, filtered))
}

/// Error shown when neither the API nor a snapshot produced data.
pub(crate) fn unavailable_error() -> anyhow::Error {
    anyhow::anyhow!(
        "Could not retrieve data from Banco Central. This may be caused by a network block or instability at api.bcb.gov.br; try again in a few moments."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::Series;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn frame() -> Frame {
        let selic: Series = [(d(2023, 1, 1), 13.75), (d(2023, 3, 1), 13.75), (d(2024, 6, 1), 10.5)]
            .into_iter()
            .collect();
        Frame::from_series("Selic", &selic)
    }

    #[test]
    fn test_offline_notice_names_snapshot_date() {
        let data = MarketData {
            frame: frame(),
            source: DataSource::Offline {
                as_of: d(2024, 6, 1),
            },
        };
        assert_eq!(
            source_notice(&data).as_deref(),
            Some("Offline mode: data as of 01/06/2024.")
        );

        let live = MarketData {
            frame: frame(),
            source: DataSource::Live,
        };
        assert!(source_notice(&live).is_none());
    }

    #[test]
    fn test_select_period() {
        let (start, end, filtered) = select_period(&frame(), None, None).unwrap();
        assert_eq!((start, end), (d(2023, 1, 1), d(2024, 6, 1)));
        assert_eq!(filtered.len(), 3);

        let (_, _, filtered) = select_period(&frame(), Some(d(2023, 2, 1)), None).unwrap();
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_select_period_without_rows() {
        // Gap between the March 2023 and June 2024 observations
        assert!(select_period(&frame(), Some(d(2023, 6, 1)), Some(d(2023, 12, 31))).is_none());
        // Inverted range
        assert!(select_period(&frame(), Some(d(2024, 5, 1)), Some(d(2023, 6, 1))).is_none());
        assert!(select_period(&Frame::new(), None, None).is_none());
    }
}
