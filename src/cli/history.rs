use super::{
    NO_DATA_FOR_PERIOD, RATE_PAIR, load_market_data, print_source_notice, select_period, ui,
    unavailable_error,
};
use crate::core::frame::{Frame, JoinKind};
use crate::core::market::{DASHBOARD_SNAPSHOT, MarketDataService, REAL_RATE_COLUMN, with_real_rate};
use crate::core::series::Indicator;
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::{Cell, Color, Table};

/// Month-end Selic, IPCA and real rate over the selected period, oldest first.
pub fn history_table(frame: &Frame) -> Table {
    let monthly = with_real_rate(frame.monthly_last());
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Month"),
        ui::header_cell("Selic"),
        ui::header_cell("IPCA"),
        ui::header_cell(REAL_RATE_COLUMN),
    ]);
    for row in monthly.rows() {
        table.add_row(vec![
            Cell::new(row.date.format("%m/%Y")),
            ui::rate_cell(row.get(Indicator::Selic.column()), Color::Blue),
            ui::rate_cell(row.get(Indicator::Ipca.column()), Color::Yellow),
            ui::rate_cell(row.get(REAL_RATE_COLUMN), Color::Green),
        ]);
    }
    table
}

pub async fn run(
    service: &MarketDataService<'_>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<()> {
    let data = load_market_data(
        service,
        &RATE_PAIR,
        JoinKind::Inner,
        DASHBOARD_SNAPSHOT,
        today,
    )
    .await;
    if data.is_empty() {
        return Err(unavailable_error());
    }
    print_source_notice(&data);

    let Some((start, end, filtered)) = select_period(&data.frame, start, end) else {
        println!("{}", ui::style_text(NO_DATA_FOR_PERIOD, ui::StyleType::Warning));
        return Ok(());
    };

    println!(
        "{} {}",
        ui::style_text("Historical Evolution", ui::StyleType::Title),
        ui::style_text(
            &format!("({} - {})", ui::format_date(start), ui::format_date(end)),
            ui::StyleType::Subtle
        )
    );
    println!("{}", history_table(&filtered));
    Ok(())
}
