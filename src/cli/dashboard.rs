use super::{
    NO_DATA_FOR_PERIOD, RATE_PAIR, load_market_data, print_source_notice, select_period, ui,
    unavailable_error,
};
use crate::core::frame::{Frame, JoinKind};
use crate::core::market::{DASHBOARD_SNAPSHOT, MarketDataService, REAL_RATE_COLUMN, with_real_rate};
use crate::core::rates::real_rate;
use crate::core::series::Indicator;
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::{Cell, Color, Table};
use tracing::debug;

/// Rows per page of the detailed table.
pub const PAGE_SIZE: usize = 6;

#[derive(Debug, Clone, Default)]
pub struct DashboardOptions {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// 1-based page of the detailed table
    pub page: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub total_pages: usize,
    pub start: usize,
    pub end: usize,
}

/// Clamps the requested 1-based page and returns its row bounds.
pub fn paginate(total_rows: usize, requested: usize, per_page: usize) -> Page {
    let total_pages = total_rows.div_ceil(per_page.max(1)).max(1);
    let number = requested.clamp(1, total_pages);
    let start = ((number - 1) * per_page).min(total_rows);
    let end = (start + per_page).min(total_rows);
    Page {
        number,
        total_pages,
        start,
        end,
    }
}

/// Selic, IPCA and real rate cards from the last row of `frame`.
pub fn build_cards(frame: &Frame) -> Option<Vec<(&'static str, String, String)>> {
    let last = frame.last()?;
    let selic = last.get(Indicator::Selic.column())?;
    let ipca = last.get(Indicator::Ipca.column())?;
    let real = real_rate(selic, ipca);

    Some(vec![
        (
            "SELIC RATE",
            ui::format_pct(selic),
            format!("Ref: {}", ui::format_date(last.date)),
        ),
        (
            "IPCA (12M)",
            ui::format_pct(ipca),
            "Accumulated inflation".to_string(),
        ),
        (
            "REAL RATE",
            ui::format_pct(real),
            "Above inflation".to_string(),
        ),
    ])
}

/// Cards for the period selected in `options`, or `None` when it has no rows.
pub fn period_cards(
    frame: &Frame,
    options: &DashboardOptions,
) -> Option<Vec<(&'static str, String, String)>> {
    let (start, end, filtered) = select_period(frame, options.start, options.end)?;
    debug!(%start, %end, "Dashboard period");
    build_cards(&filtered)
}

/// Monthly rows, newest first, with the real rate column.
pub fn monthly_detail(frame: &Frame) -> Frame {
    with_real_rate(frame.monthly_last())
}

fn detail_table(frame: &Frame, page: &Page) -> (Table, String) {
    let rows: Vec<_> = frame
        .rows_desc()
        .skip(page.start)
        .take(page.end - page.start)
        .collect();

    let period = match (rows.last(), rows.first()) {
        (Some(oldest), Some(newest)) => format!(
            "{} - {}",
            ui::format_date(oldest.date),
            ui::format_date(newest.date)
        ),
        _ => String::new(),
    };

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Selic"),
        ui::header_cell("IPCA"),
        ui::header_cell(REAL_RATE_COLUMN),
    ]);
    for row in rows {
        table.add_row(vec![
            Cell::new(ui::format_date(row.date)),
            ui::rate_cell(row.get(Indicator::Selic.column()), Color::Blue),
            ui::rate_cell(row.get(Indicator::Ipca.column()), Color::Yellow),
            ui::rate_cell(row.get(REAL_RATE_COLUMN), Color::Green),
        ]);
    }
    (table, period)
}

pub async fn run(
    service: &MarketDataService<'_>,
    options: &DashboardOptions,
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

    let Some(cards) = period_cards(&data.frame, options) else {
        println!("{}", ui::style_text(NO_DATA_FOR_PERIOD, ui::StyleType::Warning));
        return Ok(());
    };

    println!("{}\n", ui::style_text("Market Monitor", ui::StyleType::Title));
    println!("{}", ui::cards_table(&cards));

    ui::print_separator();

    let monthly = monthly_detail(&data.frame);
    let page = paginate(monthly.len(), options.page, PAGE_SIZE);
    let (table, period) = detail_table(&monthly, &page);

    println!(
        "\n{} {}",
        ui::style_text("Detailed Data", ui::StyleType::Title),
        ui::style_text(
            &format!("({period}) page {}/{}", page.number, page.total_pages),
            ui::StyleType::Subtle
        )
    );
    println!("{table}");
    Ok(())
}
