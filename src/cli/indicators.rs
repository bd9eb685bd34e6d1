use super::{load_market_data, print_source_notice, ui, unavailable_error};
use crate::core::expectations::{DEFAULT_IPCA_PROJECTION, ExpectationsProvider};
use crate::core::frame::{Frame, JoinKind};
use crate::core::market::{INDICATORS_SNAPSHOT, MarketDataService};
use crate::core::rates::annualised_change;
use crate::core::series::Indicator;
use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use comfy_table::{Cell, CellAlignment, Table};
use tracing::warn;

const ALL_INDICATORS: [Indicator; 4] = [
    Indicator::Selic,
    Indicator::Ipca,
    Indicator::Igpm,
    Indicator::Ptax,
];

/// Market expectations shown next to the observed series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projections {
    pub ipca_12m: f64,
    /// Whether `ipca_12m` is the fallback rather than a survey value
    pub ipca_is_default: bool,
    pub gdp: Option<f64>,
}

pub async fn fetch_projections(
    provider: &dyn ExpectationsProvider,
    today: NaiveDate,
) -> Projections {
    let (ipca, gdp) = tokio::join!(
        provider.inflation_12m(today),
        provider.annual_median("PIB Total", today.year(), today)
    );

    let (ipca_12m, ipca_is_default) = match ipca {
        Ok(value) => (value, false),
        Err(e) => {
            warn!(error = %e, "IPCA expectation unavailable, using default");
            (DEFAULT_IPCA_PROJECTION, true)
        }
    };
    let gdp = gdp
        .inspect_err(|e| warn!(error = %e, "GDP expectation unavailable"))
        .ok();

    Projections {
        ipca_12m,
        ipca_is_default,
        gdp,
    }
}

/// Annualised PTAX change between the first and last rows of the frame.
pub fn ptax_variation(frame: &Frame) -> Option<f64> {
    let column = Indicator::Ptax.column();
    let (first, last) = (frame.first()?, frame.last()?);
    let years = (last.date - first.date).num_days() as f64 / 365.25;
    annualised_change(first.get(column)?, last.get(column)?, years).ok()
}

pub fn indicators_table(frame: &Frame, projections: &Projections, today: NaiveDate) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Indicator"),
        ui::header_cell("Value"),
        ui::header_cell("Reference"),
        ui::header_cell("Note"),
    ]);

    let last = frame.last();
    let reference = last
        .map(|row| ui::format_date(row.date))
        .unwrap_or_else(|| "N/A".to_string());

    for (indicator, label, note) in [
        (Indicator::Selic, "Selic", "Policy rate, % p.a."),
        (Indicator::Ipca, "IPCA (12M)", "Accumulated inflation"),
        (Indicator::Igpm, "IGP-M (12M)", "Accumulated, used for rents"),
    ] {
        let value = last.and_then(|row| row.get(indicator.column()));
        table.add_row(vec![
            Cell::new(label),
            ui::format_optional_cell(value, ui::format_pct),
            Cell::new(&reference),
            Cell::new(note),
        ]);
    }

    let ptax = last.and_then(|row| row.get(Indicator::Ptax.column()));
    let variation = ptax_variation(frame);
    table.add_row(vec![
        Cell::new("PTAX (USD)"),
        ui::format_optional_cell(ptax, |v| format!("R$ {v:.4}")),
        Cell::new(&reference),
        Cell::new("Annualised change over the window"),
    ]);
    table.add_row(vec![
        Cell::new("PTAX change"),
        variation.map_or_else(
            || ui::format_optional_cell(None::<f64>, ui::format_pct),
            ui::change_cell,
        ),
        Cell::new(
            frame
                .first_date()
                .map(|d| format!("since {}", ui::format_date(d)))
                .unwrap_or_default(),
        ),
        Cell::new("% p.a."),
    ]);

    let ipca_note = if projections.ipca_is_default {
        "Focus survey unavailable, default"
    } else {
        "Focus survey median"
    };
    table.add_row(vec![
        Cell::new("IPCA projection (12M)"),
        Cell::new(ui::format_pct(projections.ipca_12m)).set_alignment(CellAlignment::Right),
        Cell::new("next 12 months"),
        Cell::new(ipca_note),
    ]);
    table.add_row(vec![
        Cell::new("GDP projection"),
        ui::format_optional_cell(projections.gdp, ui::format_pct),
        Cell::new(today.year().to_string()),
        Cell::new("Focus survey median"),
    ]);
    table
}

pub async fn run(
    service: &MarketDataService<'_>,
    expectations: &dyn ExpectationsProvider,
    today: NaiveDate,
) -> Result<()> {
    let data = load_market_data(
        service,
        &ALL_INDICATORS,
        JoinKind::Outer,
        INDICATORS_SNAPSHOT,
        today,
    )
    .await;
    if data.is_empty() {
        return Err(unavailable_error());
    }
    print_source_notice(&data);

    let projections = fetch_projections(expectations, today).await;

    println!("{}\n", ui::style_text("Indicators", ui::StyleType::Title));
    println!("{}", indicators_table(&data.frame, &projections, today));
    Ok(())
}
