use super::{RATE_PAIR, load_market_data, print_source_notice, ui};
use crate::cli::indicators::fetch_projections;
use crate::core::expectations::ExpectationsProvider;
use crate::core::frame::JoinKind;
use crate::core::market::{DASHBOARD_SNAPSHOT, MarketData, MarketDataService};
use crate::core::rates::{IndexerKind, Simulation, simulate};
use crate::core::series::Indicator;
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::{Cell, CellAlignment, Table};
use tracing::{debug, info};

/// Selic reference used for CDI when no market data is available.
pub const FALLBACK_SELIC: f64 = 11.25;

#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub initial: f64,
    pub monthly: f64,
    pub years: u32,
    pub indexer: IndexerKind,
    /// % of CDI, fixed spread over IPCA or pre-fixed rate, depending on the indexer
    pub rate: Option<f64>,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            initial: 1000.0,
            monthly: 100.0,
            years: 5,
            indexer: IndexerKind::Cdi,
            rate: None,
        }
    }
}

/// Balance at the end of each simulated year.
pub fn evolution_table(simulation: &Simulation, initial: f64, monthly: f64) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Year"),
        ui::header_cell("Invested"),
        ui::header_cell("Gross Balance"),
        ui::header_cell("Earnings"),
    ]);

    for (month, balance) in simulation.evolution.iter().enumerate().step_by(12).skip(1) {
        let invested = initial + monthly * month as f64;
        table.add_row(vec![
            Cell::new(month / 12),
            Cell::new(ui::format_brl(invested)).set_alignment(CellAlignment::Right),
            Cell::new(ui::format_brl(*balance)).set_alignment(CellAlignment::Right),
            Cell::new(ui::format_brl(balance - invested)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// CDI reference: the latest Selic in `data`, or `FALLBACK_SELIC` without data.
pub fn cdi_reference(data: &MarketData) -> f64 {
    data.latest(Indicator::Selic).unwrap_or_else(|| {
        info!("No Selic data, using fallback reference");
        FALLBACK_SELIC
    })
}

pub fn result_cards(simulation: &Simulation) -> Vec<(&'static str, String, String)> {
    vec![
        (
            "TOTAL INVESTED",
            ui::format_brl(simulation.invested),
            "Deposits".to_string(),
        ),
        (
            "GROSS BALANCE",
            ui::format_brl(simulation.balance),
            "Before taxes".to_string(),
        ),
        (
            "EARNINGS",
            ui::format_brl(simulation.earnings()),
            format!("at {} p.a.", ui::format_pct(simulation.annual_rate)),
        ),
    ]
}

pub async fn run(
    service: &MarketDataService<'_>,
    expectations: &dyn ExpectationsProvider,
    options: &SimulateOptions,
    today: NaiveDate,
) -> Result<()> {
    let indexer = options.indexer.with_rate(options.rate)?;

    // Only the reference the chosen indexer needs is fetched
    let (selic, ipca_projection, reference_note) = match options.indexer {
        IndexerKind::Cdi => {
            let data = load_market_data(
                service,
                &RATE_PAIR,
                JoinKind::Inner,
                DASHBOARD_SNAPSHOT,
                today,
            )
            .await;
            print_source_notice(&data);
            let selic = cdi_reference(&data);
            (
                selic,
                0.0,
                format!("Current CDI (Selic ref.): {} p.a.", ui::format_pct(selic)),
            )
        }
        IndexerKind::IpcaPlus => {
            let projections = fetch_projections(expectations, today).await;
            (
                0.0,
                projections.ipca_12m,
                format!(
                    "Projected IPCA (Focus): {} p.a.",
                    ui::format_pct(projections.ipca_12m)
                ),
            )
        }
        IndexerKind::Prefixed => (0.0, 0.0, String::new()),
    };

    let annual_rate = indexer.annual_rate(selic, ipca_projection);
    debug!(%indexer, annual_rate, "Simulating");
    let simulation = simulate(options.initial, options.monthly, options.years, annual_rate)?;

    println!("{}\n", ui::style_text("Yield Simulator", ui::StyleType::Title));
    println!(
        "{} {}",
        ui::style_text("Indexer:", ui::StyleType::Label),
        indexer
    );
    if !reference_note.is_empty() {
        println!("{}", ui::style_text(&reference_note, ui::StyleType::Subtle));
    }
    println!(
        "{} {} initial, {} monthly, {} years\n",
        ui::style_text("Deposits:", ui::StyleType::Label),
        ui::format_brl(options.initial),
        ui::format_brl(options.monthly),
        options.years
    );

    println!("{}", ui::cards_table(&result_cards(&simulation)));
    println!(
        "\n{}",
        ui::style_text("Projected Evolution", ui::StyleType::Title)
    );
    println!(
        "{}",
        evolution_table(&simulation, options.initial, options.monthly)
    );
    println!(
        "\n{} {}",
        ui::style_text("Final balance:", ui::StyleType::Label),
        ui::style_text(&ui::format_brl(simulation.balance), ui::StyleType::Highlight)
    );
    Ok(())
}
