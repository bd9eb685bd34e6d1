use anyhow::Result;
use bcbmon::cli::dashboard::DashboardOptions;
use bcbmon::cli::simulate::SimulateOptions;
use bcbmon::core::log::init_logging;
use bcbmon::core::rates::{IndexerKind, MAX_YEARS};
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum IndexerArg {
    /// Post-fixed, percentage of the CDI
    Cdi,
    /// Projected IPCA plus a fixed spread
    IpcaPlus,
    /// Pre-fixed annual rate
    Prefixed,
}

impl From<IndexerArg> for IndexerKind {
    fn from(arg: IndexerArg) -> IndexerKind {
        match arg {
            IndexerArg::Cdi => IndexerKind::Cdi,
            IndexerArg::IpcaPlus => IndexerKind::IpcaPlus,
            IndexerArg::Prefixed => IndexerKind::Prefixed,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display Selic, IPCA and real rate with the monthly detail table
    Dashboard {
        /// First date of the period (dd/mm/yyyy or yyyy-mm-dd)
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,
        /// Last date of the period (dd/mm/yyyy or yyyy-mm-dd)
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,
        /// Page of the detailed table, newest first
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Display the monthly evolution of Selic, IPCA and real rate
    History {
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,
    },
    /// Display IGP-M, PTAX and market expectations alongside Selic and IPCA
    Indicators,
    /// Simulate compound growth of an investment
    Simulate {
        /// Initial deposit (R$)
        #[arg(long, default_value_t = 1000.0)]
        initial: f64,
        /// Monthly deposit (R$)
        #[arg(long, default_value_t = 100.0)]
        monthly: f64,
        /// Duration in years
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..=MAX_YEARS as i64))]
        years: u32,
        #[arg(long, value_enum, default_value_t = IndexerArg::Cdi)]
        indexer: IndexerArg,
        /// % of CDI, fixed spread over IPCA or pre-fixed rate (% p.a.)
        #[arg(long)]
        rate: Option<f64>,
    },
    /// Display the glossary of financial terms
    Glossary,
    /// Remove cached API responses
    ClearCache,
}

impl From<Commands> for bcbmon::AppCommand {
    fn from(cmd: Commands) -> bcbmon::AppCommand {
        match cmd {
            Commands::Dashboard { start, end, page } => {
                bcbmon::AppCommand::Dashboard(DashboardOptions { start, end, page })
            }
            Commands::History { start, end } => bcbmon::AppCommand::History { start, end },
            Commands::Indicators => bcbmon::AppCommand::Indicators,
            Commands::Simulate {
                initial,
                monthly,
                years,
                indexer,
                rate,
            } => bcbmon::AppCommand::Simulate(SimulateOptions {
                initial,
                monthly,
                years,
                indexer: indexer.into(),
                rate,
            }),
            Commands::Glossary => bcbmon::AppCommand::Glossary,
            Commands::ClearCache => bcbmon::AppCommand::ClearCache,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| format!("invalid date '{value}', expected dd/mm/yyyy or yyyy-mm-dd"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => bcbmon::cli::setup::setup(),
        Some(cmd) => bcbmon::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
