pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::dashboard::DashboardOptions;
use crate::cli::simulate::SimulateOptions;
use crate::core::cache::Store;
use crate::core::config::AppConfig;
use crate::core::market::MarketDataService;
use crate::providers::focus::FocusProvider;
use crate::providers::sgs::SgsProvider;
use crate::store::KeyValueStore;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use std::time::Duration;
use tracing::{debug, info};

/// Commands that run against the loaded configuration.
#[derive(Debug, Clone)]
pub enum AppCommand {
    Dashboard(DashboardOptions),
    History {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    Indicators,
    Simulate(SimulateOptions),
    Glossary,
    ClearCache,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    run_command_on(command, config_path, Local::now().date_naive()).await
}

/// Runs `command` as if the current date were `today`.
pub async fn run_command_on(
    command: AppCommand,
    config_path: Option<&str>,
    today: NaiveDate,
) -> Result<()> {
    info!("bcbmon starting...");

    if let AppCommand::Glossary = command {
        cli::glossary::run();
        return Ok(());
    }

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let data_dir = config.data_path()?;
    let store = KeyValueStore::open(&data_dir.join("cache"));
    let ttl = Duration::from_secs(config.cache_ttl_hours * 60 * 60);

    if let AppCommand::ClearCache = command {
        for name in ["sgs", "focus"] {
            store.get_collection(name, true).clear().await;
        }
        println!("Cleared cached responses in {}", data_dir.display());
        return Ok(());
    }

    let sgs_provider = SgsProvider::new(&config.providers.sgs, &store, ttl)?;
    let focus_provider = FocusProvider::new(
        &config.providers.focus,
        &config.providers.sgs,
        &store,
        ttl,
    )?;
    let service = MarketDataService::new(&sgs_provider, &config, data_dir);

    match command {
        AppCommand::Dashboard(options) => cli::dashboard::run(&service, &options, today).await,
        AppCommand::History { start, end } => cli::history::run(&service, start, end, today).await,
        AppCommand::Indicators => cli::indicators::run(&service, &focus_provider, today).await,
        AppCommand::Simulate(options) => {
            cli::simulate::run(&service, &focus_provider, &options, today).await
        }
        AppCommand::Glossary | AppCommand::ClearCache => Ok(()),
    }
}
