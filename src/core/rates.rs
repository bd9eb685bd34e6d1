//! Interest rate arithmetic: real rates, compounding and the investment simulator.
use anyhow::{Result, anyhow, bail};
use rust_decimal::{Decimal, prelude::*};
use rust_finprim::rate::cagr;
use std::fmt::Display;
use tracing::debug;

/// Simulations are limited to this many years.
pub const MAX_YEARS: u32 = 30;

/// Real rate in percent from nominal and inflation percentages (Fisher equation).
pub fn real_rate(nominal: f64, inflation: f64) -> f64 {
    ((1.0 + nominal / 100.0) / (1.0 + inflation / 100.0) - 1.0) * 100.0
}

/// Equivalent monthly rate (as a fraction) of an annual percentage rate.
pub fn monthly_rate(annual: f64) -> f64 {
    (1.0 + annual / 100.0).powf(1.0 / 12.0) - 1.0
}

/// Compounds two annual percentages, e.g. an inflation projection plus a fixed spread.
pub fn compose(a: f64, b: f64) -> f64 {
    ((1.0 + a / 100.0) * (1.0 + b / 100.0) - 1.0) * 100.0
}

/// Annualised percentage change between two observations `years` apart.
pub fn annualised_change(first: f64, last: f64, years: f64) -> Result<f64> {
    if first <= 0.0 || last <= 0.0 {
        bail!("Observations must be positive to annualise");
    }
    let begin_bal = Decimal::from_f64(first).ok_or_else(|| anyhow!("Invalid first value"))?;
    let end_bal = Decimal::from_f64(last).ok_or_else(|| anyhow!("Invalid last value"))?;
    let n_years = Decimal::from_f64(years).ok_or_else(|| anyhow!("Invalid duration"))?;

    if n_years <= Decimal::ZERO {
        bail!("Duration must be positive to annualise");
    }

    let rate = cagr(begin_bal, end_bal, n_years);
    let percentage = (rate * Decimal::from(100))
        .to_f64()
        .ok_or_else(|| anyhow!("Annualised change conversion failed"))?;
    debug!("cagr: {begin_bal}, {end_bal}, {n_years} = {rate}, {percentage}");
    Ok(percentage)
}

/// How a simulated investment is remunerated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Indexer {
    /// Post-fixed: a percentage of the CDI, which tracks Selic
    Cdi { percent_of_cdi: f64 },
    /// Hybrid: projected IPCA plus a fixed annual spread
    IpcaPlus { fixed: f64 },
    /// Pre-fixed annual rate
    Prefixed { rate: f64 },
}

impl Indexer {
    /// Annual rate in percent given the current Selic and the IPCA projection.
    pub fn annual_rate(&self, selic: f64, ipca_projection: f64) -> f64 {
        match self {
            Indexer::Cdi { percent_of_cdi } => selic * (percent_of_cdi / 100.0),
            Indexer::IpcaPlus { fixed } => compose(ipca_projection, *fixed),
            Indexer::Prefixed { rate } => *rate,
        }
    }
}

impl Display for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Indexer::Cdi { percent_of_cdi } => write!(f, "{percent_of_cdi:.2}% of CDI"),
            Indexer::IpcaPlus { fixed } => write!(f, "IPCA + {fixed:.2}%"),
            Indexer::Prefixed { rate } => write!(f, "Pre-fixed {rate:.2}% p.a."),
        }
    }
}

/// Indexer families selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexerKind {
    Cdi,
    IpcaPlus,
    Prefixed,
}

impl IndexerKind {
    /// Rate used when none is given: 100% of CDI, IPCA + 6%, 12% pre-fixed.
    pub fn default_rate(&self) -> f64 {
        match self {
            IndexerKind::Cdi => 100.0,
            IndexerKind::IpcaPlus => 6.0,
            IndexerKind::Prefixed => 12.0,
        }
    }

    /// Builds the indexer with `rate`, or the default rate when none is given.
    /// Rates must be finite and not negative.
    pub fn with_rate(&self, rate: Option<f64>) -> Result<Indexer> {
        let rate = rate.unwrap_or_else(|| self.default_rate());
        if !rate.is_finite() || rate < 0.0 {
            bail!("Rate must be a non-negative number, got {rate}");
        }
        Ok(match self {
            IndexerKind::Cdi => Indexer::Cdi {
                percent_of_cdi: rate,
            },
            IndexerKind::IpcaPlus => Indexer::IpcaPlus { fixed: rate },
            IndexerKind::Prefixed => Indexer::Prefixed { rate },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub annual_rate: f64,
    pub invested: f64,
    pub balance: f64,
    /// Balance at the end of each month, starting with the initial deposit
    pub evolution: Vec<f64>,
}

impl Simulation {
    pub fn earnings(&self) -> f64 {
        self.balance - self.invested
    }
}

/// Projects monthly compounding of an initial deposit plus fixed monthly
/// contributions made at the end of each month.
pub fn simulate(initial: f64, monthly: f64, years: u32, annual_rate: f64) -> Result<Simulation> {
    if !initial.is_finite() || !monthly.is_finite() || initial < 0.0 || monthly < 0.0 {
        bail!("Amounts must be non-negative numbers");
    }
    if !annual_rate.is_finite() || annual_rate <= -100.0 {
        bail!("Annual rate must be a number above -100%, got {annual_rate}");
    }
    if !(1..=MAX_YEARS).contains(&years) {
        bail!("Years must be between 1 and {MAX_YEARS}, got {years}");
    }

    let rate = monthly_rate(annual_rate);
    let periods = years * 12;
    let mut balance = initial;
    let mut invested = initial;
    let mut evolution = Vec::with_capacity(periods as usize + 1);
    evolution.push(initial);

    for _ in 0..periods {
        balance = balance * (1.0 + rate) + monthly;
        invested += monthly;
        evolution.push(balance);
    }

    debug!(annual_rate, periods, balance, invested, "Simulation finished");
    Ok(Simulation {
        annual_rate,
        invested,
        balance,
        evolution,
    })
}
