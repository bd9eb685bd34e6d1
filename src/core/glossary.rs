//! Static glossary of the terms shown across the application.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    MarketIndicators,
    YieldTypes,
}

impl Section {
    pub fn title(&self) -> &'static str {
        match self {
            Section::MarketIndicators => "Market Indicators",
            Section::YieldTypes => "Yield Types",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Term {
    pub section: Section,
    pub title: &'static str,
    pub text: &'static str,
}

pub const TERMS: &[Term] = &[
    Term {
        section: Section::MarketIndicators,
        title: "Selic Rate",
        text: "The basic interest rate of the Brazilian economy, set by the Central Bank's monetary policy committee (Copom).",
    },
    Term {
        section: Section::MarketIndicators,
        title: "IPCA",
        text: "Broad National Consumer Price Index, Brazil's official inflation measure.",
    },
    Term {
        section: Section::MarketIndicators,
        title: "IGP-M",
        text: "General Market Price Index, a broader price index commonly used to adjust rents.",
    },
    Term {
        section: Section::MarketIndicators,
        title: "CDI",
        text: "The rate banks charge to lend money to each other overnight. It closely tracks Selic.",
    },
    Term {
        section: Section::MarketIndicators,
        title: "PTAX",
        text: "Reference exchange rate for the US dollar computed by the Central Bank.",
    },
    Term {
        section: Section::MarketIndicators,
        title: "Real Rate",
        text: "Gain above inflation: (1 + nominal) / (1 + inflation) - 1 (Fisher equation).",
    },
    Term {
        section: Section::YieldTypes,
        title: "Post-fixed",
        text: "The yield follows an index (e.g. 100% of CDI).",
    },
    Term {
        section: Section::YieldTypes,
        title: "Pre-fixed",
        text: "The rate is agreed at the time of purchase.",
    },
    Term {
        section: Section::YieldTypes,
        title: "Hybrid (IPCA+)",
        text: "Pays a fixed part plus inflation.",
    },
];

pub fn terms(section: Section) -> impl Iterator<Item = &'static Term> {
    TERMS.iter().filter(move |t| t.section == section)
}
