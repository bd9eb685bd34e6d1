//! Market expectation abstractions (Focus survey)

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// IPCA projection used when the survey cannot be reached.
pub const DEFAULT_IPCA_PROJECTION: f64 = 4.5;

#[async_trait]
pub trait ExpectationsProvider: Send + Sync {
    /// Median expectation for IPCA over the next 12 months, in percent.
    async fn inflation_12m(&self, today: NaiveDate) -> Result<f64>;

    /// Median expectation of an annual indicator (e.g. "PIB Total") for
    /// `reference_year`.
    async fn annual_median(
        &self,
        indicator: &str,
        reference_year: i32,
        today: NaiveDate,
    ) -> Result<f64>;
}
