use crate::core::cache::{KeyValueCollection, Store};
use crate::core::config::{FocusProviderConfig, SgsProviderConfig};
use crate::core::expectations::ExpectationsProvider;
use crate::providers::util::{build_client, with_retry};
use crate::store::KeyValueStore;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const ODATA_PATH: &str = "olinda/servico/Expectativas/versao/v1/odata";

/// Only surveys published within this many days are considered current.
const RECENT_DAYS: i64 = 30;

/// Client for the Focus market expectations survey (Olinda OData API).
pub struct FocusProvider {
    base_url: String,
    client: reqwest::Client,
    cache: Arc<dyn KeyValueCollection>,
    ttl: Duration,
}

#[derive(Debug, Deserialize)]
struct ODataResponse {
    value: Vec<FocusEntry>,
}

#[derive(Debug, Deserialize)]
struct FocusEntry {
    #[serde(rename = "Data")]
    date: String,
    #[serde(rename = "Mediana")]
    median: f64,
}

impl FocusProvider {
    /// Shares the user agent, timeout and TLS settings of the SGS client.
    pub fn new(
        config: &FocusProviderConfig,
        http: &SgsProviderConfig,
        store: &KeyValueStore,
        ttl: Duration,
    ) -> Result<Self> {
        Self::new_with_collection(config, http, store.get_collection("focus", true), ttl)
    }

    pub fn new_with_collection(
        config: &FocusProviderConfig,
        http: &SgsProviderConfig,
        cache: Arc<dyn KeyValueCollection>,
        ttl: Duration,
    ) -> Result<Self> {
        let client = build_client(
            &http.user_agent,
            Duration::from_secs(http.timeout_secs),
            http.accept_invalid_certs,
        )
        .context("Failed to build HTTP client")?;

        Ok(FocusProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            cache,
            ttl,
        })
    }

    async fn latest_median(&self, endpoint: &str, filter: &str, cache_key: &str) -> Result<f64> {
        if let Some(cached) = self.cache.get(cache_key.as_bytes()).await
            && let Ok(value) = serde_json::from_slice::<f64>(&cached)
        {
            return Ok(value);
        }

        let url = Url::parse_with_params(
            &format!("{}/{}/{}", self.base_url, ODATA_PATH, endpoint),
            &[
                ("$filter", filter),
                ("$orderby", "Data desc"),
                ("$top", "1"),
                ("$format", "json"),
                ("$select", "Indicador,Data,Mediana"),
            ],
        )
        .with_context(|| format!("Invalid Focus URL for endpoint {endpoint}"))?;
        debug!("Requesting expectations from {}", url);

        let response = with_retry(
            || async {
                self.client
                    .get(url.clone())
                    .send()
                    .await?
                    .error_for_status()
            },
            1,
            250,
        )
        .await
        .with_context(|| format!("Failed to fetch Focus expectations from {endpoint}"))?;

        let response_text = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text from {endpoint}"))?;

        let parsed: ODataResponse = serde_json::from_str(&response_text).with_context(|| {
            format!("Failed to parse Focus response from {endpoint}. Response: '{response_text}'")
        })?;

        let entry = parsed
            .value
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No recent expectations published for {}", endpoint))?;
        debug!(date = %entry.date, median = entry.median, "Latest expectation");

        self.cache
            .put(
                cache_key.as_bytes(),
                &serde_json::to_vec(&entry.median)?,
                Some(self.ttl),
            )
            .await;
        Ok(entry.median)
    }
}

fn recent_since(today: NaiveDate) -> String {
    (today - ChronoDuration::days(RECENT_DAYS))
        .format("%Y-%m-%d")
        .to_string()
}

#[async_trait]
impl ExpectationsProvider for FocusProvider {
    #[instrument(skip(self))]
    async fn inflation_12m(&self, today: NaiveDate) -> Result<f64> {
        let filter = format!(
            "Indicador eq 'IPCA' and Suavizada eq 'S' and baseCalculo eq 0 and Data ge '{}'",
            recent_since(today)
        );
        self.latest_median(
            "ExpectativasMercadoInflacao12Meses",
            &filter,
            &format!("focus:ipca12m:{today}"),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn annual_median(
        &self,
        indicator: &str,
        reference_year: i32,
        today: NaiveDate,
    ) -> Result<f64> {
        let filter = format!(
            "Indicador eq '{}' and DataReferencia eq '{}' and baseCalculo eq 0 and Data ge '{}'",
            indicator.replace('\'', "''"),
            reference_year,
            recent_since(today)
        );
        self.latest_median(
            "ExpectativasMercadoAnuais",
            &filter,
            &format!("focus:{indicator}:{reference_year}:{today}"),
        )
        .await
    }
}
