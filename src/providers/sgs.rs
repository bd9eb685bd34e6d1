use crate::core::cache::{KeyValueCollection, Store};
use crate::core::config::SgsProviderConfig;
use crate::core::series::{Series, SeriesProvider};
use crate::providers::util::{build_client, with_retry};
use crate::store::KeyValueStore;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const SGS_DATE_FORMAT: &str = "%d/%m/%Y";

/// Retries of a single request; whole fetch rounds are retried by the caller.
const HTTP_RETRIES: usize = 1;
const HTTP_RETRY_DELAY_MS: u64 = 250;

/// Client for the SGS time series API of the Banco Central do Brasil.
pub struct SgsProvider {
    base_url: String,
    client: reqwest::Client,
    cache: Arc<dyn KeyValueCollection>,
    ttl: Duration,
}

impl SgsProvider {
    pub fn new(config: &SgsProviderConfig, store: &KeyValueStore, ttl: Duration) -> Result<Self> {
        Self::new_with_collection(config, store.get_collection("sgs", true), ttl)
    }

    pub fn new_with_collection(
        config: &SgsProviderConfig,
        cache: Arc<dyn KeyValueCollection>,
        ttl: Duration,
    ) -> Result<Self> {
        let client = build_client(
            &config.user_agent,
            Duration::from_secs(config.timeout_secs),
            config.accept_invalid_certs,
        )
        .context("Failed to build HTTP client")?;

        Ok(SgsProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            cache,
            ttl,
        })
    }

    fn series_url(&self, code: u32, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/dados/serie/bcdata.sgs.{}/dados?formato=json&dataInicial={}&dataFinal={}",
            self.base_url,
            code,
            start.format(SGS_DATE_FORMAT),
            end.format(SGS_DATE_FORMAT)
        )
    }
}

#[derive(Debug, Deserialize)]
struct SgsObservation {
    data: String,
    valor: SgsValue,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SgsValue {
    Number(f64),
    Text(String),
}

impl SgsValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            SgsValue::Number(v) => Some(*v),
            SgsValue::Text(s) => s.trim().replace(',', ".").parse().ok(),
        }
    }
}

fn parse_observations(code: u32, observations: Vec<SgsObservation>) -> Series {
    observations
        .into_iter()
        .filter_map(|obs| {
            let date = NaiveDate::parse_from_str(&obs.data, SGS_DATE_FORMAT).ok();
            let value = obs.valor.as_f64();
            if date.is_none() || value.is_none() {
                debug!(code, ?obs, "Skipping unparsable observation");
            }
            date.zip(value)
        })
        .collect()
}

#[async_trait]
impl SeriesProvider for SgsProvider {
    #[instrument(skip(self))]
    async fn fetch_series(&self, code: u32, start: NaiveDate, end: NaiveDate) -> Result<Series> {
        let cache_key = format!("sgs:{code}:{start}:{end}");
        if let Some(cached) = self.cache.get(cache_key.as_bytes()).await {
            match serde_json::from_slice::<Vec<(NaiveDate, f64)>>(&cached) {
                Ok(points) => return Ok(points.into_iter().collect()),
                Err(e) => warn!(error = %e, "Ignoring corrupt cache entry"),
            }
        }

        let url = self.series_url(code, start, end);
        debug!("Requesting series data from {}", url);

        let response = with_retry(
            || async { self.client.get(&url).send().await?.error_for_status() },
            HTTP_RETRIES,
            HTTP_RETRY_DELAY_MS,
        )
        .await
        .with_context(|| format!("Failed to fetch SGS series {code}"))?;

        let response_text = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for SGS series {code}"))?;

        if response_text.trim().is_empty() {
            return Err(anyhow!("Received empty response for SGS series {}", code));
        }

        let observations: Vec<SgsObservation> = serde_json::from_str(&response_text)
            .with_context(|| {
                format!("Failed to parse SGS response for series {code}. Response: '{response_text}'")
            })?;

        let series = parse_observations(code, observations);
        debug!(code, points = series.len(), "Fetched series");

        if !series.is_empty() {
            let payload = serde_json::to_vec(&series.to_points())?;
            self.cache
                .put(cache_key.as_bytes(), &payload, Some(self.ttl))
                .await;
        }

        Ok(series)
    }
}
