use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;

use super::{normalize_lowest_price, FareSnapshot, FareSource, Route, Shape};
use crate::{AlertError, Result};

pub const DEFAULT_BASE_URL: &str = "https://flights.ctrip.com/itinerary/api/12808/lowestPrice";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

const USER_AGENT: &str = concat!("flight-price-alert/", env!("CARGO_PKG_VERSION"));

/// Lowest-price calendar endpoint. One request per shape.
#[derive(Clone)]
pub struct CtripFareSource {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl CtripFareSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn query(route: &Route, shape: Shape) -> Vec<(&'static str, String)> {
        let mut q = vec![
            ("flightWay", route.way.as_query().to_string()),
            ("dcity", route.origin.clone()),
            ("acity", route.destination.clone()),
        ];
        if shape == Shape::Direct {
            q.push(("direct", "true".to_string()));
        }
        q.push(("army", "false".to_string()));
        q
    }
}

impl Default for CtripFareSource {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl FareSource for CtripFareSource {
    async fn fetch(&self, route: &Route, shape: Shape) -> Result<FareSnapshot> {
        let resp = self
            .client
            .get(&self.base_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout)
            .query(&Self::query(route, shape))
            .send()
            .await
            .map_err(|e| {
                counter!("fare_fetch_errors_total").increment(1);
                if e.is_timeout() {
                    AlertError::unavailable(format!("{shape} request timed out"))
                } else {
                    AlertError::unavailable(format!("{shape} request failed: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            counter!("fare_fetch_errors_total").increment(1);
            return Err(AlertError::unavailable(format!(
                "{shape} request returned HTTP {status}"
            )));
        }

        let body = resp.text().await.map_err(|e| {
            counter!("fare_fetch_errors_total").increment(1);
            AlertError::unavailable(format!("{shape} body read failed: {e}"))
        })?;

        let normalized = normalize_lowest_price(shape, &body).inspect_err(|_| {
            counter!("fare_fetch_errors_total").increment(1);
        })?;
        if let Some(err) = normalized.partial_error() {
            tracing::warn!(
                origin = %route.origin,
                destination = %route.destination,
                "{err}"
            );
        }
        tracing::debug!(shape = %shape, dates = normalized.snapshot.prices.len(), "fares fetched");
        Ok(normalized.snapshot)
    }

    fn name(&self) -> &'static str {
        "ctrip"
    }
}
