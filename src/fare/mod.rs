// src/fare/mod.rs
pub mod ctrip;
pub mod types;

pub use types::{parse_watch_dates, FareSnapshot, FareSource, FlightWay, Price, Route, Shape, WatchDate};

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{AlertError, Result};

/// API status meaning "no fares for this query".
const STATUS_NO_DATA: i64 = 2;

#[derive(Debug, Deserialize)]
struct LowestPriceBody {
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<LowestPriceData>,
}

#[derive(Debug, Deserialize)]
struct LowestPriceData {
    #[serde(rename = "oneWayPrice", default)]
    one_way_price: Option<Vec<BTreeMap<String, serde_json::Value>>>,
}

/// Result of normalizing one lowest-price response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub snapshot: FareSnapshot,
    /// Set when the response was usable but incomplete (no bucket, no-data
    /// status, extra buckets, dropped entries).
    pub partial: Option<String>,
}

impl Normalized {
    pub fn partial_error(&self) -> Option<AlertError> {
        self.partial.clone().map(AlertError::FareSourcePartial)
    }
}

/// Turn a raw lowest-price body into a snapshot.
///
/// Only an unparseable body is an error. Every other oddity degrades to
/// "no data" for the affected dates.
pub fn normalize_lowest_price(shape: Shape, body: &str) -> Result<Normalized> {
    let parsed: LowestPriceBody = serde_json::from_str(body.trim())
        .map_err(|e| AlertError::unavailable(format!("unparseable {shape} response: {e}")))?;

    let msg = parsed.msg.as_deref().unwrap_or("-");
    if parsed.status == Some(STATUS_NO_DATA) {
        return Ok(Normalized {
            snapshot: FareSnapshot::empty(shape),
            partial: Some(format!("{shape}: no-data status ({msg})")),
        });
    }

    let buckets = match parsed.data.and_then(|d| d.one_way_price) {
        Some(b) if !b.is_empty() => b,
        _ => {
            return Ok(Normalized {
                snapshot: FareSnapshot::empty(shape),
                partial: Some(format!("{shape}: response carried no price bucket ({msg})")),
            })
        }
    };

    let mut notes = Vec::new();
    if buckets.len() > 1 {
        notes.push(format!("{} buckets, using the first", buckets.len()));
    }

    let mut snapshot = FareSnapshot::empty(shape);
    let mut dropped = 0usize;
    if let Some(first) = buckets.into_iter().next() {
        for (key, value) in first {
            match (key.parse::<WatchDate>(), as_price(&value)) {
                (Ok(date), Some(price)) => {
                    snapshot.prices.insert(date, price);
                }
                _ => dropped += 1,
            }
        }
    }
    if dropped > 0 {
        notes.push(format!("dropped {dropped} malformed entries"));
    }

    let partial = (!notes.is_empty()).then(|| format!("{shape}: {}", notes.join(", ")));
    Ok(Normalized { snapshot, partial })
}

fn as_price(v: &serde_json::Value) -> Option<Price> {
    if let Some(n) = v.as_u64() {
        return Price::try_from(n).ok();
    }
    let f = v.as_f64()?;
    if f >= 0.0 && f.fract() == 0.0 && f <= f64::from(Price::MAX) {
        Some(f as Price)
    } else {
        None
    }
}
