// src/fare/types.rs
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lowest fare in whole currency units.
pub type Price = u32;

/// A monitored departure date, kept in the fare API's `YYYYMMDD` key form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WatchDate(String);

impl WatchDate {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `20250601` -> `2025-06-01`
    pub fn pretty(&self) -> String {
        format!("{}-{}-{}", &self.0[..4], &self.0[4..6], &self.0[6..])
    }
}

impl FromStr for WatchDate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let t = s.trim();
        if t.len() != 8 || !t.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("date `{t}` is not an 8-digit YYYYMMDD key"));
        }
        NaiveDate::parse_from_str(t, "%Y%m%d")
            .map_err(|_| format!("date `{t}` is not a calendar date"))?;
        Ok(Self(t.to_string()))
    }
}

impl TryFrom<String> for WatchDate {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<WatchDate> for String {
    fn from(d: WatchDate) -> Self {
        d.0
    }
}

impl fmt::Display for WatchDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Itinerary shape. Direct and non-direct fares are tracked independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Direct,
    NonDirect,
}

impl Shape {
    pub fn label(self) -> &'static str {
        match self {
            Shape::Direct => "direct",
            Shape::NonDirect => "non-direct",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightWay {
    #[default]
    #[serde(alias = "Oneway", alias = "OneWay")]
    Oneway,
    #[serde(alias = "Roundtrip", alias = "RoundTrip")]
    Roundtrip,
}

impl FlightWay {
    /// Value of the `flightWay` query parameter.
    pub fn as_query(self) -> &'static str {
        match self {
            FlightWay::Oneway => "Oneway",
            FlightWay::Roundtrip => "Roundtrip",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub origin: String,
    pub destination: String,
    pub way: FlightWay,
}

/// Lowest observed price per date for one shape at one query instant.
/// A date missing from `prices` means "no data".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FareSnapshot {
    pub shape: Shape,
    pub prices: BTreeMap<WatchDate, Price>,
}

impl FareSnapshot {
    pub fn empty(shape: Shape) -> Self {
        Self {
            shape,
            prices: BTreeMap::new(),
        }
    }

    pub fn price(&self, date: &WatchDate) -> Option<Price> {
        self.prices.get(date).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[async_trait::async_trait]
pub trait FareSource: Send + Sync {
    async fn fetch(&self, route: &Route, shape: Shape) -> crate::Result<FareSnapshot>;
    fn name(&self) -> &'static str;
}

/// Parse a list of raw date strings, dropping duplicates but keeping order.
pub fn parse_watch_dates<S: AsRef<str>>(raw: &[S]) -> Result<Vec<WatchDate>, Vec<String>> {
    let mut out: Vec<WatchDate> = Vec::with_capacity(raw.len());
    let mut problems = Vec::new();
    for r in raw {
        match r.as_ref().parse::<WatchDate>() {
            Ok(d) if out.contains(&d) => {}
            Ok(d) => out.push(d),
            Err(e) => problems.push(e),
        }
    }
    if problems.is_empty() {
        Ok(out)
    } else {
        Err(problems)
    }
}
