// src/config/session.rs
use std::time::Duration;

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use crate::fare::ctrip::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::fare::{parse_watch_dates, FlightWay, Price, Route, WatchDate};
use crate::{AlertError, Result};

pub const DEFAULT_PRICE_STEP: Price = 50;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 600;

pub const ENV_WXPUSHER_TOKEN: &str = "WXPUSHER_TOKEN";
pub const ENV_WXPUSHER_UID: &str = "WXPUSHER_UID";
pub const ENV_PUSHPLUS_TOKEN: &str = "PUSHPLUS_TOKEN";

/// Dates may be a list or one comma-separated string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DateList {
    List(Vec<String>),
    Csv(String),
}

impl DateList {
    fn into_vec(self) -> Vec<String> {
        match self {
            DateList::List(v) => v,
            DateList::Csv(s) => s.split(',').map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    Wxpusher,
    Pushplus,
    Log,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawNotifier {
    kind: Option<NotifierKind>,
    token: Option<String>,
    uid: Option<String>,
    endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFareSource {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

/// On-disk shape, before validation. Accepts the old camelCase keys.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawSessionConfig {
    #[serde(default, alias = "placeFrom")]
    origin: Option<String>,
    #[serde(default, alias = "placeTo")]
    destination: Option<String>,
    #[serde(default, alias = "flightWay")]
    flight_way: Option<FlightWay>,
    #[serde(default, alias = "dateToGo")]
    dates: Option<DateList>,
    #[serde(default, alias = "priceStep")]
    price_step: Option<i64>,
    #[serde(default, alias = "sleepTime")]
    poll_interval_secs: Option<i64>,
    #[serde(default)]
    notifier: Option<RawNotifier>,
    #[serde(default)]
    fare_source: Option<RawFareSource>,

    // Old combined config.json: push token and embedded price history.
    #[serde(default, rename = "SCKEY")]
    legacy_sckey: Option<String>,
    #[serde(default, rename = "lastDirectPrices")]
    _legacy_direct: Option<IgnoredAny>,
    #[serde(default, rename = "lastNonDirectPrices")]
    _legacy_non_direct: Option<IgnoredAny>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NotifierConfig {
    Wxpusher {
        #[serde(skip_serializing)]
        token: String,
        uid: String,
        endpoint: Option<String>,
    },
    Pushplus {
        #[serde(skip_serializing)]
        token: String,
        endpoint: Option<String>,
    },
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FareSourceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for FareSourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Validated, read-only session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionConfig {
    pub route: Route,
    pub dates: Vec<WatchDate>,
    pub price_step: Price,
    pub poll_interval: Duration,
    pub notifier: NotifierConfig,
    pub fare_source: FareSourceConfig,
}

impl SessionConfig {
    /// Validate a raw config. `env` supplies credentials the file leaves out.
    pub(crate) fn from_raw<F>(raw: RawSessionConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut problems = Vec::new();

        let origin = city_code("origin", raw.origin, &mut problems);
        let destination = city_code("destination", raw.destination, &mut problems);

        let dates = match raw.dates.map(DateList::into_vec) {
            None => {
                problems.push("dates is required".to_string());
                Vec::new()
            }
            Some(list) => {
                let cleaned: Vec<String> = list
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                match parse_watch_dates(&cleaned) {
                    Ok(v) if v.is_empty() => {
                        problems.push("dates must name at least one date".to_string());
                        v
                    }
                    Ok(v) => v,
                    Err(mut errs) => {
                        problems.append(&mut errs);
                        Vec::new()
                    }
                }
            }
        };

        let price_step = match raw.price_step {
            None => DEFAULT_PRICE_STEP,
            Some(n) if n > 0 => Price::try_from(n).unwrap_or_else(|_| {
                problems.push(format!("price_step {n} is too large"));
                DEFAULT_PRICE_STEP
            }),
            Some(n) => {
                problems.push(format!("price_step must be positive, got {n}"));
                DEFAULT_PRICE_STEP
            }
        };

        let poll_secs = match raw.poll_interval_secs {
            None => DEFAULT_POLL_INTERVAL_SECS,
            Some(n) if n > 0 => n as u64,
            Some(n) => {
                problems.push(format!("poll_interval_secs must be positive, got {n}"));
                DEFAULT_POLL_INTERVAL_SECS
            }
        };

        let notifier = resolve_notifier(raw.notifier, raw.legacy_sckey, &env, &mut problems);

        let fs = raw.fare_source.unwrap_or_default();
        let fare_source = FareSourceConfig {
            base_url: fs
                .base_url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout_secs: match fs.timeout_secs {
                Some(0) => {
                    problems.push("fare_source.timeout_secs must be positive".to_string());
                    DEFAULT_TIMEOUT_SECS
                }
                Some(n) => n,
                None => DEFAULT_TIMEOUT_SECS,
            },
        };

        if !problems.is_empty() {
            return Err(AlertError::invalid(problems));
        }

        Ok(Self {
            route: Route {
                origin,
                destination,
                way: raw.flight_way.unwrap_or_default(),
            },
            dates,
            price_step,
            poll_interval: Duration::from_secs(poll_secs),
            notifier,
            fare_source,
        })
    }
}

fn city_code(field: &str, value: Option<String>, problems: &mut Vec<String>) -> String {
    let v = value.unwrap_or_default().trim().to_ascii_uppercase();
    if v.is_empty() {
        problems.push(format!("{field} is required"));
    } else if !v.chars().all(|c| c.is_ascii_alphanumeric()) {
        problems.push(format!("{field} `{v}` is not a city code"));
    }
    v
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn resolve_notifier<F>(
    raw: Option<RawNotifier>,
    legacy_sckey: Option<String>,
    env: &F,
    problems: &mut Vec<String>,
) -> NotifierConfig
where
    F: Fn(&str) -> Option<String>,
{
    let raw = raw.unwrap_or_default();
    let token = non_empty(raw.token).or_else(|| non_empty(legacy_sckey.clone()));
    let env_wx_token = non_empty(env(ENV_WXPUSHER_TOKEN));
    let env_wx_uid = non_empty(env(ENV_WXPUSHER_UID));
    let env_pp_token = non_empty(env(ENV_PUSHPLUS_TOKEN));

    let kind = raw.kind.unwrap_or_else(|| {
        if legacy_sckey.is_some() && token.is_some() {
            NotifierKind::Pushplus
        } else if env_wx_token.is_some() && env_wx_uid.is_some() {
            NotifierKind::Wxpusher
        } else if env_pp_token.is_some() || token.is_some() {
            NotifierKind::Pushplus
        } else {
            NotifierKind::Log
        }
    });

    match kind {
        NotifierKind::Wxpusher => {
            let token = token.or(env_wx_token);
            let uid = non_empty(raw.uid).or(env_wx_uid);
            match (token, uid) {
                (Some(token), Some(uid)) => NotifierConfig::Wxpusher {
                    token,
                    uid,
                    endpoint: raw.endpoint,
                },
                _ => {
                    problems.push(format!(
                        "wxpusher needs a token and uid (or {ENV_WXPUSHER_TOKEN}/{ENV_WXPUSHER_UID})"
                    ));
                    NotifierConfig::Log
                }
            }
        }
        NotifierKind::Pushplus => match token.or(env_pp_token) {
            Some(token) => NotifierConfig::Pushplus {
                token,
                endpoint: raw.endpoint,
            },
            None => {
                problems.push(format!("pushplus needs a token (or {ENV_PUSHPLUS_TOKEN})"));
                NotifierConfig::Log
            }
        },
        NotifierKind::Log => NotifierConfig::Log,
    }
}
