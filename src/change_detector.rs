//! # Change Detector
//! Pure decision step: `(snapshots, ledger, threshold)` → events + new ledger.
//! No I/O. Both drivers (single pass and watch loop) go through [`detect`].
//!
//! Per (date, shape), independently:
//! - no observed price → nothing happens, ledger untouched
//! - ledger holds [`NEVER_NOTIFIED`] → first-seen event, ledger := observed
//! - `|observed - last| >= threshold` → change event, ledger := observed
//! - otherwise → nothing happens, ledger untouched

use serde::Serialize;

use crate::fare::{FareSnapshot, Price, Shape, WatchDate};
use crate::ledger::{Ledger, NEVER_NOTIFIED};

/// Verdict for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    NoData,
    FirstSeen,
    Changed { last: Price, delta: i64 },
    Unchanged { last: Price },
}

impl Outcome {
    pub fn notifies(&self) -> bool {
        matches!(self, Outcome::FirstSeen | Outcome::Changed { .. })
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Outcome::NoData => "no data",
            Outcome::FirstSeen => "first seen",
            Outcome::Changed { .. } => "threshold exceeded",
            Outcome::Unchanged { .. } => "unchanged",
        }
    }
}

/// Decide a single (date, shape) observation against its last notified price.
pub fn evaluate(observed: Option<Price>, last: Price, threshold: Price) -> Outcome {
    let Some(price) = observed else {
        return Outcome::NoData;
    };
    if last == NEVER_NOTIFIED {
        return Outcome::FirstSeen;
    }
    let delta = i64::from(price) - i64::from(last);
    if delta.abs() >= i64::from(threshold) {
        Outcome::Changed { last, delta }
    } else {
        Outcome::Unchanged { last }
    }
}

/// One line of the per-pass report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub date: WatchDate,
    pub shape: Shape,
    pub observed: Option<Price>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceEventKind {
    FirstSeen,
    Changed { last: Price, delta: i64 },
}

/// Something worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceEvent {
    pub date: WatchDate,
    pub shape: Shape,
    pub price: Price,
    #[serde(flatten)]
    pub kind: PriceEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub events: Vec<PriceEvent>,
    pub observations: Vec<Observation>,
    pub ledger: Ledger,
    /// True iff at least one ledger entry was written.
    pub changed: bool,
}

/// Run one detection pass over every watched date and both shapes.
///
/// Dates missing from a snapshot are treated as "no data" for that shape.
pub fn detect(
    dates: &[WatchDate],
    direct: &FareSnapshot,
    non_direct: &FareSnapshot,
    ledger: &Ledger,
    threshold: Price,
) -> Detection {
    debug_assert_eq!(direct.shape, Shape::Direct);
    debug_assert_eq!(non_direct.shape, Shape::NonDirect);

    let mut next = ledger.clone();
    let mut events = Vec::new();
    let mut observations = Vec::with_capacity(dates.len() * 2);
    let mut changed = false;

    for date in dates {
        for snapshot in [direct, non_direct] {
            let shape = snapshot.shape;
            let observed = snapshot.price(date);
            let outcome = evaluate(observed, ledger.last(date, shape), threshold);

            if let Some(price) = observed.filter(|_| outcome.notifies()) {
                let kind = match outcome {
                    Outcome::Changed { last, delta } => PriceEventKind::Changed { last, delta },
                    _ => PriceEventKind::FirstSeen,
                };
                next.record(date, shape, price);
                changed = true;
                events.push(PriceEvent {
                    date: date.clone(),
                    shape,
                    price,
                    kind,
                });
            }

            observations.push(Observation {
                date: date.clone(),
                shape,
                observed,
                outcome,
            });
        }
    }

    Detection {
        events,
        observations,
        ledger: next,
        changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_covers_every_branch() {
        assert_eq!(evaluate(None, 1200, 50), Outcome::NoData);
        assert_eq!(evaluate(None, NEVER_NOTIFIED, 50), Outcome::NoData);
        assert_eq!(evaluate(Some(1200), NEVER_NOTIFIED, 50), Outcome::FirstSeen);
        assert_eq!(
            evaluate(Some(1260), 1200, 50),
            Outcome::Changed { last: 1200, delta: 60 }
        );
        assert_eq!(
            evaluate(Some(1140), 1200, 50),
            Outcome::Changed { last: 1200, delta: -60 }
        );
        assert_eq!(evaluate(Some(1230), 1200, 50), Outcome::Unchanged { last: 1200 });
    }

    #[test]
    fn delta_equal_to_threshold_notifies() {
        assert_eq!(
            evaluate(Some(1250), 1200, 50),
            Outcome::Changed { last: 1200, delta: 50 }
        );
        assert_eq!(
            evaluate(Some(1150), 1200, 50),
            Outcome::Changed { last: 1200, delta: -50 }
        );
        assert_eq!(evaluate(Some(1249), 1200, 50), Outcome::Unchanged { last: 1200 });
    }

    #[test]
    fn outcome_reasons() {
        assert!(!Outcome::NoData.notifies());
        assert_eq!(Outcome::Unchanged { last: 1 }.reason(), "unchanged");
        assert_eq!(Outcome::FirstSeen.reason(), "first seen");
    }
}
