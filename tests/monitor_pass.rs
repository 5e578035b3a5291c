// tests/monitor_pass.rs
//
// One pass end to end with an in-memory fare source and a recording notifier.

use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use flight_price_alert::config::parse_session;
use flight_price_alert::notify::{Message, Notifier};
use flight_price_alert::{
    AlertError, FareSnapshot, FareSource, LedgerStore, Monitor, Price, Route, Shape, WatchDate,
};

type Prices = Vec<(&'static str, Price)>;

/// Hands out queued price lists per shape; repeats the last one when the
/// queue runs dry. `None` in the script is an outage.
struct ScriptedSource {
    queues: Mutex<BTreeMap<Shape, (VecDeque<Option<Prices>>, Option<Prices>)>>,
    calls: Mutex<usize>,
}

impl ScriptedSource {
    fn new(script: Vec<Option<(Prices, Prices)>>) -> Arc<Self> {
        let mut direct = VecDeque::new();
        let mut non_direct = VecDeque::new();
        for step in script {
            direct.push_back(step.as_ref().map(|(d, _)| d.clone()));
            non_direct.push_back(step.map(|(_, n)| n));
        }
        let mut queues = BTreeMap::new();
        queues.insert(Shape::Direct, (direct, None));
        queues.insert(Shape::NonDirect, (non_direct, None));
        Arc::new(Self {
            queues: Mutex::new(queues),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

fn to_snapshot(shape: Shape, prices: &Prices) -> FareSnapshot {
    FareSnapshot {
        shape,
        prices: prices
            .iter()
            .map(|(k, v)| (k.parse::<WatchDate>().unwrap(), *v))
            .collect::<BTreeMap<_, _>>(),
    }
}

#[async_trait]
impl FareSource for ScriptedSource {
    async fn fetch(&self, _route: &Route, shape: Shape) -> flight_price_alert::Result<FareSnapshot> {
        *self.calls.lock().unwrap() += 1;
        let step = {
            let mut queues = self.queues.lock().unwrap();
            let (queue, last) = queues.get_mut(&shape).unwrap();
            if let Some(next) = queue.pop_front() {
                *last = next;
            }
            last.clone()
        };
        match step {
            Some(prices) => Ok(to_snapshot(shape, &prices)),
            None => Err(AlertError::unavailable("scripted outage")),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<Message>>,
    fail: bool,
}

#[async_trait]
impl Notifier for Recorder {
    async fn send(&self, msg: &Message) -> flight_price_alert::Result<()> {
        self.sent.lock().unwrap().push(msg.clone());
        if self.fail {
            Err(AlertError::notifier("push service down"))
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

fn monitor(source: Arc<ScriptedSource>, notifier: Arc<Recorder>, ledger: &Path) -> Monitor {
    let cfg = parse_session(
        r#"
        origin = "SHA"
        destination = "CTU"
        dates = ["20250601", "20250602"]
        price_step = 50
        "#,
        "toml",
    )
    .unwrap();
    Monitor::new(Arc::new(cfg), source, notifier, LedgerStore::new(ledger))
}

#[tokio::test]
async fn first_pass_notifies_second_identical_pass_is_quiet() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.json");
    let source = ScriptedSource::new(vec![Some((
        vec![("20250601", 1200)],
        vec![("20250601", 900), ("20250602", 1000)],
    ))]);
    let rec = Arc::new(Recorder::default());
    let m = monitor(source.clone(), rec.clone(), &ledger);

    let r1 = m.run_once().await.unwrap();
    assert_eq!(r1.events.len(), 3);
    assert_eq!(r1.notified, 3);
    assert!(r1.ledger_changed && r1.ledger_saved);
    assert_eq!(r1.observations.len(), 4);

    let r2 = m.run_once().await.unwrap();
    assert!(r2.events.is_empty());
    assert!(!r2.ledger_changed);
    assert_eq!(rec.sent.lock().unwrap().len(), 3);
    assert_eq!(source.calls(), 4);
}

#[tokio::test]
async fn state_survives_a_new_monitor_instance() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.json");

    let m1 = monitor(
        ScriptedSource::new(vec![Some((vec![("20250601", 1200)], vec![]))]),
        Arc::new(Recorder::default()),
        &ledger,
    );
    m1.run_once().await.unwrap();

    // A new process sees 1260: a +60 change, not another first-seen.
    let rec = Arc::new(Recorder::default());
    let m2 = monitor(
        ScriptedSource::new(vec![Some((vec![("20250601", 1260)], vec![]))]),
        rec.clone(),
        &ledger,
    );
    let r = m2.run_once().await.unwrap();
    assert_eq!(r.events.len(), 1);
    let sent = rec.sent.lock().unwrap();
    assert!(sent[0].summary.contains("+60"), "{}", sent[0].summary);
}

#[tokio::test]
async fn notifier_failure_does_not_abort_or_block_the_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.json");
    let rec = Arc::new(Recorder {
        fail: true,
        ..Default::default()
    });
    let m = monitor(
        ScriptedSource::new(vec![Some((
            vec![("20250601", 1200), ("20250602", 1300)],
            vec![],
        ))]),
        rec.clone(),
        &ledger,
    );

    let r = m.run_once().await.unwrap();
    assert_eq!(r.notify_failures, 2);
    assert_eq!(r.notified, 0);
    assert_eq!(rec.sent.lock().unwrap().len(), 2);
    assert!(r.ledger_saved);

    let stored = LedgerStore::new(&ledger).load().await.unwrap();
    assert_eq!(stored.last(&"20250601".parse().unwrap(), Shape::Direct), 1200);
}

#[tokio::test]
async fn fetch_failure_aborts_without_touching_the_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.json");
    let rec = Arc::new(Recorder::default());
    let m = monitor(ScriptedSource::new(vec![None]), rec.clone(), &ledger);

    let err = m.run_once().await.unwrap_err();
    assert!(matches!(err, AlertError::FareSourceUnavailable(_)));
    assert!(err.is_fatal_for_pass());
    assert!(!ledger.exists());
    assert!(rec.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn corrupt_ledger_aborts_before_fetching() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.json");
    std::fs::write(&ledger, "[1, 2").unwrap();
    let source = ScriptedSource::new(vec![Some((vec![("20250601", 1200)], vec![]))]);
    let m = monitor(source.clone(), Arc::new(Recorder::default()), &ledger);

    let err = m.run_once().await.unwrap_err();
    assert!(matches!(err, AlertError::ConfigCorrupt { .. }));
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn no_data_pass_keeps_previous_prices() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.json");
    let m = monitor(
        ScriptedSource::new(vec![
            Some((vec![("20250601", 1200)], vec![("20250601", 900)])),
            Some((vec![], vec![])),
        ]),
        Arc::new(Recorder::default()),
        &ledger,
    );
    m.run_once().await.unwrap();
    let before = std::fs::read_to_string(&ledger).unwrap();

    let r = m.run_once().await.unwrap();
    assert!(r.events.is_empty());
    assert!(!r.ledger_changed);
    assert_eq!(std::fs::read_to_string(&ledger).unwrap(), before);
}

#[tokio::test]
async fn failed_ledger_write_is_reported_and_retried_next_pass() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.json");
    // The temp file slot is taken by a directory, so the save cannot happen.
    let tmp_slot = dir.path().join("ledger.json.tmp");
    std::fs::create_dir(&tmp_slot).unwrap();

    let rec = Arc::new(Recorder::default());
    let m = monitor(
        ScriptedSource::new(vec![Some((vec![("20250601", 1200)], vec![]))]),
        rec.clone(),
        &ledger,
    );

    let r1 = m.run_once().await.unwrap();
    assert_eq!(r1.events.len(), 1);
    assert_eq!(r1.notified, 1);
    assert!(r1.ledger_changed);
    assert!(!r1.ledger_saved);
    assert!(!ledger.exists());

    // Once the location is writable the next pass detects again and saves.
    std::fs::remove_dir(&tmp_slot).unwrap();
    let r2 = m.run_once().await.unwrap();
    assert_eq!(r2.events.len(), 1);
    assert!(r2.ledger_saved);
    let stored = LedgerStore::new(&ledger).load().await.unwrap();
    assert_eq!(stored.last(&"20250601".parse().unwrap(), Shape::Direct), 1200);
    assert_eq!(rec.sent.lock().unwrap().len(), 2);
}
