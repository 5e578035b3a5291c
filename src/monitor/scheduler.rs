// src/monitor/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::{Monitor, PassReport};
use crate::{AlertError, Result};

/// Wait after a failed fetch, before clamping to the poll interval.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(30);
const MIN_BACKOFF: Duration = Duration::from_secs(1);

const EVENT_CAPACITY: usize = 64;

/// What the watch loop publishes. Subscribers render these; they never see
/// the ledger itself.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    PassStarted { at: DateTime<Utc> },
    PassCompleted(Arc<PassReport>),
    FetchFailed { error: String, retry_in: Duration },
    Aborted { error: String },
    Stopped,
}

enum PassEnd {
    Completed(PassReport),
    FetchFailed(AlertError),
    Cancelled,
}

/// Continuous mode, before it is started. Subscribe first so no event is
/// missed, then [`Scheduler::spawn`].
pub struct Scheduler {
    monitor: Monitor,
    events: broadcast::Sender<MonitorEvent>,
}

impl Scheduler {
    pub fn new(monitor: Monitor) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { monitor, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let events = self.events.clone();
        let join = tokio::spawn(run(self.monitor, stop_rx, self.events));
        SchedulerHandle {
            stop: stop_tx,
            events,
            join,
        }
    }
}

/// Running watch loop. Dropping the handle also stops the loop.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    events: broadcast::Sender<MonitorEvent>,
    join: JoinHandle<Result<()>>,
}

impl SchedulerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Wait for the loop to exit. Err only if the ledger turned out corrupt.
    pub async fn join(self) -> anyhow::Result<()> {
        let SchedulerHandle { stop, join, .. } = self;
        let out = join.await?;
        drop(stop);
        Ok(out?)
    }

    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.stop();
        self.join().await
    }
}

/// Retry delay for a given poll interval: at most half of it, never under 1 s.
pub fn retry_backoff(interval: Duration) -> Duration {
    RETRY_BACKOFF.min(interval / 2).max(MIN_BACKOFF)
}

/// Resolves once a stop was requested or the handle went away.
async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|s| *s).await;
}

/// Sleep for `d` unless stopped first. Returns true when stopped.
async fn sleep_or_stop(d: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(d) => false,
        _ = stopped(stop) => true,
    }
}

async fn pass(monitor: &Monitor, stop: &mut watch::Receiver<bool>) -> Result<PassEnd> {
    let started_at = Utc::now();
    let ledger = monitor.load_ledger().await?;

    // A stop during the fetch discards the pass; nothing has been written.
    let fetched = tokio::select! {
        r = monitor.fetch() => r,
        _ = stopped(stop) => return Ok(PassEnd::Cancelled),
    };

    // From here on the pass runs to completion so the ledger write is whole.
    Ok(match fetched {
        Ok((direct, non_direct)) => {
            PassEnd::Completed(monitor.complete(ledger, &direct, &non_direct, started_at).await)
        }
        Err(e) => PassEnd::FetchFailed(e),
    })
}

async fn run(
    monitor: Monitor,
    mut stop: watch::Receiver<bool>,
    events: broadcast::Sender<MonitorEvent>,
) -> Result<()> {
    let interval = monitor.config().poll_interval;
    let backoff = retry_backoff(interval);
    tracing::info!(interval_secs = interval.as_secs(), "watch loop started");

    let outcome = loop {
        if *stop.borrow() {
            break Ok(());
        }
        let _ = events.send(MonitorEvent::PassStarted { at: Utc::now() });

        let delay = match pass(&monitor, &mut stop).await {
            Ok(PassEnd::Completed(report)) => {
                let _ = events.send(MonitorEvent::PassCompleted(Arc::new(report)));
                tracing::info!(next_in_secs = interval.as_secs(), "sleeping until next check");
                interval
            }
            Ok(PassEnd::FetchFailed(e)) => {
                tracing::warn!(retry_in_secs = backoff.as_secs(), "{e}");
                let _ = events.send(MonitorEvent::FetchFailed {
                    error: e.to_string(),
                    retry_in: backoff,
                });
                backoff
            }
            Ok(PassEnd::Cancelled) => break Ok(()),
            Err(e) => {
                tracing::error!("{e}; stopping watch loop");
                let _ = events.send(MonitorEvent::Aborted {
                    error: e.to_string(),
                });
                break Err(e);
            }
        };

        if sleep_or_stop(delay, &mut stop).await {
            break Ok(());
        }
    };

    tracing::info!("watch loop stopped");
    let _ = events.send(MonitorEvent::Stopped);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_stays_below_the_poll_interval() {
        assert_eq!(retry_backoff(Duration::from_secs(600)), RETRY_BACKOFF);
        assert_eq!(retry_backoff(Duration::from_secs(60)), RETRY_BACKOFF);
        assert_eq!(retry_backoff(Duration::from_secs(30)), Duration::from_secs(15));
        assert_eq!(retry_backoff(Duration::from_secs(5)), Duration::from_millis(2500));
    }

    #[test]
    fn backoff_has_a_one_second_floor() {
        assert_eq!(retry_backoff(Duration::from_secs(1)), Duration::from_secs(1));
        assert_eq!(retry_backoff(Duration::from_millis(1500)), Duration::from_secs(1));
    }
}
