//! Read-only status surface for watch mode.
//!
//! `StatusBoard` is fed from the scheduler's event channel and is the only
//! thing the HTTP handlers look at.

use std::sync::{Arc, RwLock};

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::monitor::scheduler::MonitorEvent;
use crate::monitor::PassReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Checking,
    Sleeping,
    Backoff,
    Stopped,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub phase: Phase,
    pub passes: u64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_report: Option<Arc<PassReport>>,
}

#[derive(Debug, Default)]
pub struct StatusBoard {
    inner: RwLock<StatusSnapshot>,
}

impl StatusBoard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn apply(&self, ev: &MonitorEvent) {
        let mut s = self.inner.write().unwrap_or_else(|p| p.into_inner());
        match ev {
            MonitorEvent::PassStarted { .. } => s.phase = Phase::Checking,
            MonitorEvent::PassCompleted(report) => {
                s.phase = Phase::Sleeping;
                s.passes += 1;
                s.last_report = Some(report.clone());
            }
            MonitorEvent::FetchFailed { error, .. } => {
                s.phase = Phase::Backoff;
                s.last_error = Some(error.clone());
                s.last_error_at = Some(Utc::now());
            }
            MonitorEvent::Aborted { error } => {
                s.last_error = Some(error.clone());
                s.last_error_at = Some(Utc::now());
            }
            MonitorEvent::Stopped => s.phase = Phase::Stopped,
        }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

/// Keep `board` in sync with the event stream until the channel closes.
pub fn spawn_board_listener(
    board: Arc<StatusBoard>,
    mut rx: broadcast::Receiver<MonitorEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => board.apply(&ev),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "status board lagged behind monitor events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[derive(Clone)]
struct ApiState {
    board: Arc<StatusBoard>,
    metrics: Option<PrometheusHandle>,
}

pub fn create_router(board: Arc<StatusBoard>, metrics: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/metrics", get(render_metrics))
        .with_state(ApiState { board, metrics })
}

async fn status(State(state): State<ApiState>) -> Json<StatusSnapshot> {
    Json(state.board.snapshot())
}

async fn render_metrics(State(state): State<ApiState>) -> String {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}
