// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod change_detector;
pub mod config;
pub mod error;
pub mod fare;
pub mod ledger;
pub mod monitor;
pub mod notify;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::change_detector::{detect, Detection, Outcome, PriceEvent, PriceEventKind};
pub use crate::config::SessionConfig;
pub use crate::error::{AlertError, Result};
pub use crate::fare::{FareSnapshot, FareSource, Price, Route, Shape, WatchDate};
pub use crate::ledger::{Ledger, LedgerStore};
pub use crate::monitor::{Monitor, PassReport};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("flight_price_alert={level},warn")));

    let registry = tracing_subscriber::registry().with(filter);
    let res = match format {
        LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
    };
    if let Err(e) = res {
        eprintln!("tracing already initialised: {e}");
    }
}
