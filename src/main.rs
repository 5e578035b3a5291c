//! flight-price-alert CLI entrypoint
//!
//! `once`     one pass for cron / CI schedulers, exit code reflects the fetch
//! `watch`    loop until SIGINT/SIGTERM, optional status server
//! `validate` load the session config and print what was understood

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info};

use flight_price_alert::api::{create_router, spawn_board_listener, StatusBoard};
use flight_price_alert::config::{load_session_from, resolve_config_path, ENV_LEDGER_PATH};
use flight_price_alert::fare::ctrip::CtripFareSource;
use flight_price_alert::ledger::DEFAULT_LEDGER_PATH;
use flight_price_alert::monitor::scheduler::{MonitorEvent, Scheduler};
use flight_price_alert::notify::build_notifier;
use flight_price_alert::{init_tracing, telemetry, LedgerStore, LogFormat, Monitor, SessionConfig};

#[derive(Parser, Debug)]
#[command(name = "flight-price-alert")]
#[command(about = "Push a notification when a watched fare appears or moves", long_about = None)]
struct Args {
    /// Session config (TOML or JSON). Falls back to config/flight_alert.{toml,json}
    #[arg(short, long, env = "FLIGHT_ALERT_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger file with last-notified prices
    #[arg(long, env = ENV_LEDGER_PATH, default_value = DEFAULT_LEDGER_PATH)]
    ledger: PathBuf,

    /// Log level (RUST_LOG overrides)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run exactly one check and exit
    Once,
    /// Check repeatedly until interrupted
    Watch {
        /// Serve /health, /status and /metrics on this address
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
    /// Validate the session config and exit
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present; credentials usually live there.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &Args) -> Result<SessionConfig> {
    let path = resolve_config_path(args.config.as_deref()).context("no session config found")?;
    let cfg = load_session_from(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    info!(
        config_path = %path.display(),
        origin = %cfg.route.origin,
        destination = %cfg.route.destination,
        dates = cfg.dates.len(),
        price_step = cfg.price_step,
        "Configuration loaded"
    );
    Ok(cfg)
}

fn build_monitor(cfg: SessionConfig, ledger: PathBuf) -> Monitor {
    let source = CtripFareSource::new(cfg.fare_source.base_url.clone())
        .with_timeout(cfg.fare_source.timeout_secs);
    let notifier = build_notifier(&cfg.notifier);
    info!(notifier = notifier.name(), ledger = %ledger.display(), "Monitor ready");
    Monitor::new(
        Arc::new(cfg),
        Arc::new(source),
        notifier,
        LedgerStore::new(ledger),
    )
}

async fn run(args: Args) -> Result<ExitCode> {
    let cfg = load_config(&args)?;

    match args.command {
        Command::Validate => {
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Once => {
            let monitor = build_monitor(cfg, args.ledger);
            match monitor.run_once().await {
                Ok(_) => Ok(ExitCode::SUCCESS),
                Err(e) => {
                    error!("pass aborted: {e}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Watch { listen } => {
            watch(build_monitor(cfg, args.ledger), listen).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn watch(monitor: Monitor, listen: Option<SocketAddr>) -> Result<()> {
    let metrics = match listen {
        Some(_) => Some(telemetry::install_prometheus()?),
        None => None,
    };

    let scheduler = Scheduler::new(monitor);
    let board = StatusBoard::new();
    spawn_board_listener(board.clone(), scheduler.subscribe());
    let mut events = scheduler.subscribe();
    let handle = scheduler.spawn();

    if let Some(addr) = listen {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind status server on {addr}"))?;
        info!(%addr, "status server listening");
        let router = create_router(board, metrics);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "status server error");
            }
        });
    }

    let loop_ended = async {
        loop {
            match events.recv().await {
                Ok(MonitorEvent::Stopped) | Err(RecvError::Closed) => break,
                _ => {}
            }
        }
    };

    tokio::select! {
        r = shutdown_signal() => r?,
        _ = loop_ended => {}
    }

    handle.shutdown().await
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        tokio::select! {
            r = tokio::signal::ctrl_c() => {
                r.context("Failed to listen for ctrl-c")?;
                info!("Received SIGINT, shutting down gracefully");
            }
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for ctrl-c")?;
        info!("Received ctrl-c, shutting down gracefully");
    }
    Ok(())
}
