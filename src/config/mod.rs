// src/config/mod.rs
pub mod session;

pub use session::{FareSourceConfig, NotifierConfig, NotifierKind, SessionConfig};

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use session::RawSessionConfig;

use crate::{AlertError, Result};

pub const ENV_CONFIG_PATH: &str = "FLIGHT_ALERT_CONFIG";
pub const ENV_LEDGER_PATH: &str = "FLIGHT_ALERT_LEDGER";

const DEFAULT_TOML_PATH: &str = "config/flight_alert.toml";
const DEFAULT_JSON_PATH: &str = "config/flight_alert.json";

/// Pick the session config file:
/// 1) explicit path (CLI flag)
/// 2) $FLIGHT_ALERT_CONFIG
/// 3) config/flight_alert.toml
/// 4) config/flight_alert.json
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        return Ok(PathBuf::from(p));
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let pb = PathBuf::from(candidate);
        if pb.exists() {
            return Ok(pb);
        }
    }
    Err(AlertError::ConfigMissing {
        path: PathBuf::from(DEFAULT_TOML_PATH),
    })
}

/// Load and validate a session config. Credentials missing from the file
/// are taken from the process environment.
pub fn load_session_from(path: &Path) -> Result<SessionConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AlertError::ConfigMissing {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(AlertError::corrupt(path, e)),
    };
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let raw = parse_raw(&content, &ext).map_err(|reason| AlertError::corrupt(path, reason))?;
    SessionConfig::from_raw(raw, |k| std::env::var(k).ok())
}

/// Parse config text (TOML or JSON) without touching the environment.
pub fn parse_session(content: &str, hint_ext: &str) -> Result<SessionConfig> {
    let raw = parse_raw(content, hint_ext).map_err(|reason| AlertError::corrupt("<inline>", reason))?;
    SessionConfig::from_raw(raw, |_| None)
}

fn parse_raw(s: &str, hint_ext: &str) -> std::result::Result<RawSessionConfig, String> {
    match hint_ext {
        "toml" => toml::from_str(s).map_err(|e| e.to_string()),
        "json" => serde_json::from_str(s).map_err(|e| e.to_string()),
        // No usable extension: JSON objects start with `{`, anything else is TOML.
        _ if s.trim_start().starts_with('{') => serde_json::from_str(s).map_err(|e| e.to_string()),
        _ => toml::from_str(s).map_err(|e| e.to_string()),
    }
}
