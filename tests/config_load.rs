// tests/config_load.rs
use std::path::Path;
use std::time::Duration;
use std::{env, fs};

use flight_price_alert::config::{
    load_session_from, resolve_config_path, NotifierConfig, ENV_CONFIG_PATH,
};
use flight_price_alert::AlertError;

const TOML_CFG: &str = r#"
origin = "sha"
destination = "CTU"
flight_way = "oneway"
dates = ["20250601", "20250715"]
price_step = 80
poll_interval_secs = 300
"#;

fn clear_push_env() {
    for k in ["WXPUSHER_TOKEN", "WXPUSHER_UID", "PUSHPLUS_TOKEN"] {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn loads_toml_file() {
    clear_push_env();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("flight_alert.toml");
    fs::write(&p, TOML_CFG).unwrap();

    let cfg = load_session_from(&p).unwrap();
    assert_eq!(cfg.route.origin, "SHA");
    assert_eq!(cfg.dates.len(), 2);
    assert_eq!(cfg.price_step, 80);
    assert_eq!(cfg.poll_interval, Duration::from_secs(300));
    assert_eq!(cfg.notifier, NotifierConfig::Log);
}

#[serial_test::serial]
#[test]
fn loads_legacy_json_file() {
    clear_push_env();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("config.json");
    fs::write(
        &p,
        r#"{"dateToGo":"20250601","placeFrom":"SHA","placeTo":"CTU","flightWay":"Oneway",
            "sleepTime":600,"priceStep":50,"SCKEY":"",
            "lastDirectPrices":{},"lastNonDirectPrices":{}}"#,
    )
    .unwrap();

    let cfg = load_session_from(&p).unwrap();
    assert_eq!(cfg.route.destination, "CTU");
    // Blank SCKEY means no push credential.
    assert_eq!(cfg.notifier, NotifierConfig::Log);
}

#[serial_test::serial]
#[test]
fn push_credentials_fall_back_to_env() {
    clear_push_env();
    env::set_var("PUSHPLUS_TOKEN", "from-env");
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("flight_alert.toml");
    fs::write(&p, TOML_CFG).unwrap();

    let cfg = load_session_from(&p).unwrap();
    env::remove_var("PUSHPLUS_TOKEN");
    assert!(matches!(cfg.notifier, NotifierConfig::Pushplus { ref token, .. } if token == "from-env"));
}

#[test]
fn missing_file_is_config_missing() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_session_from(&dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, AlertError::ConfigMissing { .. }));
}

#[test]
fn invalid_values_are_reported_together() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("bad.toml");
    fs::write(
        &p,
        r#"
origin = "SHA"
destination = ""
dates = ["2025-06-01", "20250230"]
"#,
    )
    .unwrap();
    match load_session_from(&p).unwrap_err() {
        AlertError::ConfigInvalid { problems } => {
            assert!(problems.len() >= 3, "{problems:?}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[serial_test::serial]
#[test]
fn path_resolution_prefers_flag_then_env_then_defaults() {
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);

    // Nothing anywhere.
    assert!(matches!(
        resolve_config_path(None),
        Err(AlertError::ConfigMissing { .. })
    ));

    // JSON fallback in ./config/.
    fs::create_dir_all("config").unwrap();
    fs::write("config/flight_alert.json", "{}").unwrap();
    assert_eq!(
        resolve_config_path(None).unwrap(),
        Path::new("config/flight_alert.json")
    );

    // TOML beats JSON.
    fs::write("config/flight_alert.toml", "").unwrap();
    assert_eq!(
        resolve_config_path(None).unwrap(),
        Path::new("config/flight_alert.toml")
    );

    // Env beats defaults, flag beats env.
    env::set_var(ENV_CONFIG_PATH, "/etc/flight.toml");
    assert_eq!(
        resolve_config_path(None).unwrap(),
        Path::new("/etc/flight.toml")
    );
    assert_eq!(
        resolve_config_path(Some(Path::new("mine.json"))).unwrap(),
        Path::new("mine.json")
    );
    env::remove_var(ENV_CONFIG_PATH);

    env::set_current_dir(&old).unwrap();
}
