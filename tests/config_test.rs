use std::path::{Path, PathBuf};
use std::time::Duration;

use actions_board::config::loader::{load_config, state_path};
use actions_board::config::types::AppConfig;
use actions_board::engine::CoordinatorSettings;

#[test]
fn parse_minimal_config() {
    let toml = r#"
[refresh]
interval_secs = 120
"#;
    let config: AppConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.refresh.interval_secs, 120);
    // Everything else keeps its default.
    assert_eq!(config.refresh.batch_size, 3);
    assert_eq!(config.backend.base_url, "http://localhost:8000");
}

#[test]
fn parse_unknown_keys_ignored() {
    let toml = r#"
unknown_top_level = "should be ignored"

[display]
color = false
shiny = true
"#;
    let config: AppConfig = toml::from_str(toml).unwrap();
    assert!(!config.display.color);
}

#[test]
fn default_config_has_sane_defaults() {
    let config = AppConfig::default();
    assert_eq!(config.backend.request_timeout_secs, 30);
    assert_eq!(config.backend.cache_ttl_secs, 0);
    assert_eq!(config.refresh.interval(), Duration::from_secs(60));
    assert_eq!(config.refresh.batch_size(), 3);
    assert_eq!(config.refresh.batch_delay_ms, 500);
    assert_eq!(config.refresh.runs_per_page(), 3);
    assert_eq!(config.refresh.run_timeout_secs, 30);
    assert_eq!(config.display.date_format, "%b %-d, %Y %-I:%M %p");
    assert_eq!(config.display.commit_message_width, 50);
    assert!(config.storage.path.is_none());
}

#[test]
fn zero_sizes_are_clamped() {
    let toml = r#"
[refresh]
batch_size = 0
runs_per_page = 0
interval_secs = 0
"#;
    let config: AppConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.refresh.batch_size(), 1);
    assert_eq!(config.refresh.runs_per_page(), 1);
    assert_eq!(config.refresh.interval(), Duration::from_secs(1));

    let config: AppConfig = toml::from_str("[refresh]\nruns_per_page = 500\n").unwrap();
    assert_eq!(config.refresh.runs_per_page(), 100);
}

#[test]
fn settings_follow_config() {
    let config: AppConfig = toml::from_str(
        r#"
[refresh]
batch_size = 4
batch_delay_ms = 100
runs_per_page = 7
run_timeout_secs = 5
max_restarts = 2

[display]
commit_message_width = 20
"#,
    )
    .unwrap();
    let settings = CoordinatorSettings::from_config(&config);
    assert_eq!(settings.batch_size, 4);
    assert_eq!(settings.batch_delay, Duration::from_millis(100));
    assert_eq!(settings.runs_per_page, 7);
    assert_eq!(settings.run_timeout, Duration::from_secs(5));
    assert_eq!(settings.restart.max_restarts, 2);
    assert_eq!(settings.render.commit_message_width, 20);
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

#[test]
fn load_full_fixture() {
    let path = Path::new("tests/fixtures/full_config.toml");
    let config = load_config(Some(path)).unwrap();
    assert_eq!(config.backend.base_url, "https://board.example.com");
    assert_eq!(config.backend.cache_ttl_secs, 120);
    assert_eq!(config.refresh.batch_size, 5);
    assert_eq!(config.refresh.runs_per_page, 10);
    assert_eq!(config.display.date_format, "relative");
    assert!(!config.display.color);
    assert_eq!(
        state_path(&config),
        PathBuf::from("/tmp/actions-board/state.json")
    );
}

#[test]
fn invalid_toml_produces_error() {
    let path = Path::new("tests/fixtures/invalid_toml.toml");
    let result = load_config(Some(path));
    assert!(result.is_err());
    let err_msg = format!("{:#}", result.unwrap_err());
    // Error should reference the file path.
    assert!(
        err_msg.contains("invalid_toml.toml"),
        "error should mention file: {err_msg}"
    );
}

#[test]
fn unknown_keys_in_fixture_tolerated() {
    let path = Path::new("tests/fixtures/unknown_keys_config.toml");
    let config = load_config(Some(path)).unwrap();
    assert_eq!(config.refresh.interval_secs, 15);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_config(Some(dir.path().join("nope.toml").as_path()));
    assert!(result.is_err());
}

#[test]
fn load_from_tempfile() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[backend]\nbase_url = \"http://127.0.0.1:9999\"\n").unwrap();
    let config = load_config(Some(path.as_path())).unwrap();
    assert_eq!(config.backend.base_url, "http://127.0.0.1:9999");
}

#[test]
fn unrenderable_date_format_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[display]\ndate_format = \"%Q\"\n").unwrap();
    let err_msg = format!("{:#}", load_config(Some(path.as_path())).unwrap_err());
    assert!(err_msg.contains("date_format"), "{err_msg}");
    assert!(err_msg.contains("config.toml"), "{err_msg}");

    std::fs::write(&path, "[display]\ndate_format = \"relative\"\n").unwrap();
    assert!(load_config(Some(path.as_path())).is_ok());
}
