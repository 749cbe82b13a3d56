//! End-to-end headless runs.

use std::io::Write;

use td_core::config::CoreConfig;
use td_core::lifecycle::Verification;
use td_headless::runner::{load_config, HeadlessRunner, RunSettings};
use td_headless::HeadlessError;

const SMALL_CONFIG: &str = r#"
CoreConfig(
    scheduler: (queue_order: SortedByDue, seed: 11),
    waves: (waves: [
        (groups: [(entity_type: "Basic", count: 2, spawn_interval_ms: 500)]),
        (groups: [(entity_type: "Fast", count: 3, spawn_interval_ms: 250)]),
    ]),
)
"#;

fn run(config: CoreConfig, waves: u32) -> td_headless::RunReport {
    let settings = RunSettings {
        waves,
        ..RunSettings::default()
    };
    HeadlessRunner::new(config, settings)
        .expect("runner")
        .run()
        .expect("run")
}

#[test]
fn test_same_seed_same_report() {
    let a = run(CoreConfig::default(), 3).to_json().expect("json");
    let b = run(CoreConfig::default(), 3).to_json().expect("json");
    assert_eq!(a, b);
}

#[test]
fn test_config_file_drives_the_run() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(SMALL_CONFIG.as_bytes()).expect("write config");

    let config = load_config(Some(file.path())).expect("load");
    let report = run(config, 2);

    assert_eq!(report.seed, 11);
    assert_eq!(report.waves[0].queued, 2);
    assert!(report.waves.iter().all(|w| w.complete));
    assert!(report
        .waves
        .iter()
        .all(|w| w.cleanup.verification == Verification::Clean));
    assert!(report.game_cleanup.managers_cleared.len() >= 5);
}

#[test]
fn test_report_written_to_output_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("report.json");

    let report = run(CoreConfig::default(), 1);
    report.write_json(Some(&path)).expect("write");

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("parse");
    assert_eq!(written["waves"].as_array().map(Vec::len), Some(1));
    assert_eq!(written["game_cleanup"]["scope"], "Game");
    assert_eq!(written["game_cleanup"]["verification"], "Clean");
}

#[test]
fn test_missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let result = load_config(Some(&dir.path().join("absent.ron")));
    assert!(matches!(result, Err(HeadlessError::Core(_))));
}

#[test]
fn test_invalid_settings_rejected() {
    let settings = RunSettings {
        tick_ms: 0,
        ..RunSettings::default()
    };
    assert!(matches!(
        HeadlessRunner::new(CoreConfig::default(), settings),
        Err(HeadlessError::InvalidSettings(_))
    ));
}
