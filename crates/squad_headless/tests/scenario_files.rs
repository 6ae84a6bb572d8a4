//! File-based scenario loading and running.

use std::io::Write;
use std::path::PathBuf;

use squad_core::data::AgentConfig;
use squad_headless::{run_scenario, RunOptions, Scenario, ScenarioError};
use squad_test_utils::fixtures::TROOP_RON;

fn bundled(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("scenarios")
        .join(name)
}

#[test]
fn bundled_skirmish_loads_and_runs() {
    let scenario = Scenario::load(bundled("skirmish.ron")).unwrap();
    assert_eq!(scenario.squads.len(), 2);
    assert!(scenario.grid.is_some());

    let options = RunOptions {
        ticks: Some(120),
        seed: None,
    };
    let first = run_scenario(&scenario, options).unwrap();
    let second = run_scenario(&scenario, options).unwrap();
    assert_eq!(first.seed, 7);
    assert_eq!(first.final_state_hash, second.final_state_hash);
    assert_eq!(first.rejected_commands, 0);
}

#[test]
fn missing_file_is_reported() {
    let err = Scenario::load("/nonexistent/scenario.ron").unwrap_err();
    assert!(matches!(err, ScenarioError::FileNotFound(_)));
}

#[test]
fn malformed_file_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "Scenario(name: ").unwrap();
    let err = Scenario::load(file.path()).unwrap_err();
    assert!(matches!(err, ScenarioError::ParseError(_)));
}

#[test]
fn scenario_written_to_disk_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stock.ron");
    let scenario = Scenario::skirmish();
    std::fs::write(&path, ron::to_string(&scenario).unwrap()).unwrap();

    let loaded = Scenario::load(&path).unwrap();
    assert_eq!(loaded, scenario);
}

#[test]
fn archetype_file_validates() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TROOP_RON.as_bytes()).unwrap();
    let text = std::fs::read_to_string(file.path()).unwrap();
    let config = AgentConfig::from_ron("troop.ron", &text).unwrap();
    assert!(config.validate().is_ok());
}
