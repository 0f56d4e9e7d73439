//! End-to-end checks for the harness command surface.

use std::path::PathBuf;

use proptest::prelude::*;
use tessera_harness::cli::{ReplayArgs, StormArgs};
use tessera_harness::scenario::{ReplayOptions, Scenario, replay};
use tessera_harness::storm::run_storm;
use tessera_harness::{Cli, Commands, HarnessError, run};
use tessera_layout::{EngineConfig, FileStore, LayoutStore};

fn basic_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios/basic.json")
}

fn replay_cli(scenario: PathBuf) -> ReplayArgs {
    ReplayArgs {
        scenario,
        config: None,
        viewport: None,
        store_dir: None,
        expect: None,
        json: false,
    }
}

fn run_to_string(command: Commands) -> Result<String, HarnessError> {
    let mut out = Vec::new();
    run(Cli { log: None, command }, &mut out)?;
    Ok(String::from_utf8(out).expect("utf8 output"))
}

#[test]
fn basic_scenario_settles_as_scripted() {
    let scenario = Scenario::from_file(&basic_path()).unwrap();
    let report = replay(&scenario, &ReplayOptions::default()).unwrap();

    assert_eq!(report.applied(), report.steps.len());
    let rects: Vec<(&str, u16, u16, u16, u16)> = report
        .items
        .iter()
        .map(|i| (i.id.as_str(), i.x, i.y, i.w, i.h))
        .collect();
    assert_eq!(
        rects,
        vec![
            ("clock-1", 0, 0, 3, 2),
            ("chart-2", 0, 2, 4, 2),
            ("note-3", 0, 4, 4, 1),
            ("note-4", 0, 5, 4, 1),
        ]
    );
    for item in &report.items {
        assert!(item.x + item.w <= report.active_columns, "{item:?}");
    }
    assert_eq!(report.items[1].payload["series"], "cpu");
    assert_eq!(report.active_breakpoint, "xs");
}

#[test]
fn replay_output_renders_active_breakpoint() {
    let text = run_to_string(Commands::Replay(replay_cli(basic_path()))).unwrap();
    assert!(text.contains("active breakpoint xs (4 columns)"), "{text}");
    assert!(text.contains("[xs] 4 columns *\naaa.\naaa.\nbbbb\nbbbb\ncccc\ndddd\n"), "{text}");
    assert!(text.contains("[lg] 12 columns\n"), "{text}");
    assert!(text.contains("  chart-2 chart 4x2@(0,2)"), "{text}");
    assert!(text.contains("checksum blake3:"), "{text}");
}

#[test]
fn checksum_is_stable_across_replays() {
    let scenario = Scenario::from_file(&basic_path()).unwrap();
    let first = replay(&scenario, &ReplayOptions::default()).unwrap();
    let second = replay(&scenario, &ReplayOptions::default()).unwrap();
    assert_eq!(first.checksum, second.checksum);

    let mut args = replay_cli(basic_path());
    args.expect = Some(first.checksum.clone());
    assert!(run_to_string(Commands::Replay(args)).is_ok());
}

#[test]
fn expect_mismatch_exits_with_two() {
    let mut args = replay_cli(basic_path());
    args.expect = Some("blake3:0000".to_string());
    let err = run_to_string(Commands::Replay(args)).unwrap_err();
    assert!(matches!(err, HarnessError::ChecksumMismatch { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn json_output_is_a_full_report() {
    let mut args = replay_cli(basic_path());
    args.json = true;
    let text = run_to_string(Commands::Replay(args)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["name"], "basic");
    assert_eq!(value["items"].as_array().map(Vec::len), Some(4));
    assert_eq!(value["layouts"].as_object().map(|m| m.len()), Some(5));
    assert_eq!(value["steps"][0]["op"], "add");
}

#[test]
fn store_dir_persists_final_layout() {
    let dir = tempfile::tempdir().unwrap();
    let mut args = replay_cli(basic_path());
    args.store_dir = Some(dir.path().to_path_buf());
    run_to_string(Commands::Replay(args)).unwrap();

    let key = EngineConfig::default().storage_key;
    let stored = FileStore::new(dir.path()).load(&key).unwrap().unwrap();
    assert_eq!(stored.len(), 4);

    // A second replay starts from the persisted layout, so its adds land
    // below the existing tiles instead of at the origin.
    let options = ReplayOptions {
        store_dir: Some(dir.path().to_path_buf()),
        ..ReplayOptions::default()
    };
    let scenario = Scenario {
        name: "resume".to_string(),
        ..Scenario::from_file(&basic_path()).unwrap()
    };
    let resumed = replay(&scenario, &options).unwrap();
    assert!(resumed.items.len() > 4);
}

#[test]
fn config_file_changes_canonical_columns() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("engine.toml");
    std::fs::write(&config, "columns = 8\n").unwrap();

    let mut args = replay_cli(basic_path());
    args.config = Some(config);
    args.json = true;
    let text = run_to_string(Commands::Replay(args)).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    for item in value["items"].as_array().unwrap() {
        let right = item["x"].as_u64().unwrap() + item["w"].as_u64().unwrap();
        assert!(right <= 8, "{item}");
    }
}

#[test]
fn storm_dump_replays_with_matching_checksum() {
    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("storm.json");
    let text = run_to_string(Commands::Storm(StormArgs {
        seed: 17,
        steps: 200,
        config: None,
        dump: Some(dump.clone()),
    }))
    .unwrap();
    assert!(text.contains("storm seed 17: 200 steps"), "{text}");

    // The dump carries its own expected checksum.
    let replayed = run_to_string(Commands::Replay(replay_cli(dump)));
    assert!(replayed.is_ok(), "{replayed:?}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn storms_never_break_invariants(seed in any::<u64>()) {
        let report = run_storm(seed, 150, &EngineConfig::default());
        prop_assert!(report.is_ok(), "{:?}", report.err());
    }
}
