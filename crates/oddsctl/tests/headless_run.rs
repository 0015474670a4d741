//! Headless controller runs against a file-backed workbook.
//!
//! Resolves a [`Config`] the way the binary does (config file, environment,
//! flags), builds the program over a [`FileWorkbook`] and drives it with
//! explicit instants.
//!
//! # Invariants
//!
//! 1. **Layered config reaches the loop**: file cells and data dir settings
//!    decide where the controller reads and publishes.
//! 2. **Steps persist**: an accepted step is visible in the workbook file.
//! 3. **Suspend then update**: the add-in click lands after the follow-up
//!    delay.
//! 4. **Log line endings**: stderr output never contains a bare `\n`.

#![cfg(test)]

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use oddsctl::{CliAction, Config, CrlfWriter};
use oddsctl_core::{CellValue, Command, command_channel};
use oddsctl_runtime::{
    AtomicJsonFile, FileWorkbook, ObservedState, Program, StatusDocument, WorkbookDocument,
};
use proptest::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

const WORKBOOK: &str = r#"{
  "name": "Trading.xlsm",
  "cells": {
    "C1": "LoL Bo3",
    "C6": "Open",
    "K4": "Red",
    "N4": "Blue",
    "M44": 1.6,
    "N44": 2.0,
    "M190": 1.5,
    "N190": 2.1
  },
  "namedRanges": {
    "ODDSHOME": [1.5, 1.6, 1.7],
    "ODDSAWAY": [2.2, 2.0, 1.9]
  },
  "controls": { "CurrentMapSuspend": false },
  "windows": ["Book1 - Excel", "ExcelTradingAddIn"],
  "interactive": true
}"#;

fn resolve(args: &[String], data_dir: &Path) -> Config {
    let dir = data_dir.to_string_lossy().to_string();
    let env = move |name: &str| (name == "ODDSCTL_DATA_DIR").then(|| dir.clone());
    match oddsctl::load(args, &env).unwrap() {
        CliAction::Run(config) => *config,
        other => panic!("expected Run, got {other:?}"),
    }
}

fn read<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    AtomicJsonFile::new(path).read().unwrap().unwrap()
}

struct Setup {
    dir: TempDir,
    config: Config,
}

fn setup(extra: &[&str]) -> Setup {
    let dir = TempDir::new().unwrap();
    let workbook = dir.path().join("workbook.json");
    fs::write(&workbook, WORKBOOK).unwrap();
    let mut args = vec![
        format!("--workbook={}", workbook.display()),
        "--headless".to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    let config = resolve(&args, dir.path());
    Setup { dir, config }
}

// ============================================================================
// 1. Config to program
// ============================================================================

#[test]
fn config_drives_paths() {
    let s = setup(&[]);
    assert!(s.config.headless);
    let program = s.config.program_config();
    assert_eq!(program.state_path, s.dir.path().join("current_state.json"));
    assert_eq!(program.selection_path, s.dir.path().join("template_sync.json"));
}

// ============================================================================
// 2. Steps and actions
// ============================================================================

#[test]
fn step_persists_to_workbook_file() {
    let s = setup(&[]);
    let workbook = FileWorkbook::connect(&s.config.workbook).unwrap();
    let (tx, rx) = command_channel();
    let mut program = Program::new(workbook, rx, s.config.program_config());
    let report = program.startup();
    assert_eq!(report.home_rungs, 3);

    let t0 = Instant::now();
    assert!(tx.send(Command::StepNext { key: None }));
    program.tick(t0);

    let doc: WorkbookDocument = read(&s.config.workbook);
    assert_eq!(doc.cells.get("M44"), Some(&CellValue::from(1.7)));

    let status: StatusDocument = read(&s.dir.path().join("hotkey_status.json"));
    assert_eq!(status.current_map, 1);
    assert_eq!(status.max_maps, 3);
    assert!(status.connected);

    let state: ObservedState = read(&s.dir.path().join("current_state.json"));
    assert!(state.initial);
    assert_eq!(state.team1_name, "Red");

    program.finish().unwrap();
    let status: StatusDocument = read(&s.dir.path().join("hotkey_status.json"));
    assert!(!status.connected);
}

#[test]
fn suspend_clicks_after_follow_up() {
    let s = setup(&[]);
    let workbook = FileWorkbook::connect(&s.config.workbook).unwrap();
    let (tx, rx) = command_channel();
    let mut program = Program::new(workbook, rx, s.config.program_config());
    program.startup();

    let t0 = Instant::now();
    assert!(tx.send(Command::Suspend));
    program.tick(t0);
    let doc: WorkbookDocument = read(&s.config.workbook);
    assert_eq!(doc.controls.get("CurrentMapSuspend"), Some(&true));
    assert!(doc.clicks.is_empty());

    program.tick(t0 + Duration::from_millis(100));
    let doc: WorkbookDocument = read(&s.config.workbook);
    assert_eq!(doc.clicks.len(), 1);
    assert_eq!(doc.clicks[0].window, "ExcelTradingAddIn");
    assert_eq!((doc.clicks[0].x, doc.clicks[0].y), (55, 280));
}

#[test]
fn exit_stops_headless_run() {
    let s = setup(&["--tick-ms=5"]);
    let workbook = FileWorkbook::connect(&s.config.workbook).unwrap();
    let (tx, rx) = command_channel();
    let mut program = Program::new(workbook, rx, s.config.program_config());
    assert!(tx.send(Command::Exit));
    program.run();
    assert!(!program.is_running());
}

#[test]
fn missing_workbook_fails_to_connect() {
    let dir = TempDir::new().unwrap();
    assert!(FileWorkbook::connect(dir.path().join("absent.json")).is_err());
}

// ============================================================================
// 3. Log output
// ============================================================================

proptest! {
    #[test]
    fn crlf_output_has_no_bare_newline(
        text in "[a-z\r\n]{0,64}",
        split in 0usize..64,
    ) {
        let bytes = text.as_bytes();
        let split = split.min(bytes.len());
        let mut writer = CrlfWriter::new(Vec::new());
        writer.write_all(&bytes[..split]).unwrap();
        writer.write_all(&bytes[split..]).unwrap();
        let out = writer.into_inner();

        for (i, &b) in out.iter().enumerate() {
            if b == b'\n' {
                prop_assert!(i > 0 && out[i - 1] == b'\r');
            }
        }
        let stripped: Vec<u8> = out.iter().copied().filter(|&b| b != b'\r').collect();
        let original: Vec<u8> = bytes.iter().copied().filter(|&b| b != b'\r').collect();
        prop_assert_eq!(stripped, original);
    }
}
