//! Program loop end-to-end tests.
//!
//! Drives [`Program::tick`] with explicit instants against a
//! [`MemoryWorkbook`] and a temp data directory.
//!
//! # Running Tests
//!
//! ```sh
//! cargo test -p oddsctl-runtime --test program_loop
//! ```
//!
//! # Invariants
//!
//! 1. **Single write per step**: an accepted step writes only the home cell.
//! 2. **Lock wins**: a WIN/LOSE pair is never written, whatever the hold state.
//! 3. **Debounce**: a held key steps once per observed value change.
//! 4. **Suspend follow-up**: suspend is followed by a Send Update click.
//! 5. **Heartbeat**: the status file is rewritten every status interval.
//! 6. **Exit**: the loop stops after the drain that saw `Exit`.

#![cfg(test)]

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use oddsctl_core::{CellValue, Command, CommandSender, KeyId, OddsPair, command_channel};
use oddsctl_runtime::{
    AtomicJsonFile, CompanionStatus, MemoryWorkbook, ObservedState, Program, ProgramConfig,
    SharedCompanionStatus, ShutdownSignal, StatusDocument,
};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

const MS: Duration = Duration::from_millis(1);

fn workbook() -> MemoryWorkbook {
    MemoryWorkbook::new("Trading.xlsm")
        .with_cell("C1", "LoL Bo3")
        .with_cell("C6", "Open")
        .with_cell("K4", "Red")
        .with_cell("N4", "Blue")
        .with_cell("M44", 1.6)
        .with_cell("N44", 2.0)
        .with_cell("M190", 1.5)
        .with_cell("N190", 2.1)
        .with_range(
            "ODDSHOME",
            [1.5, 1.6, 1.7].into_iter().map(CellValue::from),
        )
        .with_range("ODDSAWAY", [2.2, 2.0, 1.9].into_iter().map(CellValue::from))
        .with_control("CurrentMapSuspend", false)
        .with_window("ExcelTradingAddIn")
}

struct Harness {
    _dir: TempDir,
    program: Program<MemoryWorkbook>,
    tx: CommandSender,
    t0: Instant,
    dir: std::path::PathBuf,
}

impl Harness {
    fn new(wb: MemoryWorkbook) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();
        let (tx, rx) = command_channel();
        let mut program = Program::new(wb, rx, ProgramConfig::default().with_data_dir(&path));
        program.startup();
        Self {
            _dir: dir,
            program,
            tx,
            t0: Instant::now(),
            dir: path,
        }
    }

    fn send(&self, commands: &[Command]) {
        for &command in commands {
            assert!(self.tx.send(command));
        }
    }

    fn tick_at(&mut self, ms: u64) {
        self.program.tick(self.t0 + MS * ms as u32);
    }

    fn select(&self, map: u8) {
        fs::write(
            self.dir.join("template_sync.json"),
            format!(r#"{{"map": {map}}}"#),
        )
        .unwrap();
    }

    fn status(&self) -> StatusDocument {
        read(&self.dir.join("hotkey_status.json"))
    }

    fn state(&self) -> ObservedState {
        read(&self.dir.join("current_state.json"))
    }

    fn home(&self, cell: &str) -> CellValue {
        self.program.workbook().cell(cell)
    }
}

fn read<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    AtomicJsonFile::new(path).read().unwrap().unwrap()
}

fn prev(key: Option<KeyId>) -> Command {
    Command::StepPrev { key }
}

fn next(key: Option<KeyId>) -> Command {
    Command::StepNext { key }
}

// ============================================================================
// 1. Stepping
// ============================================================================

#[test]
fn step_prev_moves_one_rung_down() {
    let mut h = Harness::new(workbook());
    h.send(&[prev(None)]);
    h.tick_at(0);
    assert_eq!(h.home("M44"), CellValue::from(1.5));
    assert_eq!(
        h.program.workbook().writes(),
        &[("M44".to_string(), CellValue::from(1.5))]
    );
}

#[test]
fn step_prev_at_bottom_is_rejected() {
    let mut h = Harness::new(workbook().with_cell("M44", 1.5));
    h.send(&[prev(None)]);
    h.tick_at(0);
    assert_eq!(h.home("M44"), CellValue::from(1.5));
    assert!(h.program.workbook().writes().is_empty());
}

#[test]
fn step_follows_selection_file() {
    let mut h = Harness::new(workbook());
    h.select(2);
    h.send(&[next(None)]);
    h.tick_at(0);
    assert_eq!(h.home("M190"), CellValue::from(1.6));
    assert_eq!(h.home("M44"), CellValue::from(1.6));
}

#[test]
fn out_of_range_selection_keeps_last_good_map() {
    let mut h = Harness::new(workbook());
    h.select(2);
    h.tick_at(0);
    // Bo3 template: map 4 is not playable.
    h.select(4);
    h.send(&[next(None)]);
    h.tick_at(50);
    assert_eq!(h.home("M190"), CellValue::from(1.6));
}

// ============================================================================
// 2. Lock
// ============================================================================

#[test]
fn locked_row_is_never_written() {
    let mut h = Harness::new(workbook().with_cell("M44", "WIN").with_cell("N44", 2.1));
    let key = Some(KeyId::NumpadPlus);
    h.send(&[next(key), next(key), Command::KeyReleased { key }, prev(None)]);
    h.tick_at(0);
    assert!(h.program.workbook().writes().is_empty());
    assert_eq!(h.home("M44"), CellValue::from("WIN"));
}

#[test]
fn lowercase_sentinel_on_away_side_locks() {
    let mut h = Harness::new(workbook().with_cell("N44", " lose "));
    h.send(&[next(None)]);
    h.tick_at(0);
    assert!(h.program.workbook().writes().is_empty());
}

// ============================================================================
// 3. Debounce
// ============================================================================

#[test]
fn held_key_steps_once_per_external_change() {
    // Home starts at the top of the ladder, so an allowed press changes nothing.
    let mut h = Harness::new(workbook().with_cell("M44", 1.7));
    let key = Some(KeyId::NumpadPlus);
    let plus = KeyId::NumpadPlus;

    h.send(&[next(key), next(key), next(key)]);
    h.tick_at(0);
    assert!(h.program.workbook().writes().is_empty());
    let state = h.program.dispatcher().holds().state(plus).unwrap().clone();
    assert_eq!(state.last_snapshot, OddsPair::new(1.7, 2.0));
    assert!(state.pending);

    // Someone moves the odds: the held key gets exactly one more step.
    h.program.workbook_mut().set_cell("M44", 1.5);
    h.send(&[next(key)]);
    h.tick_at(50);
    assert_eq!(h.home("M44"), CellValue::from(1.6));
    assert_eq!(
        h.program.dispatcher().holds().state(plus).unwrap().last_snapshot,
        OddsPair::new(1.5, 2.0)
    );

    // Release then press again: a fresh press is always allowed.
    h.send(&[Command::KeyReleased { key }]);
    h.tick_at(100);
    assert!(!h.program.dispatcher().holds().state(plus).unwrap().pending);
    h.send(&[next(key)]);
    h.tick_at(150);
    assert_eq!(h.home("M44"), CellValue::from(1.7));
}

#[test]
fn different_keys_are_tracked_independently() {
    let mut h = Harness::new(workbook());
    h.send(&[
        next(Some(KeyId::NumpadPlus)),
        next(Some(KeyId::F(24))),
    ]);
    h.tick_at(0);
    // 1.6 -> 1.7 by num_plus; f24 then sees 1.7 at the top.
    assert_eq!(h.home("M44"), CellValue::from(1.7));
    assert_eq!(h.program.dispatcher().holds().tracked_keys(), 2);
}

// ============================================================================
// 4. Suspend / Send Update
// ============================================================================

#[test]
fn suspend_schedules_send_update() {
    let mut h = Harness::new(workbook());
    h.send(&[Command::Suspend]);
    h.tick_at(0);
    assert_eq!(h.program.workbook().control("CurrentMapSuspend"), Some(true));
    assert!(h.program.workbook().clicks().is_empty());

    h.tick_at(50);
    assert!(h.program.workbook().clicks().is_empty());

    h.tick_at(100);
    let clicks = h.program.workbook().clicks();
    assert_eq!(clicks.len(), 1);
    assert_eq!((clicks[0].x, clicks[0].y), (55, 280));
}

#[test]
fn publish_now_clicks_immediately() {
    let mut h = Harness::new(workbook());
    h.send(&[Command::PublishNow]);
    h.tick_at(0);
    assert_eq!(h.program.workbook().clicks().len(), 1);
}

#[test]
fn failed_suspend_schedules_nothing() {
    let mut h = Harness::new(MemoryWorkbook::new("bare").with_window("ExcelTradingAddIn"));
    h.send(&[Command::Suspend]);
    h.tick_at(0);
    h.tick_at(200);
    assert!(h.program.workbook().clicks().is_empty());
}

// ============================================================================
// 5. Publication
// ============================================================================

#[test]
fn status_heartbeat_follows_interval() {
    let mut h = Harness::new(workbook());
    h.tick_at(0);
    let first = h.status();
    assert_eq!(first.current_map, 1);
    assert_eq!(first.max_maps, 3);
    assert_eq!(first.template, "LoL Bo3");
    assert!(first.connected);

    h.select(3);
    h.tick_at(500);
    assert_eq!(h.status().current_map, 1);
    h.tick_at(1000);
    assert_eq!(h.status().current_map, 3);
}

#[test]
fn observed_state_initial_then_diff() {
    let mut h = Harness::new(workbook());
    h.tick_at(0);
    let initial = h.state();
    assert!(initial.initial);
    assert_eq!(initial.team1_name, "Red");
    assert_eq!(initial.maps["1"].side1, CellValue::from(1.6));
    assert!(!initial.suspended);

    h.send(&[next(None)]);
    h.tick_at(100);
    let diff = h.state();
    assert!(!diff.initial);
    assert_eq!(diff.maps_changed, Some(vec![1]));
    assert_eq!(diff.maps["1"].side1, CellValue::from(1.7));

    h.program.workbook_mut().set_cell("C6", "SUSPENDED");
    h.tick_at(200);
    assert!(h.state().suspended);
}

#[test]
fn companion_status_is_published() {
    let dir = TempDir::new().unwrap();
    let (_tx, rx) = command_channel();
    let companion = SharedCompanionStatus::default();
    let mut program = Program::new(
        workbook(),
        rx,
        ProgramConfig::default().with_data_dir(dir.path()),
    )
    .with_companion(companion.clone());
    let t0 = Instant::now();
    program.tick(t0);

    companion.set(CompanionStatus::running_here());
    program.tick(t0 + MS * 100);
    let state: ObservedState = read(&dir.path().join("current_state.json"));
    assert!(state.hotkey.running);
    assert_eq!(state.changed.map(|c| c.len()), Some(0));
}

// ============================================================================
// 6. Shutdown
// ============================================================================

#[test]
fn exit_stops_after_drain() {
    let mut h = Harness::new(workbook());
    h.send(&[Command::Exit, next(None)]);
    h.tick_at(0);
    assert!(!h.program.is_running());
    // The step queued behind Exit in the same drain still ran.
    assert_eq!(h.home("M44"), CellValue::from(1.7));
}

#[test]
fn shutdown_signal_stops_loop() {
    let dir = TempDir::new().unwrap();
    let (_tx, rx) = command_channel();
    let shutdown = ShutdownSignal::new();
    let mut program = Program::new(
        workbook(),
        rx,
        ProgramConfig::default().with_data_dir(dir.path()),
    )
    .with_shutdown(shutdown.clone());
    program.tick(Instant::now());
    assert!(program.is_running());
    shutdown.trigger();
    program.tick(Instant::now());
    assert!(!program.is_running());
}

#[test]
fn run_returns_on_exit_and_finish_restores() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = command_channel();
    let mut program = Program::new(
        workbook(),
        rx,
        ProgramConfig::default()
            .with_data_dir(dir.path())
            .with_tick(Duration::from_millis(5)),
    );
    tx.send(Command::Exit);
    program.run();
    program.finish().unwrap();

    assert!(program.workbook().is_interactive());
    let status: StatusDocument = read(&dir.path().join("hotkey_status.json"));
    assert!(!status.connected);
}

#[test]
fn dropped_sender_does_not_stop_loop() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = command_channel();
    drop(tx);
    let mut program = Program::new(
        workbook(),
        rx,
        ProgramConfig::default().with_data_dir(dir.path()),
    );
    program.tick(Instant::now());
    assert!(program.is_running());
    assert!(program.inputs_closed());
}
