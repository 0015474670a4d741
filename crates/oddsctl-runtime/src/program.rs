#![forbid(unsafe_code)]

//! The controller loop.
//!
//! One thread owns the workbook and runs [`Program::run`]. Each tick:
//!
//! 1. Drain due deferred commands, then everything queued by the hook.
//! 2. Dispatch each command in arrival order; `Exit` stops the loop after
//!    the drain completes.
//! 3. Check the shutdown signal.
//! 4. Poll the state watcher if its interval elapsed.
//! 5. Publish the status heartbeat if its interval elapsed.
//!
//! The hook thread never touches the workbook; it only enqueues.
//!
//! # Determinism
//!
//! [`Program::tick`] takes the current instant as an argument, so tests can
//! drive the loop without sleeping.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use oddsctl_core::{Command, CommandReceiver};

use crate::companion::SharedCompanionStatus;
use crate::dispatcher::{ActionConfig, Dispatcher, Outcome, StartupReport};
use crate::publish::{AtomicJsonFile, PublishResult, StatusDocument, unix_millis};
use crate::selection::SelectionTracker;
use crate::session::{ShutdownSignal, WorkbookSession};
use crate::snapshot::CellSchema;
use crate::watcher::StateWatcher;
use crate::workbook::{Workbook, WorkbookResult};

/// Loop timing, file locations and workbook names.
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    pub tick: Duration,
    pub status_interval: Duration,
    pub watch_interval: Duration,
    /// Delay between a suspend toggle and the follow-up "Send Update".
    pub suspend_follow_up: Duration,
    pub status_path: PathBuf,
    pub state_path: PathBuf,
    pub selection_path: PathBuf,
    pub schema: CellSchema,
    pub actions: ActionConfig,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(50),
            status_interval: Duration::from_secs(1),
            watch_interval: Duration::from_millis(100),
            suspend_follow_up: Duration::from_millis(100),
            status_path: PathBuf::from("hotkey_status.json"),
            state_path: PathBuf::from("current_state.json"),
            selection_path: PathBuf::from("template_sync.json"),
            schema: CellSchema::default(),
            actions: ActionConfig::default(),
        }
    }
}

impl ProgramConfig {
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    #[must_use]
    pub fn with_status_interval(mut self, interval: Duration) -> Self {
        self.status_interval = interval;
        self
    }

    #[must_use]
    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    #[must_use]
    pub fn with_suspend_follow_up(mut self, delay: Duration) -> Self {
        self.suspend_follow_up = delay;
        self
    }

    /// Put all three shared files in `dir` under their default names.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        self.status_path = dir.join("hotkey_status.json");
        self.state_path = dir.join("current_state.json");
        self.selection_path = dir.join("template_sync.json");
        self
    }

    #[must_use]
    pub fn with_schema(mut self, schema: CellSchema) -> Self {
        self.schema = schema;
        self
    }

    #[must_use]
    pub fn with_actions(mut self, actions: ActionConfig) -> Self {
        self.actions = actions;
        self
    }
}

/// The controller: workbook session, dispatcher, watcher, and timers.
pub struct Program<W: Workbook> {
    config: ProgramConfig,
    session: WorkbookSession<W>,
    dispatcher: Dispatcher,
    watcher: StateWatcher,
    status_file: AtomicJsonFile,
    commands: CommandReceiver,
    shutdown: ShutdownSignal,
    companion: SharedCompanionStatus,
    deferred: Vec<(Instant, Command)>,
    next_watch: Option<Instant>,
    next_status: Option<Instant>,
    running: bool,
    inputs_closed: bool,
}

impl<W: Workbook> Program<W> {
    /// Take ownership of a connected workbook.
    #[must_use]
    pub fn new(workbook: W, commands: CommandReceiver, config: ProgramConfig) -> Self {
        let dispatcher = Dispatcher::new(
            &config.schema,
            config.actions.clone(),
            SelectionTracker::new(&config.selection_path),
        );
        let watcher = StateWatcher::new(
            config.schema.clone(),
            AtomicJsonFile::new(&config.state_path),
        );
        Self {
            status_file: AtomicJsonFile::new(&config.status_path),
            session: WorkbookSession::new(workbook),
            dispatcher,
            watcher,
            commands,
            shutdown: ShutdownSignal::new(),
            companion: SharedCompanionStatus::default(),
            deferred: Vec::new(),
            next_watch: None,
            next_status: None,
            running: true,
            inputs_closed: false,
            config,
        }
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    #[must_use]
    pub fn with_companion(mut self, companion: SharedCompanionStatus) -> Self {
        self.companion = companion;
        self
    }

    /// Whether every command sender has been dropped.
    #[must_use]
    pub fn inputs_closed(&self) -> bool {
        self.inputs_closed
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub fn workbook(&self) -> &W {
        &self.session
    }

    pub fn workbook_mut(&mut self) -> &mut W {
        &mut self.session
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    /// Load the ladder and log what the controller sees.
    pub fn startup(&mut self) -> StartupReport {
        let report = self.dispatcher.startup_report(&mut *self.session);
        report.log();
        report
    }

    /// Run one iteration of the loop at `now`.
    pub fn tick(&mut self, now: Instant) {
        let _span = tracing::trace_span!("oddsctl.program.tick").entered();

        let mut batch = self.take_due(now);
        batch.extend(self.commands.drain());
        for command in batch {
            self.handle(command, now);
        }
        if self.commands.is_disconnected() && !self.inputs_closed {
            self.inputs_closed = true;
            tracing::info!("no command senders left, watching only");
        }

        if self.shutdown.is_triggered() && self.running {
            tracing::info!("shutdown signal, stopping");
            self.running = false;
        }

        if self.next_watch.is_none_or(|due| now >= due) {
            self.poll_watcher();
            self.next_watch = Some(now + self.config.watch_interval);
        }

        if self.next_status.is_none_or(|due| now >= due) {
            if let Err(e) = self.publish_status(true) {
                tracing::warn!(error = %e, "status publish failed");
            }
            self.next_status = Some(now + self.config.status_interval);
        }
    }

    /// Tick until exit, sleeping out the rest of each tick.
    pub fn run(&mut self) {
        let _span = tracing::info_span!("oddsctl.program.run").entered();
        tracing::info!(
            tick_ms = self.config.tick.as_millis() as u64,
            workbook = self.session.name(),
            "controller running"
        );
        while self.running {
            let started = Instant::now();
            self.tick(started);
            if let Some(rest) = self.config.tick.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
    }

    /// Publish a final `connected: false` heartbeat and restore the workbook.
    ///
    /// # Errors
    ///
    /// Returns the restore error.
    pub fn finish(&mut self) -> WorkbookResult<()> {
        if let Err(e) = self.publish_status(false) {
            tracing::warn!(error = %e, "final status publish failed");
        }
        self.session.close()
    }

    fn take_due(&mut self, now: Instant) -> Vec<Command> {
        if self.deferred.is_empty() {
            return Vec::new();
        }
        self.deferred.sort_by_key(|(due, _)| *due);
        let split = self.deferred.partition_point(|(due, _)| *due <= now);
        self.deferred.drain(..split).map(|(_, cmd)| cmd).collect()
    }

    fn handle(&mut self, command: Command, now: Instant) {
        let Some(outcome) = self.dispatcher.apply(&mut *self.session, command) else {
            return;
        };
        outcome.report();
        match outcome {
            Outcome::Suspended => {
                self.deferred
                    .push((now + self.config.suspend_follow_up, Command::PublishNow));
            }
            Outcome::Exit => self.running = false,
            _ => {}
        }
    }

    fn poll_watcher(&mut self) {
        let companion = self.companion.get();
        if let Err(e) = self
            .watcher
            .poll(&mut *self.session, companion, unix_millis())
        {
            tracing::warn!(error = %e, "state publish failed");
        }
    }

    fn publish_status(&mut self, connected: bool) -> PublishResult<()> {
        let selection = self.dispatcher.select(&mut *self.session);
        self.status_file.write(&StatusDocument {
            ts: unix_millis(),
            current_map: selection.map,
            max_maps: selection.max_maps,
            connected,
            template: selection.template,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workbook::MemoryWorkbook;
    use oddsctl_core::command_channel;
    use tempfile::TempDir;

    #[test]
    fn config_builders() {
        let config = ProgramConfig::default()
            .with_tick(Duration::from_millis(10))
            .with_data_dir("/tmp/odds");
        assert_eq!(config.tick, Duration::from_millis(10));
        assert_eq!(
            config.selection_path,
            PathBuf::from("/tmp/odds/template_sync.json")
        );
        assert_eq!(config.status_interval, Duration::from_secs(1));
    }

    #[test]
    fn deferred_commands_fire_in_due_order() {
        let dir = TempDir::new().unwrap();
        let (_tx, rx) = command_channel();
        let mut program = Program::new(
            MemoryWorkbook::default(),
            rx,
            ProgramConfig::default().with_data_dir(dir.path()),
        );
        let t0 = Instant::now();
        program
            .deferred
            .push((t0 + Duration::from_millis(200), Command::Exit));
        program
            .deferred
            .push((t0 + Duration::from_millis(100), Command::PublishNow));

        assert!(program.take_due(t0).is_empty());
        assert_eq!(
            program.take_due(t0 + Duration::from_millis(150)),
            vec![Command::PublishNow]
        );
        assert_eq!(
            program.take_due(t0 + Duration::from_millis(500)),
            vec![Command::Exit]
        );
        assert!(program.deferred.is_empty());
    }
}
