#![forbid(unsafe_code)]

//! Command dispatch against the workbook.
//!
//! The dispatcher turns one [`Command`] into at most one workbook mutation.
//! It runs only on the thread that owns the workbook.
//!
//! # Step Pipeline
//!
//! ```text
//! resolve map ─► read (home, away) ─► locked? ──yes──► Rejected(Blocked)
//!                                        │no
//!                                        ▼
//!                               debounce allows? ──no──► (silent skip)
//!                                        │yes
//!                                        ▼
//!                               ladder step ──err──► Rejected(Step)
//!                                        │ok
//!                                        ▼
//!                               write home cell ──► Stepped
//! ```
//!
//! # Guarantees
//!
//! - A step writes exactly one cell, the home odds of the resolved map.
//! - A locked map (WIN/LOSE on either side) is never written.
//! - Rejections never abort the loop; the caller logs them and moves on.

use std::fmt;

use oddsctl_core::{
    CellValue, Command, Direction, KeyHoldTracker, KeyId, MapLayout, MapRow, OddsLadder,
    OddsPair, StepError, is_locked, max_maps_for_template,
};

use crate::selection::SelectionTracker;
use crate::snapshot::CellSchema;
use crate::workbook::{Workbook, WorkbookError};

/// Names and coordinates used by the non-step actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionConfig {
    /// Named range holding the home odds ladder.
    pub home_range: String,
    /// Named range holding the away odds ladder (reported only).
    pub away_range: String,
    /// Toggle control that suspends the current map's market.
    pub suspend_control: String,
    /// Title fragment of the trading add-in's panel.
    pub addin_window: String,
    /// Window-relative position of the add-in's "Send Update" button.
    pub update_click: (i32, i32),
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            home_range: "ODDSHOME".into(),
            away_range: "ODDSAWAY".into(),
            suspend_control: "CurrentMapSuspend".into(),
            addin_window: "ExcelTradingAddIn".into(),
            update_click: (55, 280),
        }
    }
}

/// Why a command did nothing.
#[derive(Debug)]
pub enum Rejection {
    /// The map is settled (WIN/LOSE on a side).
    Blocked(OddsPair),
    /// The home cell could not be read.
    Unreadable { cell: String },
    /// The ladder refused the step.
    Step(StepError),
    /// The layout has no rows at all.
    NoRow,
    /// The home cell write failed.
    WriteFailed(WorkbookError),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Blocked(pair) => write!(f, "map locked ({pair})"),
            Rejection::Unreadable { cell } => write!(f, "could not read {cell}"),
            Rejection::Step(e) => write!(f, "{e}"),
            Rejection::NoRow => write!(f, "no map rows configured"),
            Rejection::WriteFailed(e) => write!(f, "write failed: {e}"),
        }
    }
}

/// Result of applying one command.
#[derive(Debug)]
pub enum Outcome {
    Stepped {
        map: u8,
        cell: String,
        direction: Direction,
        from: CellValue,
        to: CellValue,
        away: CellValue,
    },
    Rejected {
        map: u8,
        reason: Rejection,
    },
    Suspended,
    UpdateSent,
    ActionFailed {
        action: &'static str,
        error: WorkbookError,
    },
    Exit,
}

impl Outcome {
    /// Log the outcome at the level it deserves.
    pub fn report(&self) {
        match self {
            Outcome::Stepped {
                map,
                cell,
                direction,
                from,
                to,
                away,
            } => {
                let arrow = match direction {
                    Direction::Prev => "down",
                    Direction::Next => "up",
                };
                tracing::info!(map, %cell, %from, %to, %away, "home odds {arrow}");
            }
            Outcome::Rejected {
                map,
                reason: reason @ Rejection::Step(StepError::AtBoundary { .. }),
            } => {
                tracing::info!(map, "{reason}");
            }
            Outcome::Rejected { map, reason } => {
                tracing::warn!(map, "{reason}");
            }
            Outcome::Suspended => tracing::info!("current map suspend toggled"),
            Outcome::UpdateSent => tracing::info!("send update clicked"),
            Outcome::ActionFailed { action, error } => {
                tracing::warn!(action, %error, "action failed");
            }
            Outcome::Exit => tracing::info!("exit requested"),
        }
    }
}

/// Map, template and map count as resolved right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub map: u8,
    pub max_maps: u8,
    pub template: String,
}

/// What the controller sees at startup.
#[derive(Debug, Clone)]
pub struct StartupReport {
    pub workbook: String,
    pub selection: Selection,
    pub row: Option<MapRow>,
    pub pair: OddsPair,
    /// Every playable map's pair, in map order.
    pub maps: Vec<(u8, OddsPair)>,
    pub home_rungs: usize,
    pub away_rungs: Option<usize>,
}

impl StartupReport {
    pub fn log(&self) {
        tracing::info!(
            workbook = %self.workbook,
            template = %self.selection.template,
            max_maps = self.selection.max_maps,
            map = self.selection.map,
            "connected"
        );
        if let Some(row) = &self.row {
            tracing::info!(row = row.row, odds = %self.pair, "current map");
        }
        for (map, pair) in &self.maps {
            let marker = if is_locked(pair) { " [LOCKED]" } else { "" };
            tracing::info!("map {map}: {pair}{marker}");
        }
        tracing::info!(home = self.home_rungs, away = ?self.away_rungs, "odds ladders loaded");
        if is_locked(&self.pair) {
            tracing::warn!("current map is locked (WIN/LOSE)");
        }
    }
}

/// Applies commands to the workbook.
#[derive(Debug)]
pub struct Dispatcher {
    layout: MapLayout,
    template_cell: String,
    actions: ActionConfig,
    home_ladder: OddsLadder,
    holds: KeyHoldTracker,
    selection: SelectionTracker,
}

impl Dispatcher {
    #[must_use]
    pub fn new(schema: &CellSchema, actions: ActionConfig, selection: SelectionTracker) -> Self {
        Self {
            layout: schema.layout.clone(),
            template_cell: schema.template_cell.clone(),
            actions,
            home_ladder: OddsLadder::default(),
            holds: KeyHoldTracker::new(),
            selection,
        }
    }

    /// Load the home ladder from its named range.
    ///
    /// On failure the ladder stays as it was; steps then fail with
    /// `NotFound` until a reload succeeds.
    pub fn load_ladder<W: Workbook + ?Sized>(&mut self, workbook: &mut W) -> usize {
        match workbook.read_named_range(&self.actions.home_range) {
            Ok(values) => {
                self.home_ladder = OddsLadder::new(values);
                self.home_ladder.len()
            }
            Err(e) => {
                tracing::warn!(range = %self.actions.home_range, error = %e, "odds ladder unavailable");
                self.home_ladder.len()
            }
        }
    }

    #[must_use]
    pub fn ladder(&self) -> &OddsLadder {
        &self.home_ladder
    }

    #[must_use]
    pub fn holds(&self) -> &KeyHoldTracker {
        &self.holds
    }

    /// Read the template and the selection file.
    pub fn select<W: Workbook + ?Sized>(&mut self, workbook: &mut W) -> Selection {
        let template = workbook
            .read_cell(&self.template_cell)
            .ok()
            .and_then(|v| v.display_text())
            .unwrap_or_default();
        let max_maps = max_maps_for_template(&template);
        let map = self.selection.resolve(max_maps);
        Selection {
            map,
            max_maps,
            template,
        }
    }

    /// Apply one command. `None` means nothing happened and nothing needs
    /// reporting (a debounced repeat or a key release).
    pub fn apply<W: Workbook + ?Sized>(
        &mut self,
        workbook: &mut W,
        command: Command,
    ) -> Option<Outcome> {
        let _span = tracing::debug_span!("oddsctl.dispatch", cmd = command.name()).entered();
        match command {
            Command::StepPrev { key } => self.step(workbook, Direction::Prev, key),
            Command::StepNext { key } => self.step(workbook, Direction::Next, key),
            Command::Suspend => Some(self.suspend(workbook)),
            Command::PublishNow => Some(self.send_update(workbook)),
            Command::KeyReleased { key } => {
                if let Some(key) = key {
                    self.holds.on_release(key);
                }
                None
            }
            Command::Exit => Some(Outcome::Exit),
        }
    }

    fn step<W: Workbook + ?Sized>(
        &mut self,
        workbook: &mut W,
        direction: Direction,
        key: Option<KeyId>,
    ) -> Option<Outcome> {
        let selection = self.select(workbook);
        let Some(row) = self.layout.row_or_first(selection.map) else {
            return Some(Outcome::Rejected {
                map: selection.map,
                reason: Rejection::NoRow,
            });
        };
        let map = row.map;
        let rejected = |reason| Some(Outcome::Rejected { map, reason });

        let pair = workbook.read_pair(&row);
        if is_locked(&pair) {
            return rejected(Rejection::Blocked(pair));
        }
        if let Some(key) = key
            && !self.holds.on_press(key, &pair).is_allowed()
        {
            return None;
        }
        if pair.home.is_empty() {
            return rejected(Rejection::Unreadable {
                cell: row.home_cell,
            });
        }

        let target = match self.home_ladder.step(&pair.home, direction) {
            Ok(target) => target,
            Err(e) => return rejected(Rejection::Step(e)),
        };
        if let Err(e) = workbook.write_cell(&row.home_cell, target.value.clone()) {
            return rejected(Rejection::WriteFailed(e));
        }

        let away = workbook.read_cell(&row.away_cell).unwrap_or_default();
        Some(Outcome::Stepped {
            map,
            cell: row.home_cell,
            direction,
            from: pair.home,
            to: target.value,
            away,
        })
    }

    fn suspend<W: Workbook + ?Sized>(&mut self, workbook: &mut W) -> Outcome {
        match workbook.invoke_named_control(&self.actions.suspend_control) {
            Ok(()) => Outcome::Suspended,
            Err(error) => Outcome::ActionFailed {
                action: "suspend",
                error,
            },
        }
    }

    fn send_update<W: Workbook + ?Sized>(&mut self, workbook: &mut W) -> Outcome {
        let (x, y) = self.actions.update_click;
        let result = workbook
            .find_window(&self.actions.addin_window)
            .and_then(|window| workbook.post_ui_click(window, x, y));
        match result {
            Ok(()) => Outcome::UpdateSent,
            Err(error) => Outcome::ActionFailed {
                action: "send_update",
                error,
            },
        }
    }

    /// Gather the startup picture (loads the ladder as a side effect).
    pub fn startup_report<W: Workbook + ?Sized>(&mut self, workbook: &mut W) -> StartupReport {
        let home_rungs = self.load_ladder(workbook);
        let away_rungs = workbook
            .read_named_range(&self.actions.away_range)
            .ok()
            .map(|values| values.iter().filter(|v| !v.is_empty()).count());
        let selection = self.select(workbook);
        let row = self.layout.row_or_first(selection.map);
        let pair = row
            .as_ref()
            .map(|row| workbook.read_pair(row))
            .unwrap_or_default();
        let maps = self
            .layout
            .rows()
            .filter(|row| row.map <= selection.max_maps)
            .map(|row| (row.map, workbook.read_pair(&row)))
            .collect();
        StartupReport {
            workbook: workbook.name().to_string(),
            selection,
            row,
            pair,
            maps,
            home_rungs,
            away_rungs,
        }
    }
}
