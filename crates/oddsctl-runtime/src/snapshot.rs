#![forbid(unsafe_code)]

//! Watched-cell snapshots and their diffs.

use std::collections::BTreeMap;

use oddsctl_core::{CellValue, MapLayout, max_maps_for_template};

use crate::publish::MapView;
use crate::workbook::Workbook;

const DEFAULT_TEAM1: &str = "Team 1";
const DEFAULT_TEAM2: &str = "Team 2";
const SUSPENDED_MARKERS: [&str; 4] = ["suspend", "closed", "halt", "pause"];

/// Which cells the watcher reads, and what they mean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSchema {
    pub template_cell: String,
    pub status_cell: String,
    pub team1_cell: String,
    pub team2_cell: String,
    pub layout: MapLayout,
}

impl Default for CellSchema {
    fn default() -> Self {
        Self {
            template_cell: "C1".into(),
            status_cell: "C6".into(),
            team1_cell: "K4".into(),
            team2_cell: "N4".into(),
            layout: MapLayout::default(),
        }
    }
}

impl CellSchema {
    /// Every watched cell id: template, status, team names, then each map's
    /// home and away cells.
    #[must_use]
    pub fn cells(&self) -> Vec<String> {
        let mut ids = vec![
            self.template_cell.clone(),
            self.status_cell.clone(),
            self.team1_cell.clone(),
            self.team2_cell.clone(),
        ];
        for row in self.layout.rows() {
            ids.push(row.home_cell);
            ids.push(row.away_cell);
        }
        ids
    }

    /// Read all watched cells in one batch.
    pub fn capture<W: Workbook + ?Sized>(&self, workbook: &mut W) -> Snapshot {
        Snapshot {
            cells: workbook.read_cells(&self.cells()),
        }
    }

    fn text(&self, snapshot: &Snapshot, id: &str) -> Option<String> {
        snapshot.cells.get(id).and_then(CellValue::display_text)
    }

    #[must_use]
    pub fn template(&self, snapshot: &Snapshot) -> String {
        self.text(snapshot, &self.template_cell).unwrap_or_default()
    }

    #[must_use]
    pub fn max_maps(&self, snapshot: &Snapshot) -> u8 {
        max_maps_for_template(&self.template(snapshot))
    }

    #[must_use]
    pub fn team_names(&self, snapshot: &Snapshot) -> (String, String) {
        (
            self.text(snapshot, &self.team1_cell)
                .unwrap_or_else(|| DEFAULT_TEAM1.to_string()),
            self.text(snapshot, &self.team2_cell)
                .unwrap_or_else(|| DEFAULT_TEAM2.to_string()),
        )
    }

    /// True when the market status cell reads like a halted market.
    #[must_use]
    pub fn suspended(&self, snapshot: &Snapshot) -> bool {
        self.text(snapshot, &self.status_cell)
            .map(|s| s.to_lowercase())
            .is_some_and(|s| SUSPENDED_MARKERS.iter().any(|m| s.contains(m)))
    }

    /// Per-map odds keyed by map number (as a string, for JSON).
    #[must_use]
    pub fn maps(&self, snapshot: &Snapshot) -> BTreeMap<String, MapView> {
        self.layout
            .rows()
            .map(|row| {
                let view = MapView {
                    side1: snapshot.value(&row.home_cell),
                    side2: snapshot.value(&row.away_cell),
                    side1_cell: row.home_cell,
                    side2_cell: row.away_cell,
                };
                (row.map.to_string(), view)
            })
            .collect()
    }

    /// Compare two snapshots.
    #[must_use]
    pub fn diff(&self, previous: &Snapshot, current: &Snapshot) -> SnapshotDiff {
        let changed: BTreeMap<String, CellValue> = current
            .cells
            .iter()
            .filter(|(id, value)| previous.cells.get(*id) != Some(*value))
            .map(|(id, value)| (id.clone(), value.clone()))
            .collect();

        let maps_changed = self
            .layout
            .rows()
            .filter(|row| changed.contains_key(&row.home_cell) || changed.contains_key(&row.away_cell))
            .map(|row| row.map)
            .collect();

        SnapshotDiff {
            template_changed: changed.contains_key(&self.template_cell),
            changed,
            maps_changed,
        }
    }
}

/// Values of every watched cell at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub cells: BTreeMap<String, CellValue>,
}

impl Snapshot {
    #[must_use]
    pub fn value(&self, id: &str) -> CellValue {
        self.cells.get(id).cloned().unwrap_or_default()
    }
}

/// What changed between two snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotDiff {
    pub changed: BTreeMap<String, CellValue>,
    pub maps_changed: Vec<u8>,
    pub template_changed: bool,
}

impl SnapshotDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}
