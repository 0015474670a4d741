#![forbid(unsafe_code)]

//! Change detection over the watched cells.
//!
//! The watcher keeps exactly one reference [`Snapshot`]: the last one that was
//! actually written to disk. Each poll captures a new snapshot and publishes
//! an [`ObservedState`] when:
//!
//! - nothing has been written yet (`initial: true`, full picture), or
//! - any watched cell differs from the last written snapshot, or
//! - the companion (input hook) status differs from the last written one.
//!
//! A failed write leaves the reference untouched, so the next poll carries
//! the same changes (plus any newer ones) and the UI never misses a diff.

use crate::companion::CompanionStatus;
use crate::publish::{AtomicJsonFile, ObservedState, PublishResult};
use crate::snapshot::{CellSchema, Snapshot, SnapshotDiff};
use crate::workbook::Workbook;

/// Polls the workbook and publishes observed state.
#[derive(Debug)]
pub struct StateWatcher {
    schema: CellSchema,
    output: AtomicJsonFile,
    published: Option<(Snapshot, CompanionStatus)>,
}

impl StateWatcher {
    #[must_use]
    pub fn new(schema: CellSchema, output: AtomicJsonFile) -> Self {
        Self {
            schema,
            output,
            published: None,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &CellSchema {
        &self.schema
    }

    /// Capture, compare, and publish if anything is worth telling the UI.
    ///
    /// Returns the published document, if one was written.
    pub fn poll<W: Workbook + ?Sized>(
        &mut self,
        workbook: &mut W,
        companion: CompanionStatus,
        ts: u64,
    ) -> PublishResult<Option<ObservedState>> {
        let snapshot = self.schema.capture(workbook);
        let Some(doc) = self.observe(&snapshot, &companion, ts) else {
            return Ok(None);
        };
        self.output.write(&doc)?;
        if let Some(maps) = &doc.maps_changed
            && !maps.is_empty()
        {
            tracing::debug!(maps = ?maps, "odds changed");
        }
        self.published = Some((snapshot, companion));
        Ok(Some(doc))
    }

    /// Document to publish for `snapshot`, relative to the last written one.
    #[must_use]
    pub fn observe(
        &self,
        snapshot: &Snapshot,
        companion: &CompanionStatus,
        ts: u64,
    ) -> Option<ObservedState> {
        let Some((published, published_companion)) = &self.published else {
            return Some(self.document(snapshot, companion.clone(), ts, None));
        };
        let diff = self.schema.diff(published, snapshot);
        if diff.is_empty() && published_companion == companion {
            return None;
        }
        Some(self.document(snapshot, companion.clone(), ts, Some(diff)))
    }

    fn document(
        &self,
        snapshot: &Snapshot,
        companion: CompanionStatus,
        ts: u64,
        diff: Option<SnapshotDiff>,
    ) -> ObservedState {
        let (team1_name, team2_name) = self.schema.team_names(snapshot);
        let initial = diff.is_none();
        let (changed, maps_changed, template_changed) = match diff {
            Some(diff) => (
                Some(diff.changed),
                Some(diff.maps_changed),
                diff.template_changed.then_some(true),
            ),
            None => (None, None, None),
        };
        ObservedState {
            ts,
            initial,
            cells: snapshot.cells.clone(),
            maps: self.schema.maps(snapshot),
            template: self.schema.template(snapshot),
            max_maps: self.schema.max_maps(snapshot),
            team1_name,
            team2_name,
            suspended: self.schema.suspended(snapshot),
            hotkey: companion,
            changed,
            maps_changed,
            template_changed,
        }
    }
}
