#![forbid(unsafe_code)]

//! Workbook backed by a JSON document on disk.
//!
//! A bridge process mirrors the live spreadsheet into this file and applies
//! the changes we write back. The controller only ever sees the document.
//!
//! # File Format
//!
//! ```json
//! {
//!   "name": "Trading.xlsm",
//!   "cells": { "C1": "LoL Bo3", "M44": 1.5, "N44": 2.6 },
//!   "namedRanges": { "ODDSHOME": [1.4, 1.5, 1.6], "ODDSAWAY": [3.0, 2.6, 2.4] },
//!   "controls": { "CurrentMapSuspend": false },
//!   "windows": ["ExcelTradingAddIn"],
//!   "interactive": false,
//!   "clicks": []
//! }
//! ```
//!
//! # Consistency
//!
//! The document is reloaded whenever its modification time changes. A reload
//! that fails to parse (the bridge mid-write without an atomic rename) keeps
//! the previous document. Our own writes go through [`AtomicJsonFile`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use oddsctl_core::CellValue;
use serde::{Deserialize, Serialize};

use crate::publish::{AtomicJsonFile, PublishError};
use crate::workbook::{WindowHandle, Workbook, WorkbookError, WorkbookResult};

/// A click posted through the file bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickRecord {
    pub window: String,
    pub x: i32,
    pub y: i32,
}

/// On-disk workbook document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkbookDocument {
    pub name: String,
    pub cells: BTreeMap<String, CellValue>,
    pub named_ranges: BTreeMap<String, Vec<CellValue>>,
    pub controls: BTreeMap<String, bool>,
    pub windows: Vec<String>,
    pub interactive: bool,
    pub clicks: Vec<ClickRecord>,
}

/// File-backed [`Workbook`].
#[derive(Debug)]
pub struct FileWorkbook {
    file: AtomicJsonFile,
    doc: WorkbookDocument,
    modified: Option<SystemTime>,
}

impl FileWorkbook {
    /// Open the document at `path`.
    ///
    /// # Errors
    ///
    /// `Connection` if the file is missing or unreadable; the controller
    /// cannot start without a workbook.
    pub fn connect(path: impl AsRef<Path>) -> WorkbookResult<Self> {
        let file = AtomicJsonFile::new(path);
        let doc = match file.read::<WorkbookDocument>() {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                return Err(WorkbookError::Connection(format!(
                    "no workbook at {}",
                    file.path().display()
                )));
            }
            Err(e) => {
                return Err(WorkbookError::Connection(format!(
                    "{}: {e}",
                    file.path().display()
                )));
            }
        };
        let modified = mtime(file.path());
        tracing::debug!(path = %file.path().display(), workbook = %doc.name, "workbook connected");
        Ok(Self {
            file,
            doc,
            modified,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    #[must_use]
    pub fn document(&self) -> &WorkbookDocument {
        &self.doc
    }

    fn refresh(&mut self) {
        let current = mtime(self.file.path());
        if current.is_none() || current == self.modified {
            return;
        }
        match self.file.read::<WorkbookDocument>() {
            Ok(Some(doc)) => {
                self.doc = doc;
                self.modified = current;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(error = %e, "workbook reload failed, keeping previous");
            }
        }
    }

    fn persist(&mut self) -> WorkbookResult<()> {
        self.file.write(&self.doc).map_err(|e| match e {
            PublishError::Io(io) => WorkbookError::Io(io),
            PublishError::Serialization(msg) => WorkbookError::Malformed(msg),
        })?;
        self.modified = mtime(self.file.path());
        Ok(())
    }

    fn window_title(&self, handle: WindowHandle) -> Option<&str> {
        let index = usize::try_from(handle.0).ok()?.checked_sub(1)?;
        self.doc.windows.get(index).map(String::as_str)
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl Workbook for FileWorkbook {
    fn name(&self) -> &str {
        if self.doc.name.is_empty() {
            "workbook"
        } else {
            &self.doc.name
        }
    }

    fn read_cell(&mut self, id: &str) -> WorkbookResult<CellValue> {
        self.refresh();
        Ok(self.doc.cells.get(id).cloned().unwrap_or_default())
    }

    fn write_cell(&mut self, id: &str, value: CellValue) -> WorkbookResult<()> {
        self.refresh();
        self.doc.cells.insert(id.to_string(), value);
        self.persist()
    }

    fn read_named_range(&mut self, name: &str) -> WorkbookResult<Vec<CellValue>> {
        self.refresh();
        self.doc
            .named_ranges
            .get(name)
            .cloned()
            .ok_or_else(|| WorkbookError::UnknownRange(name.to_string()))
    }

    fn invoke_named_control(&mut self, name: &str) -> WorkbookResult<()> {
        self.refresh();
        let state = self
            .doc
            .controls
            .get_mut(name)
            .ok_or_else(|| WorkbookError::UnknownControl(name.to_string()))?;
        *state = !*state;
        self.persist()
    }

    fn find_window(&mut self, title_fragment: &str) -> WorkbookResult<WindowHandle> {
        self.refresh();
        self.doc
            .windows
            .iter()
            .position(|title| title.contains(title_fragment))
            .map(|i| WindowHandle(i as u64 + 1))
            .ok_or_else(|| WorkbookError::WindowNotFound(title_fragment.to_string()))
    }

    fn post_ui_click(&mut self, window: WindowHandle, x: i32, y: i32) -> WorkbookResult<()> {
        self.refresh();
        let title = self
            .window_title(window)
            .ok_or_else(|| WorkbookError::WindowNotFound(format!("handle {}", window.0)))?
            .to_string();
        self.doc.clicks.push(ClickRecord { window: title, x, y });
        self.persist()
    }

    fn restore_interactivity(&mut self) -> WorkbookResult<()> {
        self.refresh();
        if self.doc.interactive {
            return Ok(());
        }
        self.doc.interactive = true;
        self.persist()
    }
}

/// Path helper for callers that want the default document name next to a
/// data directory.
#[must_use]
pub fn default_workbook_path(dir: &Path) -> PathBuf {
    dir.join("workbook.json")
}
