#![forbid(unsafe_code)]

//! Atomic JSON publication and the documents the controller publishes.
//!
//! Two documents leave this process:
//!
//! - [`StatusDocument`]: controller heartbeat (`hotkey_status.json`).
//! - [`ObservedState`]: snapshot/diff of watched cells (`current_state.json`).
//!
//! Both are consumed by a UI process that may read at any moment, so every
//! write goes through [`AtomicJsonFile`].
//!
//! # Atomic Writes
//!
//! 1. Write to `{path}.tmp`
//! 2. Flush and sync
//! 3. Rename `{path}.tmp` -> `{path}`
//!
//! A reader therefore sees either the previous complete document or the new
//! complete document, never a torn one.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use oddsctl_core::CellValue;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::companion::CompanionStatus;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from publishing or loading a JSON document.
#[derive(Debug)]
pub enum PublishError {
    /// I/O error during file operations.
    Io(std::io::Error),
    /// Serialization or deserialization error.
    Serialization(String),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Io(e) => write!(f, "I/O error: {e}"),
            PublishError::Serialization(msg) => write!(f, "serialization error: {msg}"),
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::Io(e) => Some(e),
            PublishError::Serialization(_) => None,
        }
    }
}

impl From<std::io::Error> for PublishError {
    fn from(e: std::io::Error) -> Self {
        PublishError::Io(e)
    }
}

/// Result type for publish operations.
pub type PublishResult<T> = Result<T, PublishError>;

// ─────────────────────────────────────────────────────────────────────────────
// Atomic File
// ─────────────────────────────────────────────────────────────────────────────

/// A JSON file replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct AtomicJsonFile {
    path: PathBuf,
}

impl AtomicJsonFile {
    /// The file does not need to exist; it is created on first write.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling temp file used for the write-then-rename.
    #[must_use]
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Serialize `doc` and atomically replace the file with it.
    pub fn write<T: Serialize + ?Sized>(&self, doc: &T) -> PublishResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.temp_path();
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, doc)
                .map_err(|e| PublishError::Serialization(format!("failed to serialize: {e}")))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        tracing::trace!(path = %self.path.display(), "published");
        Ok(())
    }

    /// Load the file. A missing file is `Ok(None)`.
    pub fn read<T: DeserializeOwned>(&self) -> PublishResult<Option<T>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_reader(BufReader::new(file))
            .map(Some)
            .map_err(|e| PublishError::Serialization(format!("failed to parse: {e}")))
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Documents
// ─────────────────────────────────────────────────────────────────────────────

/// Controller heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDocument {
    pub ts: u64,
    pub current_map: u8,
    pub max_maps: u8,
    pub connected: bool,
    pub template: String,
}

/// One map's odds cells as seen by the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub side1_cell: String,
    pub side2_cell: String,
    pub side1: CellValue,
    pub side2: CellValue,
}

/// Published snapshot of the watched cells.
///
/// The first document after startup has `initial: true` and no change
/// fields. Later documents carry the changed cells and the maps they touch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservedState {
    pub ts: u64,
    pub initial: bool,
    pub cells: BTreeMap<String, CellValue>,
    pub maps: BTreeMap<String, MapView>,
    pub template: String,
    pub max_maps: u8,
    pub team1_name: String,
    pub team2_name: String,
    pub suspended: bool,
    pub hotkey: CompanionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed: Option<BTreeMap<String, CellValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps_changed: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_changed: Option<bool>,
}
