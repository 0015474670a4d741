#![forbid(unsafe_code)]

//! Current-map selection, shared with the UI through a small JSON file.
//!
//! The UI writes `{"map": N}` whenever the user picks a map. The controller
//! reads it before every command and on every heartbeat. A selection that
//! cannot be used (missing file, bad JSON, out of range) falls back to the
//! last index that was valid, which starts at 1.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Why the selection file could not be used.
#[derive(Debug)]
pub enum SelectionError {
    /// The file does not exist (yet).
    Missing,
    /// The file exists but could not be read.
    Io(std::io::Error),
    /// Not a JSON object, or a `map` field that is not an integer.
    Malformed(String),
    /// A well-formed index outside `1..=max_maps`.
    OutOfRange { map: i64, max_maps: u8 },
}

impl SelectionError {
    /// Stable discriminator for "same error as last time" checks.
    const fn kind(&self) -> u8 {
        match self {
            SelectionError::Missing => 0,
            SelectionError::Io(_) => 1,
            SelectionError::Malformed(_) => 2,
            SelectionError::OutOfRange { .. } => 3,
        }
    }
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::Missing => write!(f, "selection file missing"),
            SelectionError::Io(e) => write!(f, "I/O error: {e}"),
            SelectionError::Malformed(msg) => write!(f, "malformed selection: {msg}"),
            SelectionError::OutOfRange { map, max_maps } => {
                write!(f, "map {map} outside 1..={max_maps}")
            }
        }
    }
}

impl std::error::Error for SelectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SelectionError::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// Reads the selection file and remembers the last good index.
#[derive(Debug)]
pub struct SelectionTracker {
    path: PathBuf,
    last_good: u8,
    last_error: Option<u8>,
}

impl SelectionTracker {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            last_good: 1,
            last_error: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last index that passed validation.
    #[must_use]
    pub fn last_good(&self) -> u8 {
        self.last_good
    }

    /// Read and validate the selection without touching the fallback.
    pub fn read(&self, max_maps: u8) -> Result<u8, SelectionError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SelectionError::Missing);
            }
            Err(e) => return Err(SelectionError::Io(e)),
        };
        let doc: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| SelectionError::Malformed(e.to_string()))?;
        let fields = doc
            .as_object()
            .ok_or_else(|| SelectionError::Malformed("not a JSON object".into()))?;
        // A document without `map` selects the first map.
        let map = match fields.get("map") {
            None => 1,
            Some(value) => value
                .as_i64()
                .ok_or_else(|| SelectionError::Malformed("\"map\" is not an integer".into()))?,
        };
        match u8::try_from(map) {
            Ok(m) if (1..=max_maps).contains(&m) => Ok(m),
            _ => Err(SelectionError::OutOfRange { map, max_maps }),
        }
    }

    /// Current map index, falling back to the last good one.
    ///
    /// Errors are logged once per distinct kind so a missing file does not
    /// flood the log at heartbeat rate.
    pub fn resolve(&mut self, max_maps: u8) -> u8 {
        match self.read(max_maps) {
            Ok(map) => {
                if self.last_error.take().is_some() {
                    tracing::info!(map, "map selection readable again");
                }
                self.last_good = map;
                map
            }
            Err(e) => {
                if self.last_error != Some(e.kind()) {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        fallback = self.last_good,
                        "map selection unusable"
                    );
                    self.last_error = Some(e.kind());
                }
                self.last_good
            }
        }
    }
}
