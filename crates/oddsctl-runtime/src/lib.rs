#![forbid(unsafe_code)]

//! Runtime: owns the workbook and runs the controller loop.
//!
//! # Role
//!
//! `oddsctl-runtime` is the single-threaded half of the controller. It
//! receives [`oddsctl_core::Command`]s from the input hook's channel and
//! turns them into workbook mutations, while publishing a status heartbeat
//! and a diff-based snapshot of the watched cells for the UI.
//!
//! # Primary responsibilities
//!
//! - **Program**: the tick loop ([`Program`]).
//! - **Dispatcher**: lock check, debounce and ladder step ([`Dispatcher`]).
//! - **Watcher**: snapshot diffing and publication ([`StateWatcher`]).
//! - **Workbook**: the automation capability ([`Workbook`]) with in-memory
//!   and file-backed implementations.
//! - **Session**: restore-on-drop ownership and signal handling.

pub mod companion;
pub mod dispatcher;
pub mod file_workbook;
pub mod program;
pub mod publish;
pub mod selection;
pub mod session;
pub mod snapshot;
pub mod watcher;
pub mod workbook;

pub use companion::{CompanionStatus, SharedCompanionStatus};
pub use dispatcher::{ActionConfig, Dispatcher, Outcome, Rejection, Selection, StartupReport};
pub use file_workbook::{FileWorkbook, WorkbookDocument};
pub use program::{Program, ProgramConfig};
pub use publish::{
    AtomicJsonFile, MapView, ObservedState, PublishError, PublishResult, StatusDocument,
    unix_millis,
};
pub use selection::{SelectionError, SelectionTracker};
pub use session::{ShutdownSignal, SignalGuard, WorkbookSession};
pub use snapshot::{CellSchema, Snapshot, SnapshotDiff};
pub use watcher::StateWatcher;
pub use workbook::{Click, MemoryWorkbook, WindowHandle, Workbook, WorkbookError, WorkbookResult};
