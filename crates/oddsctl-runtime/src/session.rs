#![forbid(unsafe_code)]

//! RAII ownership of the workbook connection, and OS shutdown signals.
//!
//! [`WorkbookSession`] owns the workbook for the lifetime of the controller
//! and restores interactivity when dropped, whether the loop exits normally,
//! returns an error, or unwinds from a panic.
//!
//! [`ShutdownSignal`] is a flag the loop polls once per tick. On unix,
//! [`ShutdownSignal::install_os_handlers`] sets it from SIGINT/SIGTERM so the
//! loop can stop and the session can clean up on the owning thread.
//!
//! # Example
//!
//! ```
//! use oddsctl_runtime::{MemoryWorkbook, Workbook, WorkbookSession};
//!
//! let mut session = WorkbookSession::new(MemoryWorkbook::default());
//! session.write_cell("M44", 1.5.into())?;
//! session.close()?;
//! assert!(session.is_interactive());
//! # Ok::<(), oddsctl_runtime::WorkbookError>(())
//! ```

use std::io;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(unix)]
use signal_hook::consts::signal::{SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook::iterator::Signals;

use crate::workbook::{Workbook, WorkbookResult};

/// Owns a workbook and restores it on drop.
#[derive(Debug)]
pub struct WorkbookSession<W: Workbook> {
    workbook: W,
    restored: bool,
}

impl<W: Workbook> WorkbookSession<W> {
    #[must_use]
    pub fn new(workbook: W) -> Self {
        tracing::debug!(workbook = workbook.name(), "workbook session opened");
        Self {
            workbook,
            restored: false,
        }
    }

    /// Restore interactivity now instead of on drop.
    ///
    /// Idempotent: once restored, later calls and the drop do nothing.
    ///
    /// # Errors
    ///
    /// Returns the restore error; the drop will try again.
    pub fn close(&mut self) -> WorkbookResult<()> {
        if self.restored {
            return Ok(());
        }
        self.workbook.restore_interactivity()?;
        self.restored = true;
        tracing::debug!(workbook = self.workbook.name(), "interactivity restored");
        Ok(())
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.restored
    }
}

impl<W: Workbook> Deref for WorkbookSession<W> {
    type Target = W;

    fn deref(&self) -> &W {
        &self.workbook
    }
}

impl<W: Workbook> DerefMut for WorkbookSession<W> {
    fn deref_mut(&mut self) -> &mut W {
        &mut self.workbook
    }
}

impl<W: Workbook> Drop for WorkbookSession<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "could not restore interactivity");
        }
    }
}

/// Cooperative shutdown flag shared between threads.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Route SIGINT/SIGTERM into this flag until the guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the handlers cannot be registered.
    pub fn install_os_handlers(&self) -> io::Result<SignalGuard> {
        SignalGuard::new(self.clone())
    }
}

/// Keeps the signal thread alive; closes and joins it on drop.
#[derive(Debug)]
pub struct SignalGuard {
    #[cfg(unix)]
    handle: signal_hook::iterator::Handle,
    #[cfg(unix)]
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SignalGuard {
    #[cfg(unix)]
    fn new(shutdown: ShutdownSignal) -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("oddsctl-signals".into())
            .spawn(move || {
                for signal in signals.forever() {
                    if matches!(signal, SIGINT | SIGTERM) {
                        tracing::warn!(signal, "termination signal received, stopping");
                        shutdown.trigger();
                    }
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    #[cfg(not(unix))]
    fn new(_shutdown: ShutdownSignal) -> io::Result<Self> {
        Ok(Self {})
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
